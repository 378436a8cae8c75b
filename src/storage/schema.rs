use rusqlite::Connection;

pub mod collections {
    pub const TRACKS: &str = "tracks";
    pub const PLAYLISTS: &str = "playlists";
    pub const FAVORITES: &str = "favorites";

    pub const ALL_COLLECTIONS: &[&str] = &[TRACKS, PLAYLISTS, FAVORITES];
}

pub mod columns {
    pub const ID: &str = "id";
    pub const BODY: &str = "body";
}

/// document fields that are queried by repositories
pub mod fields {
    pub const OWNER_ID: &str = "owner_id";
    pub const TRACK_ID: &str = "track_id";
}

pub use collections::*;
pub use columns::*;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tracks (
    id TEXT PRIMARY KEY NOT NULL,
    body TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS playlists (
    id TEXT PRIMARY KEY NOT NULL,
    body TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS favorites (
    id TEXT PRIMARY KEY NOT NULL,
    body TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS tracks_owner ON tracks (json_extract(body, '$.owner_id'));
CREATE INDEX IF NOT EXISTS playlists_owner ON playlists (json_extract(body, '$.owner_id'));
CREATE INDEX IF NOT EXISTS favorites_owner ON favorites (json_extract(body, '$.owner_id'));
"#;

pub fn init(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA)
}
