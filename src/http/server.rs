use log::info;
use rouille::{Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    config::{HttpConfig, Media},
    domain::{
        playlist::{NewPlaylist, PlaylistPatch},
        track::{NewTrack, Track},
    },
    http::{error::ApiError, range},
    storage::store::DocumentStore,
};

/// Header carrying the identity resolved by the authentication layer in front of this server
pub const USER_HEADER: &str = "X-User-Id";

const UPLOAD_EXTENSIONS: &[&str] = &["mp3", "flac"];
const UNKNOWN_ARTIST: &str = "Unknown";

pub struct HttpServer {
    store: Arc<DocumentStore>,
    media: Media,
    pub config: HttpConfig,
}

#[derive(Deserialize)]
struct CreatePlaylistRequest {
    name: Option<String>,
    #[serde(default)]
    tracks: Vec<String>,
}

#[derive(Deserialize)]
struct UpdatePlaylistRequest {
    name: Option<String>,
    tracks: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct FavoriteRequest {
    track_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct UploadResponse {
    message: String,
    track: Track,
}

impl HttpServer {
    pub fn new(store: Arc<DocumentStore>, media: Media, config: HttpConfig) -> Self {
        Self {
            store,
            media,
            config,
        }
    }

    pub fn run(self) {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        rouille::start_server(addr, move |request| self.handle_request(request));
    }

    fn handle_request(&self, request: &Request) -> Response {
        Self::log_request(request);

        let response = rouille::router!(request,
            (POST) (/tracks/upload) => {
                self.respond(request, |owner| self.upload_track(request, owner))
            },
            (GET) (/tracks/list) => {
                self.respond(request, |owner| self.list_tracks(owner))
            },
            (GET) (/tracks/{id: String}) => {
                self.respond(request, |owner| {
                    Ok(Response::json(&self.owned_track(&id, owner)?))
                })
            },
            (GET) (/tracks/{id: String}/stream) => {
                self.respond(request, |owner| self.stream_track(request, &id, owner))
            },
            (GET) (/tracks/{id: String}/download) => {
                self.respond(request, |owner| self.download_track(&id, owner))
            },

            (POST) (/playlists/create) => {
                self.respond(request, |owner| self.create_playlist(request, owner))
            },
            (GET) (/playlists/list) => {
                self.respond(request, |owner| {
                    Ok(Response::json(&self.store.playlists().get_by_owner(owner)?))
                })
            },
            (GET) (/playlists/{id: String}) => {
                self.respond(request, |owner| self.get_playlist(&id, owner))
            },
            (PUT) (/playlists/{id: String}) => {
                self.respond(request, |owner| self.update_playlist(request, &id, owner))
            },
            (DELETE) (/playlists/{id: String}) => {
                self.respond(request, |owner| self.delete_playlist(&id, owner))
            },

            (POST) (/favorites/mark) => {
                self.respond(request, |owner| self.mark_favorite(request, owner))
            },
            (DELETE) (/favorites/unmark) => {
                self.respond(request, |owner| self.unmark_favorite(request, owner))
            },
            (GET) (/favorites/list) => {
                self.respond(request, |owner| self.list_favorites(owner))
            },

            _ => Response::empty_404()
        );

        info!("Response: {} {} {}", request.method(), request.url(), response.status_code);
        response
    }

    fn log_request(request: &Request) {
        info!("{} {}", request.method(), request.url());
    }

    /// runs `handler` for the calling user, or answers 401 when the identity header is missing
    fn respond<F>(&self, request: &Request, handler: F) -> Response
    where
        F: FnOnce(&str) -> Result<Response, ApiError>,
    {
        let owner = request
            .header(USER_HEADER)
            .map(str::trim)
            .filter(|owner| !owner.is_empty())
            .ok_or(ApiError::Unauthorized);

        match owner.and_then(handler) {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }

    fn json_body<T: serde::de::DeserializeOwned>(request: &Request) -> Result<T, ApiError> {
        rouille::input::json_input(request)
            .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
    }

    /// fetches the track, answering another user's track exactly like a missing one
    fn owned_track(&self, id: &str, owner: &str) -> Result<Track, ApiError> {
        self.store
            .tracks()
            .get_by_id(id)?
            .filter(|track| track.is_owned_by(owner))
            .ok_or_else(|| ApiError::NotFound("track not found".into()))
    }

    fn upload_track(&self, request: &Request, owner: &str) -> Result<Response, ApiError> {
        let filename = request
            .get_param("filename")
            .ok_or_else(|| ApiError::BadRequest("missing filename".into()))?;
        let filename = sanitize_filename(&filename)
            .ok_or_else(|| ApiError::BadRequest("invalid filename".into()))?;
        if !is_upload_extension(Path::new(&filename)) {
            return Err(ApiError::BadRequest("only MP3 and FLAC files are accepted".into()));
        }

        let limit = self.media.max_upload_bytes;
        let mut data = Vec::new();
        if let Some(body) = request.data() {
            body.take(limit.saturating_add(1))
                .read_to_end(&mut data)
                .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
        }
        if data.is_empty() {
            return Err(ApiError::BadRequest("empty upload".into()));
        }
        if data.len() as u64 > limit {
            return Err(ApiError::PayloadTooLarge { limit });
        }

        let file_path = self.store_upload(owner, &filename, &data)?;

        let param = |name: &str| request.get_param(name).filter(|value| !value.is_empty());
        let track = self.store.tracks().create(NewTrack {
            title: param("title").unwrap_or_else(|| filename.clone()),
            artist: param("artist").unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            album: param("album").unwrap_or_default(),
            genre: param("genre").unwrap_or_default(),
            file_path,
            owner_id: owner.to_string(),
        })?;
        info!("Stored upload {} as track {}", track.file_path.to_string_lossy(), track.id);

        Ok(Response::json(&UploadResponse {
            message: "upload successful".into(),
            track,
        })
        .with_status_code(201))
    }

    /// Writes the upload under the media root as `{owner key}_{filename}`, `filename` already sanitised.
    ///
    /// A failure after this point leaves the file in place, nothing is rolled back.
    fn store_upload(&self, owner: &str, filename: &str, data: &[u8]) -> Result<PathBuf, ApiError> {
        let path = self
            .media
            .root
            .join(format!("{}_{filename}", owner_key(owner)));

        std::fs::create_dir_all(&self.media.root)
            .and_then(|_| std::fs::write(&path, data))
            .map_err(|e| {
                log::error!("failed to store upload at {}: {e}", path.to_string_lossy());
                ApiError::Internal("could not store file".into())
            })?;
        Ok(path)
    }

    fn list_tracks(&self, owner: &str) -> Result<Response, ApiError> {
        Ok(Response::json(&self.store.tracks().get_by_owner(owner)?))
    }

    fn stream_track(&self, request: &Request, id: &str, owner: &str) -> Result<Response, ApiError> {
        let track = self.owned_track(id, owner)?;
        let media = range::serve(&track.file_path, request.header("Range"))?;
        Ok(media.into_response())
    }

    fn download_track(&self, id: &str, owner: &str) -> Result<Response, ApiError> {
        let track = self.owned_track(id, owner)?;
        let file = File::open(&track.file_path).map_err(|e| {
            log::error!("failed to open {}: {e}", track.file_path.to_string_lossy());
            ApiError::Internal("internal server error".into())
        })?;

        let mime = mime_guess::from_path(&track.file_path)
            .first_or_octet_stream()
            .to_string();
        let name = track
            .file_path
            .file_name()
            .map(|name| name.to_string_lossy().replace('"', ""))
            .unwrap_or_default();

        Ok(Response::from_file(mime, file)
            .with_additional_header("Content-Disposition", format!("attachment; filename=\"{name}\"")))
    }

    fn create_playlist(&self, request: &Request, owner: &str) -> Result<Response, ApiError> {
        let body: CreatePlaylistRequest = Self::json_body(request)?;
        let name = body
            .name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("invalid playlist name".into()))?;

        let playlist = self
            .store
            .playlists()
            .create(NewPlaylist::new(name, owner, body.tracks))?;

        Ok(Response::json(&json!({ "message": "playlist created", "playlist": playlist }))
            .with_status_code(201))
    }

    fn get_playlist(&self, id: &str, owner: &str) -> Result<Response, ApiError> {
        let playlist = self
            .store
            .playlists()
            .get_by_id(id)?
            .filter(|playlist| playlist.is_owned_by(owner))
            .ok_or_else(|| ApiError::NotFound("playlist not found".into()))?;
        Ok(Response::json(&playlist))
    }

    fn update_playlist(&self, request: &Request, id: &str, owner: &str) -> Result<Response, ApiError> {
        self.get_playlist(id, owner)?;
        let body: UpdatePlaylistRequest = Self::json_body(request)?;

        let mut patch = PlaylistPatch::default();
        if let Some(name) = body.name {
            patch = patch.with_name(name);
        }
        if let Some(tracks) = body.tracks {
            patch = patch.with_track_refs(tracks);
        }

        if !patch.is_empty() {
            self.store.playlists().update(id, &patch)?;
        }
        Ok(Response::json(&json!({ "message": "playlist updated" })))
    }

    fn delete_playlist(&self, id: &str, owner: &str) -> Result<Response, ApiError> {
        self.get_playlist(id, owner)?;
        self.store.playlists().delete(id)?;
        Ok(Response::json(&json!({ "message": "playlist deleted" })))
    }

    fn favorite_track_id(request: &Request) -> Result<String, ApiError> {
        let body: FavoriteRequest = Self::json_body(request)?;
        body.track_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::BadRequest("track_id is required".into()))
    }

    /// The duplicate check and the insert are separate round-trips,
    /// concurrent marks of the same pair may both succeed.
    fn mark_favorite(&self, request: &Request, owner: &str) -> Result<Response, ApiError> {
        let track_id = Self::favorite_track_id(request)?;
        let track = self.owned_track(&track_id, owner)?;

        let favorites = self.store.favorites();
        if favorites.exists(owner, &track.id)? {
            return Err(ApiError::BadRequest("track is already a favorite".into()));
        }
        favorites.create(owner, &track.id.to_hex())?;

        Ok(Response::json(&json!({ "message": "favorite marked" })))
    }

    fn unmark_favorite(&self, request: &Request, owner: &str) -> Result<Response, ApiError> {
        let track_id = Self::favorite_track_id(request)?;
        self.store.favorites().delete(owner, &track_id)?;
        Ok(Response::json(&json!({ "message": "favorite removed" })))
    }

    fn list_favorites(&self, owner: &str) -> Result<Response, ApiError> {
        let tracks = self.store.tracks();
        let mut favorites = Vec::new();
        for track_id in self.store.favorites().get_by_owner(owner)? {
            if let Some(track) = tracks.get_by_id(&track_id.to_hex())? {
                if track.is_owned_by(owner) {
                    favorites.push(track);
                }
            }
        }
        Ok(Response::json(&favorites))
    }
}

/// Keeps the last path component and replaces anything outside `[A-Za-z0-9._-]` with `_`.
///
/// Returns `None` when nothing usable is left.
fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Filename-safe key of an owner id, distinct owner ids never share a key
fn owner_key(owner: &str) -> String {
    blake3::hash(owner.as_bytes()).to_hex().to_string()
}

fn is_upload_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| UPLOAD_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
pub fn parse_json_response<T: serde::de::DeserializeOwned>(
    response: rouille::Response,
) -> anyhow::Result<T> {
    Ok(serde_json::from_reader(
        response.data.into_reader_and_size().0,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::DEFAULT_MAX_UPLOAD_BYTES,
        domain::{id::DocumentId, playlist::Playlist},
        storage::tracks::tests::new_track,
    };

    use rouille::Request;
    use rusqlite::Connection;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    const OWNER: &str = "user-1";
    const OTHER: &str = "user-2";

    struct Fixture {
        server: HttpServer,
        media: TempDir,
    }

    fn read_body(response: Response) -> Vec<u8> {
        let mut body = Vec::new();
        response
            .data
            .into_reader_and_size()
            .0
            .read_to_end(&mut body)
            .unwrap();
        body
    }

    fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
        response
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_ref())
    }

    fn setup() -> anyhow::Result<Fixture> {
        setup_with_limit(DEFAULT_MAX_UPLOAD_BYTES)
    }

    fn setup_with_limit(max_upload_bytes: u64) -> anyhow::Result<Fixture> {
        let media = tempdir()?;
        let store = DocumentStore::from_existing_conn(Connection::open_in_memory()?)?;
        let server = HttpServer::new(
            Arc::new(store),
            Media {
                root: media.path().join("uploads"),
                max_upload_bytes,
            },
            HttpConfig {
                bind_addr: "127.0.0.1".to_string(),
                port: 8080,
            },
        );
        Ok(Fixture {
            server,
            media,
        })
    }

    fn request(method: &str, url: &str, owner: Option<&str>, extra: &[(&str, &str)], body: Vec<u8>) -> Request {
        let mut headers = extra
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Vec<_>>();
        if let Some(owner) = owner {
            headers.push((USER_HEADER.to_string(), owner.to_string()));
        }
        Request::fake_http(method.to_string(), url, headers, body)
    }

    fn get(url: &str, owner: &str) -> Request {
        request("GET", url, Some(owner), &[], vec![])
    }

    fn json_request(method: &str, url: &str, owner: &str, body: serde_json::Value) -> Request {
        request(
            method,
            url,
            Some(owner),
            &[("Content-Type", "application/json")],
            body.to_string().into_bytes(),
        )
    }

    /// stores a track whose file holds bytes 0..size
    fn track_with_file(fixture: &Fixture, owner: &str, name: &str, size: usize) -> anyhow::Result<Track> {
        let path = fixture.media.path().join(name);
        fs::write(&path, (0..size).map(|i| i as u8).collect::<Vec<_>>())?;

        let mut new = new_track(owner, name);
        new.file_path = path;
        Ok(fixture.server.store.tracks().create(new)?)
    }

    // --------------------------------------------------
    // identity
    // --------------------------------------------------

    #[test]
    fn test_missing_identity_is_unauthorized() {
        let fixture = setup().unwrap();

        let response = fixture
            .server
            .handle_request(&request("GET", "/tracks/list", None, &[], vec![]));

        assert_eq!(response.status_code, 401);
    }

    #[test]
    fn test_unknown_route_is_404() {
        let fixture = setup().unwrap();

        let response = fixture.server.handle_request(&get("/nothing/here", OWNER));

        assert_eq!(response.status_code, 404);
    }

    // --------------------------------------------------
    // upload
    // --------------------------------------------------

    #[test]
    fn test_upload_stores_file_and_track() -> anyhow::Result<()> {
        let fixture = setup()?;

        let response = fixture.server.handle_request(&request(
            "POST",
            "/tracks/upload?filename=my-song.mp3&artist=Band",
            Some(OWNER),
            &[],
            b"ID3 audio".to_vec(),
        ));

        assert_eq!(response.status_code, 201);
        let body: UploadResponse = parse_json_response(response)?;

        assert_eq!(body.track.title, "my-song.mp3");
        assert_eq!(body.track.artist, "Band");
        assert_eq!(body.track.album, "");
        assert_eq!(body.track.owner_id, OWNER);
        assert!(body.track.file_path.is_absolute());
        assert!(
            body.track
                .file_path
                .ends_with(format!("{}_my-song.mp3", owner_key(OWNER)))
        );
        assert_eq!(fs::read(&body.track.file_path)?, b"ID3 audio");

        let stored = fixture.server.store.tracks().get_by_id(&body.track.id.to_hex())?;
        assert_eq!(stored, Some(body.track));

        Ok(())
    }

    #[test]
    fn test_upload_same_filename_keeps_owners_apart() -> anyhow::Result<()> {
        let fixture = setup()?;

        let upload = |owner: &str, data: &[u8]| -> anyhow::Result<Track> {
            let response = fixture.server.handle_request(&request(
                "POST",
                "/tracks/upload?filename=song.mp3",
                Some(owner),
                &[],
                data.to_vec(),
            ));
            assert_eq!(response.status_code, 201);
            Ok(parse_json_response::<UploadResponse>(response)?.track)
        };

        let bob = upload("bob", b"BOB-AUDIO")?;
        let team_bob = upload("team/bob", b"TEAM-AUDIO")?;
        let umlaut = upload("j\u{f6}", b"UMLAUT-AUDIO")?;
        let underscore = upload("j_", b"UNDERSCORE-AUDIO")?;

        assert_ne!(bob.file_path, team_bob.file_path);
        assert_ne!(umlaut.file_path, underscore.file_path);
        for track in [&bob, &team_bob, &umlaut, &underscore] {
            assert_eq!(track.file_path.parent(), Some(fixture.server.media.root.as_path()));
        }

        assert_eq!(fs::read(&bob.file_path)?, b"BOB-AUDIO");
        assert_eq!(fs::read(&team_bob.file_path)?, b"TEAM-AUDIO");
        assert_eq!(fs::read(&umlaut.file_path)?, b"UMLAUT-AUDIO");
        assert_eq!(fs::read(&underscore.file_path)?, b"UNDERSCORE-AUDIO");

        let response = fixture
            .server
            .handle_request(&get(&format!("/tracks/{}/stream", bob.id), "bob"));
        assert_eq!(read_body(response), b"BOB-AUDIO");

        Ok(())
    }

    #[test]
    fn test_upload_rejects_other_extensions() -> anyhow::Result<()> {
        let fixture = setup()?;

        let response = fixture.server.handle_request(&request(
            "POST",
            "/tracks/upload?filename=notes.txt",
            Some(OWNER),
            &[],
            b"hello".to_vec(),
        ));

        assert_eq!(response.status_code, 400);
        assert!(fixture.server.store.tracks().get_by_owner(OWNER)?.is_empty());

        Ok(())
    }

    #[test]
    fn test_upload_rejects_oversized_body() -> anyhow::Result<()> {
        let fixture = setup_with_limit(4)?;

        let response = fixture.server.handle_request(&request(
            "POST",
            "/tracks/upload?filename=a.flac",
            Some(OWNER),
            &[],
            b"12345".to_vec(),
        ));

        assert_eq!(response.status_code, 413);
        assert!(fixture.server.store.tracks().get_by_owner(OWNER)?.is_empty());

        Ok(())
    }

    #[test]
    fn test_upload_requires_filename() {
        let fixture = setup().unwrap();

        let response = fixture.server.handle_request(&request(
            "POST",
            "/tracks/upload",
            Some(OWNER),
            &[],
            b"x".to_vec(),
        ));

        assert_eq!(response.status_code, 400);
    }

    // --------------------------------------------------
    // tracks
    // --------------------------------------------------

    #[test]
    fn test_list_tracks_only_returns_own() -> anyhow::Result<()> {
        let fixture = setup()?;
        let mine = track_with_file(&fixture, OWNER, "a.mp3", 1)?;
        track_with_file(&fixture, OTHER, "b.mp3", 1)?;

        let response = fixture.server.handle_request(&get("/tracks/list", OWNER));

        assert_eq!(response.status_code, 200);
        let tracks: Vec<Track> = parse_json_response(response)?;
        assert_eq!(tracks, vec![mine]);

        Ok(())
    }

    #[test]
    fn test_get_track_of_other_user_is_not_found() -> anyhow::Result<()> {
        let fixture = setup()?;
        let theirs = track_with_file(&fixture, OTHER, "b.mp3", 1)?;

        let url = format!("/tracks/{}", theirs.id);
        assert_eq!(fixture.server.handle_request(&get(&url, OWNER)).status_code, 404);
        assert_eq!(fixture.server.handle_request(&get(&url, OTHER)).status_code, 200);

        Ok(())
    }

    #[test]
    fn test_get_track_malformed_id_is_not_found() {
        let fixture = setup().unwrap();

        let response = fixture.server.handle_request(&get("/tracks/not-a-valid-id", OWNER));

        assert_eq!(response.status_code, 404);
    }

    // --------------------------------------------------
    // streaming
    // --------------------------------------------------

    #[test]
    fn test_stream_without_range_returns_whole_file() -> anyhow::Result<()> {
        let fixture = setup()?;
        let track = track_with_file(&fixture, OWNER, "song.mp3", 100)?;

        let response = fixture
            .server
            .handle_request(&get(&format!("/tracks/{}/stream", track.id), OWNER));

        assert_eq!(response.status_code, 200);
        assert_eq!(header(&response, "Content-Type"), Some("audio/mpeg"));
        assert_eq!(header(&response, "Content-Range"), None);
        assert_eq!(read_body(response).len(), 100);

        Ok(())
    }

    #[test]
    fn test_stream_range_returns_window() -> anyhow::Result<()> {
        let fixture = setup()?;
        let track = track_with_file(&fixture, OWNER, "song.flac", 100)?;

        let response = fixture.server.handle_request(&request(
            "GET",
            &format!("/tracks/{}/stream", track.id),
            Some(OWNER),
            &[("Range", "bytes=10-29")],
            vec![],
        ));

        assert_eq!(response.status_code, 206);
        assert_eq!(header(&response, "Content-Type"), Some("audio/flac"));
        assert_eq!(header(&response, "Content-Range"), Some("bytes 10-29/100"));
        assert_eq!(header(&response, "Accept-Ranges"), Some("bytes"));
        assert_eq!(read_body(response), (10u8..30).collect::<Vec<_>>());

        Ok(())
    }

    #[test]
    fn test_stream_open_ended_range() -> anyhow::Result<()> {
        let fixture = setup()?;
        let track = track_with_file(&fixture, OWNER, "song.mp3", 100)?;

        let response = fixture.server.handle_request(&request(
            "GET",
            &format!("/tracks/{}/stream", track.id),
            Some(OWNER),
            &[("Range", "bytes=50-")],
            vec![],
        ));

        assert_eq!(response.status_code, 206);
        assert_eq!(header(&response, "Content-Range"), Some("bytes 50-99/100"));
        assert_eq!(read_body(response).len(), 50);

        Ok(())
    }

    #[test]
    fn test_stream_unsatisfiable_range_is_416() -> anyhow::Result<()> {
        let fixture = setup()?;
        let track = track_with_file(&fixture, OWNER, "song.mp3", 100)?;

        let response = fixture.server.handle_request(&request(
            "GET",
            &format!("/tracks/{}/stream", track.id),
            Some(OWNER),
            &[("Range", "bytes=200-")],
            vec![],
        ));

        assert_eq!(response.status_code, 416);
        assert_eq!(header(&response, "Content-Range"), Some("bytes */100"));

        Ok(())
    }

    #[test]
    fn test_stream_malformed_range_is_400() -> anyhow::Result<()> {
        let fixture = setup()?;
        let track = track_with_file(&fixture, OWNER, "song.mp3", 100)?;

        let response = fixture.server.handle_request(&request(
            "GET",
            &format!("/tracks/{}/stream", track.id),
            Some(OWNER),
            &[("Range", "bytes=ten-twenty")],
            vec![],
        ));

        assert_eq!(response.status_code, 400);

        Ok(())
    }

    #[test]
    fn test_stream_other_users_track_is_not_found() -> anyhow::Result<()> {
        let fixture = setup()?;
        let track = track_with_file(&fixture, OTHER, "song.mp3", 100)?;

        let response = fixture
            .server
            .handle_request(&get(&format!("/tracks/{}/stream", track.id), OWNER));

        assert_eq!(response.status_code, 404);

        Ok(())
    }

    #[test]
    fn test_stream_missing_file_is_internal_error() -> anyhow::Result<()> {
        let fixture = setup()?;
        let track = fixture.server.store.tracks().create(new_track(OWNER, "gone"))?;

        let response = fixture
            .server
            .handle_request(&get(&format!("/tracks/{}/stream", track.id), OWNER));

        assert_eq!(response.status_code, 500);

        Ok(())
    }

    #[test]
    fn test_download_is_attachment() -> anyhow::Result<()> {
        let fixture = setup()?;
        let track = track_with_file(&fixture, OWNER, "song.mp3", 10)?;

        let response = fixture
            .server
            .handle_request(&get(&format!("/tracks/{}/download", track.id), OWNER));

        assert_eq!(response.status_code, 200);
        assert_eq!(
            header(&response, "Content-Disposition"),
            Some("attachment; filename=\"song.mp3\"")
        );
        assert_eq!(read_body(response), (0u8..10).collect::<Vec<_>>());

        Ok(())
    }

    // --------------------------------------------------
    // playlists
    // --------------------------------------------------

    fn create_playlist(fixture: &Fixture, owner: &str, body: serde_json::Value) -> anyhow::Result<Playlist> {
        let response = fixture
            .server
            .handle_request(&json_request("POST", "/playlists/create", owner, body));
        assert_eq!(response.status_code, 201);

        let body: serde_json::Value = parse_json_response(response)?;
        Ok(serde_json::from_value(body["playlist"].clone())?)
    }

    #[test]
    fn test_create_playlist_drops_malformed_track_ids() -> anyhow::Result<()> {
        let fixture = setup()?;
        let valid = DocumentId::generate().to_hex();

        let playlist = create_playlist(&fixture, OWNER, json!({"name": "mix", "tracks": [valid, "junk"]}))?;

        assert_eq!(playlist.owner_id, OWNER);
        assert_eq!(playlist.track_refs, vec![DocumentId::parse(&valid)?]);

        Ok(())
    }

    #[test]
    fn test_create_playlist_requires_name() {
        let fixture = setup().unwrap();

        let response = fixture.server.handle_request(&json_request(
            "POST",
            "/playlists/create",
            OWNER,
            json!({"tracks": []}),
        ));

        assert_eq!(response.status_code, 400);
    }

    #[test]
    fn test_update_playlist_name_keeps_tracks() -> anyhow::Result<()> {
        let fixture = setup()?;
        let refs = vec![DocumentId::generate().to_hex(), DocumentId::generate().to_hex()];
        let playlist = create_playlist(&fixture, OWNER, json!({"name": "old", "tracks": refs}))?;
        let url = format!("/playlists/{}", playlist.id);

        let response = fixture
            .server
            .handle_request(&json_request("PUT", &url, OWNER, json!({"name": "new"})));
        assert_eq!(response.status_code, 200);

        let response = fixture.server.handle_request(&get(&url, OWNER));
        let after: Playlist = parse_json_response(response)?;
        assert_eq!(after.name, "new");
        assert_eq!(after.track_refs, playlist.track_refs);

        Ok(())
    }

    #[test]
    fn test_other_user_cannot_touch_playlist() -> anyhow::Result<()> {
        let fixture = setup()?;
        let playlist = create_playlist(&fixture, OWNER, json!({"name": "mine"}))?;
        let url = format!("/playlists/{}", playlist.id);

        let update = fixture
            .server
            .handle_request(&json_request("PUT", &url, OTHER, json!({"name": "stolen"})));
        let delete = fixture
            .server
            .handle_request(&request("DELETE", &url, Some(OTHER), &[], vec![]));
        let read = fixture.server.handle_request(&get(&url, OTHER));

        assert_eq!(update.status_code, 404);
        assert_eq!(delete.status_code, 404);
        assert_eq!(read.status_code, 404);

        let stored = fixture.server.store.playlists().get_by_id(&playlist.id.to_hex())?;
        assert_eq!(stored, Some(playlist));

        Ok(())
    }

    #[test]
    fn test_delete_playlist() -> anyhow::Result<()> {
        let fixture = setup()?;
        let playlist = create_playlist(&fixture, OWNER, json!({"name": "bye"}))?;
        let url = format!("/playlists/{}", playlist.id);

        let response = fixture
            .server
            .handle_request(&request("DELETE", &url, Some(OWNER), &[], vec![]));
        assert_eq!(response.status_code, 200);

        let again = fixture
            .server
            .handle_request(&request("DELETE", &url, Some(OWNER), &[], vec![]));
        assert_eq!(again.status_code, 404);

        let response = fixture.server.handle_request(&get("/playlists/list", OWNER));
        let playlists: Vec<Playlist> = parse_json_response(response)?;
        assert!(playlists.is_empty());

        Ok(())
    }

    // --------------------------------------------------
    // favorites
    // --------------------------------------------------

    fn mark(fixture: &Fixture, owner: &str, track_id: &str) -> Response {
        fixture.server.handle_request(&json_request(
            "POST",
            "/favorites/mark",
            owner,
            json!({ "track_id": track_id }),
        ))
    }

    fn unmark(fixture: &Fixture, owner: &str, track_id: &str) -> Response {
        fixture.server.handle_request(&json_request(
            "DELETE",
            "/favorites/unmark",
            owner,
            json!({ "track_id": track_id }),
        ))
    }

    #[test]
    fn test_mark_twice_is_rejected_the_second_time() -> anyhow::Result<()> {
        let fixture = setup()?;
        let track = track_with_file(&fixture, OWNER, "fav.mp3", 1)?;

        assert_eq!(mark(&fixture, OWNER, &track.id.to_hex()).status_code, 200);
        assert_eq!(mark(&fixture, OWNER, &track.id.to_hex()).status_code, 400);

        assert_eq!(fixture.server.store.favorites().get_by_owner(OWNER)?, vec![track.id]);

        Ok(())
    }

    #[test]
    fn test_mark_requires_owned_track() -> anyhow::Result<()> {
        let fixture = setup()?;
        let theirs = track_with_file(&fixture, OTHER, "fav.mp3", 1)?;

        assert_eq!(mark(&fixture, OWNER, &theirs.id.to_hex()).status_code, 404);
        assert_eq!(mark(&fixture, OWNER, "not-an-id").status_code, 404);

        let response = fixture.server.handle_request(&json_request(
            "POST",
            "/favorites/mark",
            OWNER,
            json!({}),
        ));
        assert_eq!(response.status_code, 400);

        Ok(())
    }

    #[test]
    fn test_unmark_never_marked_is_noop() -> anyhow::Result<()> {
        let fixture = setup()?;
        let track = track_with_file(&fixture, OWNER, "fav.mp3", 1)?;

        assert_eq!(unmark(&fixture, OWNER, &track.id.to_hex()).status_code, 200);
        assert_eq!(unmark(&fixture, OWNER, "not-an-id").status_code, 400);

        Ok(())
    }

    #[test]
    fn test_list_favorites_returns_tracks() -> anyhow::Result<()> {
        let fixture = setup()?;
        let a = track_with_file(&fixture, OWNER, "a.mp3", 1)?;
        let b = track_with_file(&fixture, OWNER, "b.mp3", 1)?;

        mark(&fixture, OWNER, &a.id.to_hex());
        mark(&fixture, OWNER, &b.id.to_hex());
        unmark(&fixture, OWNER, &a.id.to_hex());

        let response = fixture.server.handle_request(&get("/favorites/list", OWNER));
        assert_eq!(response.status_code, 200);

        let favorites: Vec<Track> = parse_json_response(response)?;
        assert_eq!(favorites, vec![b]);

        Ok(())
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("song.mp3").as_deref(), Some("song.mp3"));
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_filename("C:\\music\\a b.flac").as_deref(), Some("a_b.flac"));
        assert_eq!(sanitize_filename(".hidden.mp3").as_deref(), Some("hidden.mp3"));
        assert_eq!(sanitize_filename("dir/").as_deref(), None);
        assert_eq!(sanitize_filename("???").as_deref(), None);
    }
}
