use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    domain::id::DocumentId,
    storage::{
        error::StoreError,
        favorites::FavoriteRepository,
        playlists::PlaylistRepository,
        schema::{self, columns::*},
        tracks::TrackRepository,
    },
};

/// Field equality conditions, all of which must hold.
///
/// Field names are compile-time constants from [`schema::fields`], values are bound as parameters.
pub type Filter<'a> = [(&'static str, &'a str)];

/// Schema-less JSON document store with one table per collection.
///
/// Every method is an independent round-trip, nothing spans multiple calls.
pub struct DocumentStore {
    conn: Mutex<Connection>,
}

impl DocumentStore {
    pub fn from_existing_conn(conn: Connection) -> Result<Self, StoreError> {
        schema::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn tracks(&self) -> TrackRepository<'_> {
        TrackRepository::new(self)
    }

    pub fn playlists(&self) -> PlaylistRepository<'_> {
        PlaylistRepository::new(self)
    }

    pub fn favorites(&self) -> FavoriteRepository<'_> {
        FavoriteRepository::new(self)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|e| {
            StoreError::Internal(anyhow!("document store connection lock poisoned: {e}"))
        })
    }

    /// Stores a new document and returns the id assigned to it
    pub fn insert<T: Serialize>(&self, collection: &str, doc: &T) -> Result<DocumentId, StoreError> {
        let body = serde_json::to_string(doc)?;
        let id = DocumentId::generate();

        self.conn()?.execute(
            &format!("INSERT INTO {collection} ({ID}, {BODY}) VALUES (?1, ?2)"),
            params![id.to_hex(), body],
        )?;

        Ok(id)
    }

    pub fn find_by_id<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<T>, StoreError> {
        let body: Option<String> = self
            .conn()?
            .query_row(
                &format!("SELECT {BODY} FROM {collection} WHERE {ID} = ?1"),
                params![id.to_hex()],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|body| serde_json::from_str(&body))
            .transpose()
            .map_err(StoreError::from)
    }

    /// All documents matching `filter`, in the store's natural order.
    pub fn find_by_fields<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: &Filter<'_>,
    ) -> Result<Vec<(DocumentId, T)>, StoreError> {
        let rows = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {ID}, {BODY} FROM {collection}{}",
                where_clause(filter)
            ))?;
            stmt.query_map(params_from_iter(filter.iter().map(|(_, value)| *value)), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?
        };

        let mut docs = Vec::with_capacity(rows.len());
        for (id_hex, body) in rows {
            let Ok(id) = DocumentId::parse(&id_hex) else {
                log::warn!("Collection {collection} contains invalid document id {id_hex}, skipping");
                continue;
            };
            docs.push((id, serde_json::from_str(&body)?));
        }
        Ok(docs)
    }

    pub fn exists(&self, collection: &str, filter: &Filter<'_>) -> Result<bool, StoreError> {
        let found: Option<i64> = self
            .conn()?
            .query_row(
                &format!("SELECT 1 FROM {collection}{} LIMIT 1", where_clause(filter)),
                params_from_iter(filter.iter().map(|(_, value)| *value)),
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Merges `patch` into the stored document: keys present in the patch
    /// overwrite, every other key stays as it was.
    ///
    /// Returns whether a document with that id existed.
    pub fn merge<P: Serialize>(
        &self,
        collection: &str,
        id: &DocumentId,
        patch: &P,
    ) -> Result<bool, StoreError> {
        let patch = serde_json::to_string(patch)?;
        let updated = self.conn()?.execute(
            &format!("UPDATE {collection} SET {BODY} = json_patch({BODY}, ?2) WHERE {ID} = ?1"),
            params![id.to_hex(), patch],
        )?;
        Ok(updated > 0)
    }

    pub fn delete_by_id(&self, collection: &str, id: &DocumentId) -> Result<usize, StoreError> {
        Ok(self.conn()?.execute(
            &format!("DELETE FROM {collection} WHERE {ID} = ?1"),
            params![id.to_hex()],
        )?)
    }

    pub fn delete_by_fields(&self, collection: &str, filter: &Filter<'_>) -> Result<usize, StoreError> {
        Ok(self.conn()?.execute(
            &format!("DELETE FROM {collection}{}", where_clause(filter)),
            params_from_iter(filter.iter().map(|(_, value)| *value)),
        )?)
    }

    pub fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let count: i64 = self.conn()?.query_row(
            &format!("SELECT COUNT(*) FROM {collection}"),
            [],
            |row| row.get(0),
        )?;
        usize::try_from(count)
            .map_err(|e| StoreError::Internal(anyhow!("negative document count {count}: {e}")))
    }
}

fn where_clause(filter: &Filter<'_>) -> String {
    if filter.is_empty() {
        return String::new();
    }
    let conditions = filter
        .iter()
        .enumerate()
        .map(|(i, (field, _))| format!("json_extract({BODY}, '$.{field}') = ?{}", i + 1))
        .collect::<Vec<_>>();
    format!(" WHERE {}", conditions.join(" AND "))
}
