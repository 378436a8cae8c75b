use std::{
    path::PathBuf,
    sync::{Arc, Mutex, OnceLock, PoisonError},
};

use rusqlite::Connection;

use crate::{
    config::Database,
    storage::{error::StoreError, store::DocumentStore},
};

const MEMORY_SCHEME: &str = "memory:";
const FILE_SCHEME: &str = "file:";

/// Parsed form of the configured store connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    InMemory,
    File(PathBuf),
}

impl Endpoint {
    pub fn parse(uri: &str) -> Result<Self, StoreError> {
        let uri = uri.trim();
        if uri == MEMORY_SCHEME {
            return Ok(Self::InMemory);
        }
        match uri.strip_prefix(FILE_SCHEME) {
            Some(path) if !path.is_empty() => Ok(Self::File(PathBuf::from(path))),
            _ => Err(StoreError::Connection(format!(
                "malformed connection string {uri:?}, expected \"{MEMORY_SCHEME}\" or \"{FILE_SCHEME}<path>\""
            ))),
        }
    }
}

/// Opens a new connection to the store described by `config`.
///
/// Any failure, including schema setup, is reported as [`StoreError::Connection`].
pub fn open(config: &Database) -> Result<DocumentStore, StoreError> {
    let conn = match Endpoint::parse(&config.uri)? {
        Endpoint::InMemory => Connection::open_in_memory(),
        Endpoint::File(path) => Connection::open(&path),
    }
    .map_err(|e| StoreError::Connection(format!("{}: {e}", config.uri)))?;

    DocumentStore::from_existing_conn(conn)
        .map_err(|e| StoreError::Connection(format!("{}: {e}", config.uri)))
}

/// Store handle that is connected on first use and shared afterwards.
///
/// Initialisation runs under a lock, so concurrent first callers open a single connection.
/// A failed attempt leaves the handle unset and the next caller tries again.
pub struct LazyStore {
    store: OnceLock<Arc<DocumentStore>>,
    init: Mutex<()>,
}

impl LazyStore {
    pub const fn new() -> Self {
        Self {
            store: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    pub fn get_or_connect(&self, config: &Database) -> Result<Arc<DocumentStore>, StoreError> {
        if let Some(store) = self.store.get() {
            return Ok(Arc::clone(store));
        }

        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(store) = self.store.get() {
            return Ok(Arc::clone(store));
        }

        let store = Arc::new(open(config)?);
        log::info!("Connected to document store at {}", config.uri);
        Ok(Arc::clone(self.store.get_or_init(|| store)))
    }
}

impl Default for LazyStore {
    fn default() -> Self {
        Self::new()
    }
}

static STORE: LazyStore = LazyStore::new();

/// Returns the process-wide store handle, connecting on the first call
pub fn connect(config: &Database) -> Result<Arc<DocumentStore>, StoreError> {
    STORE.get_or_connect(config)
}
