use crate::{
    domain::{
        id::DocumentId,
        playlist::{NewPlaylist, Playlist, PlaylistPatch},
    },
    storage::{
        error::StoreError,
        schema::{PLAYLISTS, fields::OWNER_ID},
        store::DocumentStore,
    },
};

/// Playlist documents.
///
/// Ownership is not checked here. Callers fetch with [`PlaylistRepository::get_by_id`]
/// and compare the owner before updating or deleting, answering a mismatch like a missing playlist.
pub struct PlaylistRepository<'a> {
    store: &'a DocumentStore,
}

impl<'a> PlaylistRepository<'a> {
    pub fn new(store: &'a DocumentStore) -> Self {
        Self { store }
    }

    pub fn create(&self, playlist: NewPlaylist) -> Result<Playlist, StoreError> {
        let id = self.store.insert(PLAYLISTS, &playlist)?;
        Ok(playlist.into_playlist(id))
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<Playlist>, StoreError> {
        let Ok(id) = DocumentId::parse(id) else {
            return Ok(None);
        };
        Ok(self
            .store
            .find_by_id::<NewPlaylist>(PLAYLISTS, &id)?
            .map(|playlist| playlist.into_playlist(id)))
    }

    /// Overwrites only the fields set in `patch`.
    ///
    /// Returns false when no playlist has that id; an empty patch never touches the store.
    pub fn update(&self, id: &str, patch: &PlaylistPatch) -> Result<bool, StoreError> {
        let Ok(id) = DocumentId::parse(id) else {
            return Ok(false);
        };
        if patch.is_empty() {
            return Ok(self.store.find_by_id::<NewPlaylist>(PLAYLISTS, &id)?.is_some());
        }
        self.store.merge(PLAYLISTS, &id, patch)
    }

    /// Deleting an unknown id is a no-op
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let Ok(id) = DocumentId::parse(id) else {
            return Ok(());
        };
        let deleted = self.store.delete_by_id(PLAYLISTS, &id)?;
        log::debug!("Deleted {deleted} playlist(s) with id {id}");
        Ok(())
    }

    pub fn get_by_owner(&self, owner_id: &str) -> Result<Vec<Playlist>, StoreError> {
        Ok(self
            .store
            .find_by_fields::<NewPlaylist>(PLAYLISTS, &[(OWNER_ID, owner_id)])?
            .into_iter()
            .map(|(id, playlist)| playlist.into_playlist(id))
            .collect())
    }
}
