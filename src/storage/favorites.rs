use crate::{
    domain::{favorite::Favorite, id::DocumentId},
    storage::{
        error::StoreError,
        schema::{
            FAVORITES,
            fields::{OWNER_ID, TRACK_ID},
        },
        store::DocumentStore,
    },
};

/// Append-only join records between users and tracks.
///
/// Duplicates are not prevented here. The "already a favorite" check belongs to the caller
/// and is not atomic with [`FavoriteRepository::create`].
pub struct FavoriteRepository<'a> {
    store: &'a DocumentStore,
}

impl<'a> FavoriteRepository<'a> {
    pub fn new(store: &'a DocumentStore) -> Self {
        Self { store }
    }

    /// Fails with [`StoreError::InvalidDocumentId`] for a malformed track id
    pub fn create(&self, owner_id: &str, track_id: &str) -> Result<(), StoreError> {
        let favorite = Favorite {
            owner_id: owner_id.to_string(),
            track_id: DocumentId::parse(track_id)?,
        };
        self.store.insert(FAVORITES, &favorite)?;
        Ok(())
    }

    /// Removes every record of the pair; removing a pair that was never marked is a no-op.
    pub fn delete(&self, owner_id: &str, track_id: &str) -> Result<(), StoreError> {
        let track_id = DocumentId::parse(track_id)?.to_hex();
        let removed = self
            .store
            .delete_by_fields(FAVORITES, &[(OWNER_ID, owner_id), (TRACK_ID, track_id.as_str())])?;
        log::debug!("Removed {removed} favorite record(s) of {owner_id} for {track_id}");
        Ok(())
    }

    pub fn exists(&self, owner_id: &str, track_id: &DocumentId) -> Result<bool, StoreError> {
        let track_id = track_id.to_hex();
        self.store
            .exists(FAVORITES, &[(OWNER_ID, owner_id), (TRACK_ID, track_id.as_str())])
    }

    /// Track ids favorited by `owner_id`, in no particular order
    pub fn get_by_owner(&self, owner_id: &str) -> Result<Vec<DocumentId>, StoreError> {
        Ok(self
            .store
            .find_by_fields::<Favorite>(FAVORITES, &[(OWNER_ID, owner_id)])?
            .into_iter()
            .map(|(_, favorite)| favorite.track_id)
            .collect())
    }
}
