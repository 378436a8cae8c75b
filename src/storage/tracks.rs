use crate::{
    domain::{
        id::DocumentId,
        track::{NewTrack, Track},
    },
    storage::{
        error::StoreError,
        schema::{TRACKS, fields::OWNER_ID},
        store::DocumentStore,
    },
};

/// Tracks are created once at upload time and never updated or deleted here.
pub struct TrackRepository<'a> {
    store: &'a DocumentStore,
}

impl<'a> TrackRepository<'a> {
    pub fn new(store: &'a DocumentStore) -> Self {
        Self { store }
    }

    /// Stores the track document. Duplicates are accepted.
    pub fn create(&self, track: NewTrack) -> Result<Track, StoreError> {
        let id = self.store.insert(TRACKS, &track)?;
        log::debug!("Created track {id} for owner {}", track.owner_id);
        Ok(track.into_track(id))
    }

    /// Malformed ids are treated exactly like unknown ones
    pub fn get_by_id(&self, id: &str) -> Result<Option<Track>, StoreError> {
        let Ok(id) = DocumentId::parse(id) else {
            return Ok(None);
        };
        Ok(self
            .store
            .find_by_id::<NewTrack>(TRACKS, &id)?
            .map(|track| track.into_track(id)))
    }

    /// All tracks of `owner_id`, in no particular order
    pub fn get_by_owner(&self, owner_id: &str) -> Result<Vec<Track>, StoreError> {
        Ok(self
            .store
            .find_by_fields::<NewTrack>(TRACKS, &[(OWNER_ID, owner_id)])?
            .into_iter()
            .map(|(id, track)| track.into_track(id))
            .collect())
    }
}
