use serde::{Deserialize, Serialize};

use super::id::DocumentId;

/// Body of a playlist document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlaylist {
    pub name: String,
    pub owner_id: String,
    #[serde(default)]
    pub track_refs: Vec<DocumentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: DocumentId,
    pub name: String,
    pub owner_id: String,
    pub track_refs: Vec<DocumentId>,
}

impl NewPlaylist {
    /// Builds a playlist body from untrusted track id candidates.
    ///
    /// Malformed candidates are dropped, not rejected.
    pub fn new<I, S>(name: impl Into<String>, owner_id: impl Into<String>, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: name.into(),
            owner_id: owner_id.into(),
            track_refs: DocumentId::parse_lossy(candidates),
        }
    }

    pub fn into_playlist(self, id: DocumentId) -> Playlist {
        Playlist {
            id,
            name: self.name,
            owner_id: self.owner_id,
            track_refs: self.track_refs,
        }
    }
}

impl Playlist {
    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }
}

/// Partial update of a playlist. Only fields set to `Some` are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlaylistPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_refs: Option<Vec<DocumentId>>,
}

impl PlaylistPatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            track_refs: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// replaces the track list, dropping malformed candidates
    pub fn with_track_refs<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.track_refs = Some(DocumentId::parse_lossy(candidates));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.track_refs.is_none()
    }
}
