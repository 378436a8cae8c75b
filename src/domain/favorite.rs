use serde::{Deserialize, Serialize};

use super::id::DocumentId;

/// Join record between a user and a track they marked as favorite.
///
/// The store gives every record its own id, but it is never handed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub owner_id: String,
    pub track_id: DocumentId,
}
