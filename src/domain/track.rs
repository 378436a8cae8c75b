use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::id::DocumentId;

/// Body of a track document, as written to the `tracks` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTrack {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    /// absolute path of the stored audio file
    pub file_path: PathBuf,
    pub owner_id: String,
}

/// Represent an uploaded music track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: DocumentId,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub file_path: PathBuf,
    pub owner_id: String,
}

impl NewTrack {
    pub fn into_track(self, id: DocumentId) -> Track {
        Track {
            id,
            title: self.title,
            artist: self.artist,
            album: self.album,
            genre: self.genre,
            file_path: self.file_path,
            owner_id: self.owner_id,
        }
    }
}

impl Track {
    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }
}

/// Media type announced when streaming a track.
///
/// Derived purely from the file extension, the content is never sniffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Flac,
    Mpeg,
}

impl MediaType {
    pub fn from_path(path: &Path) -> Self {
        let is_flac = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("flac"));
        if is_flac { Self::Flac } else { Self::Mpeg }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Flac => "audio/flac",
            MediaType::Mpeg => "audio/mpeg",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_from_extension() {
        assert_eq!(MediaType::from_path(Path::new("/m/a.flac")), MediaType::Flac);
        assert_eq!(MediaType::from_path(Path::new("/m/a.FLAC")), MediaType::Flac);
        assert_eq!(MediaType::from_path(Path::new("/m/a.mp3")), MediaType::Mpeg);
        assert_eq!(MediaType::from_path(Path::new("/m/a.wav")), MediaType::Mpeg);
        assert_eq!(MediaType::from_path(Path::new("/m/flac")), MediaType::Mpeg);
        assert_eq!(MediaType::Flac.as_str(), "audio/flac");
        assert_eq!(MediaType::Mpeg.as_str(), "audio/mpeg");
    }
}
