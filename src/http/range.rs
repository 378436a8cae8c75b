//! Serving audio files with single-range `Range: bytes=...` support

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::Path,
};

use rouille::{Response, ResponseBody};
use thiserror::Error;

use crate::domain::track::MediaType;

const UNIT_PREFIX: &str = "bytes=";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("malformed range header {0:?}")]
    Malformed(String),

    #[error("range not satisfiable, file has {size} bytes")]
    Unsatisfiable { size: u64 },
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    Range(#[from] RangeError),

    #[error("filesystem error: {0}")]
    Fs(#[from] io::Error),
}

/// Inclusive byte window of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Parses `bytes=start-end`, `bytes=start-` and `bytes=-suffix` against a file of `size` bytes.
    ///
    /// `end` is clamped to the last byte. Multiple ranges are not supported.
    pub fn parse(header: &str, size: u64) -> Result<Self, RangeError> {
        let malformed = || RangeError::Malformed(header.to_string());
        let unsatisfiable = || RangeError::Unsatisfiable { size };

        let header = header.trim();
        let ranges = header
            .get(..UNIT_PREFIX.len())
            .filter(|unit| unit.eq_ignore_ascii_case(UNIT_PREFIX))
            .and_then(|_| header.get(UNIT_PREFIX.len()..))
            .ok_or_else(malformed)?;

        if ranges.contains(',') {
            return Err(malformed());
        }
        let (first, last) = ranges.split_once('-').ok_or_else(malformed)?;
        let (first, last) = (first.trim(), last.trim());

        match (first.is_empty(), last.is_empty()) {
            (true, true) => Err(malformed()),
            (true, false) => {
                let suffix = parse_position(last).ok_or_else(malformed)?;
                if suffix == 0 || size == 0 {
                    return Err(unsatisfiable());
                }
                Ok(Self {
                    start: size.saturating_sub(suffix),
                    end: size - 1,
                })
            }
            (false, _) => {
                let start = parse_position(first).ok_or_else(malformed)?;
                let end = if last.is_empty() {
                    None
                } else {
                    Some(parse_position(last).ok_or_else(malformed)?)
                };

                if start >= size || end.is_some_and(|end| end < start) {
                    return Err(unsatisfiable());
                }
                Ok(Self {
                    start,
                    end: end.map_or(size - 1, |end| end.min(size - 1)),
                })
            }
        }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

fn parse_position(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Body of a media response
#[derive(Debug)]
pub enum Payload {
    /// the whole file, streamed from the open handle
    Whole(File),
    /// a window already read into memory
    Window(Vec<u8>),
}

/// Status, payload and headers of a media response, before it is handed to the HTTP server
#[derive(Debug)]
pub struct MediaResponse {
    pub status: u16,
    pub body: Payload,
    pub headers: Vec<(&'static str, String)>,
}

impl MediaResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn into_response(self) -> Response {
        Response {
            status_code: self.status,
            headers: self
                .headers
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
            data: match self.body {
                Payload::Whole(file) => ResponseBody::from_file(file),
                Payload::Window(bytes) => ResponseBody::from_data(bytes),
            },
            upgrade: None,
        }
    }
}

/// Serves the whole file, or the window named by `range_header`.
///
/// The size is taken from the open file on every call. The whole file is streamed from
/// the handle, a window is read up front and the handle is dropped before returning.
pub fn serve(path: &Path, range_header: Option<&str>) -> Result<MediaResponse, ServeError> {
    let media_type = MediaType::from_path(path);
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();

    let Some(range_header) = range_header else {
        log::debug!("STREAM {} -> 200, {} bytes", path.to_string_lossy(), size);

        return Ok(MediaResponse {
            status: 200,
            body: Payload::Whole(file),
            headers: vec![("Content-Type", media_type.as_str().to_string())],
        });
    };

    let range = ByteRange::parse(range_header, size)?;
    let body = read_window(&mut file, range)?;
    log::debug!(
        "STREAM {} -> 206, {}",
        path.to_string_lossy(),
        range.content_range(size)
    );

    Ok(MediaResponse {
        status: 206,
        body: Payload::Window(body),
        headers: vec![
            ("Content-Type", media_type.as_str().to_string()),
            ("Content-Range", range.content_range(size)),
            ("Accept-Ranges", "bytes".to_string()),
        ],
    })
}

fn read_window(file: &mut File, range: ByteRange) -> io::Result<Vec<u8>> {
    let len = usize::try_from(range.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "range too large"))?;
    file.seek(SeekFrom::Start(range.start))?;
    let mut body = vec![0u8; len];
    file.read_exact(&mut body)?;
    Ok(body)
}
