use std::{
    fmt::{self, Display},
    str::FromStr,
    sync::{
        OnceLock,
        atomic::{AtomicU32, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;

pub const ID_LEN: usize = 12;
pub const ID_HEX_LEN: usize = ID_LEN * 2;

/// Identifier the document store assigns to every document on insert.
///
/// Layout: 4 bytes of seconds since the unix epoch, 5 bytes unique to
/// the running process, 3 bytes of a wrapping counter.
/// Rendered as 24 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId([u8; ID_LEN]);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid document id {0:?}")]
pub struct InvalidDocumentId(pub String);

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn process_seed() -> &'static blake3::Hash {
    static SEED: OnceLock<blake3::Hash> = OnceLock::new();
    SEED.get_or_init(|| {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let mut hasher = blake3::Hasher::new();
        hasher.update(&std::process::id().to_be_bytes());
        hasher.update(&nanos.to_be_bytes());
        hasher.finalize()
    })
}

impl DocumentId {
    /// generates a fresh id, unique within this process and very likely across processes
    pub fn generate() -> Self {
        let seed = process_seed().as_bytes();
        let secs = Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32;

        let counter_base = u32::from_be_bytes([0, seed[5], seed[6], seed[7]]);
        let counter = counter_base.wrapping_add(COUNTER.fetch_add(1, Ordering::Relaxed)) & 0x00ff_ffff;

        let mut bytes = [0u8; ID_LEN];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(&seed[..5]);
        bytes[9..].copy_from_slice(&counter.to_be_bytes()[1..]);
        Self(bytes)
    }

    /// The only place where a string is checked for being a well-formed document id.
    pub fn parse(s: &str) -> Result<Self, InvalidDocumentId> {
        if s.len() != ID_HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidDocumentId(s.to_string()));
        }

        let mut bytes = [0u8; ID_LEN];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| InvalidDocumentId(s.to_string()))?;
        }
        Ok(Self(bytes))
    }

    /// keeps well-formed ids in order and silently drops the rest
    pub fn parse_lossy<I, S>(candidates: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        candidates
            .into_iter()
            .filter_map(|s| Self::parse(s.as_ref()).ok())
            .collect()
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// time the id was generated, second precision
    pub fn created_at(&self) -> DateTime<Utc> {
        let secs = u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]]);
        DateTime::from_timestamp(secs as i64, 0).unwrap_or_default()
    }
}

impl Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for DocumentId {
    type Err = InvalidDocumentId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DocumentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for DocumentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(de::Error::custom)
    }
}
