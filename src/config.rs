use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub version: u32,
    pub database: Database,
    pub media: Media,
    pub http: HttpConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.to_string_lossy()))?;
        let mut config: Config =
            toml::from_str(&contents).with_context(|| "Failed to parse config TOML")?;
        config.media.root = std::path::absolute(&config.media.root)
            .with_context(|| "Failed to resolve media root")?;
        Ok(config)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub port: u16,
}

/// Where the document store lives.
///
/// `uri` is either `memory:` or `file:<path>`.
#[derive(Debug, Deserialize, Clone)]
pub struct Database {
    pub uri: String,
}

impl Database {
    pub fn in_memory() -> Self {
        Self {
            uri: "memory:".to_string(),
        }
    }
}

/// Where uploaded audio files are written
#[derive(Debug, Deserialize, Clone)]
pub struct Media {
    pub root: PathBuf,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}
