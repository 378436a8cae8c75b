//! Document persistence for tracks, playlists and favorites

pub mod db;
pub mod error;
pub mod favorites;
pub mod playlists;
pub(crate) mod schema;
pub mod store;
pub mod tracks;

pub use db::connect;
pub use error::StoreError;
pub use store::DocumentStore;
