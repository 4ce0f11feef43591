//! Music-box library database: a hierarchical store of groups and tracks built
//! from M3U playlists and persisted in the music-box text format.

pub mod config;
pub mod error;
pub mod library;
pub mod store;

pub use error::{FormatError, PlaylistError, ProbeError, StoreError};
pub use store::{Encoding, Store, StoreState};
