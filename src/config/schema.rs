use serde::{Deserialize, Serialize};

use crate::store::Encoding;

/// Top-level settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/musicbox/config.toml` or `~/.config/musicbox/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `MUSICBOX__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub library: LibrarySettings,
    pub store: StoreSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// File extensions treated as playlists (case-insensitive, without dot).
    pub playlist_extensions: Vec<String>,
    /// Whether to follow symlinks while scanning.
    pub follow_links: bool,
    /// Whether to include hidden files/directories (dotfiles).
    pub include_hidden: bool,
    /// Directory names that hold playlists but do not become groups.
    pub flatten_dirs: Vec<String>,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            playlist_extensions: vec!["m3u".into(), "m3u8".into()],
            follow_links: true,
            include_hidden: false,
            flatten_dirs: vec!["playlists".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Gzip music-box files on save.
    pub compress: bool,
    /// Body encoding for newly written files.
    pub encoding: Encoding,
    /// Keep at most this many history entries.
    pub max_history: Option<usize>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            compress: true,
            encoding: Encoding::Flat,
            max_history: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogSettings {
    /// `tracing` filter directive used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
        }
    }
}
