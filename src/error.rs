//! Error types shared by the store, the codec and the library collaborators.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::library::{GroupId, TrackId};
use crate::store::StoreState;

/// A fatal problem in a music-box file, tagged with the 1-based line it was found on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("error:{line}: {reason}")]
pub struct FormatError {
    pub line: usize,
    pub reason: String,
}

impl FormatError {
    pub fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("store is {0}; only a ready store can be saved")]
    NotReady(StoreState),

    #[error("no filename has been set for this store")]
    NoFilename,

    #[error("unknown group {0}")]
    UnknownGroup(GroupId),

    #[error("unknown track {0}")]
    UnknownTrack(TrackId),

    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("group {parent} already has a sub-group named {name:?}")]
    DuplicateGroup { parent: GroupId, name: String },

    #[error("no {0} ids left to assign")]
    IdsExhausted(&'static str),
}

/// Why a file's tags could not be read. Never fatal to a scan or a lookup.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("missing file: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read tags from {}: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum PlaylistError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("{line}:{message}")]
    Format { line: usize, message: String },
}
