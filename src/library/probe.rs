//! Metadata probing: reading duration and tags from an audio file.

use std::path::Path;

use lofty::prelude::*;

use super::display::title_from_filename;
use super::model::TrackMeta;
use crate::error::ProbeError;

/// Best-effort tag data for one file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Probe {
    pub secs: f64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub number: Option<u32>,
}

impl Probe {
    /// Convert into cached metadata, deriving a title from `path` when the tag has none.
    pub fn into_meta(self, path: &Path) -> TrackMeta {
        TrackMeta {
            title: self.title.unwrap_or_else(|| title_from_filename(path)),
            artist: self.artist,
            album: self.album,
            number: self.number.filter(|n| *n > 0),
            secs: (self.secs > 0.0).then_some(self.secs),
        }
    }
}

/// Resolves tag data for a file path.
pub trait Prober {
    fn probe(&self, path: &Path) -> Result<Probe, ProbeError>;
}

/// Reads tags and audio properties with `lofty`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyProber;

impl Prober for LoftyProber {
    fn probe(&self, path: &Path) -> Result<Probe, ProbeError> {
        if !path.is_file() {
            return Err(ProbeError::NotFound(path.to_path_buf()));
        }
        let tagged = lofty::read_from_path(path).map_err(|err| ProbeError::Unreadable {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

        let mut probe = Probe {
            secs: tagged.properties().duration().as_secs_f64(),
            ..Probe::default()
        };
        if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
            probe.title = non_blank(tag.title().as_deref());
            probe.artist = non_blank(tag.artist().as_deref());
            probe.album = non_blank(tag.album().as_deref());
            probe.number = tag.track();
        }
        Ok(probe)
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
