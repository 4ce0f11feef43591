use std::cell::OnceCell;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::display::{display_name, title_from_filename};
use super::probe::Prober;

/// Largest group id; also the reserved id of the search-results scratch group.
pub const MAX_GID: u32 = 999_999;
/// Largest track id. Track ids live in `(MAX_GID, MAX_TID]`.
pub const MAX_TID: u32 = u32::MAX;
/// Pseudo-group holding the latest search results. Never loaded or saved.
pub const SEARCH_RESULTS_GID: GroupId = GroupId(MAX_GID);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u32);

impl GroupId {
    /// The unnamed top-level group, its own parent.
    pub const TOP_LEVEL: GroupId = GroupId(0);

    /// Whether `raw` may appear as a group id in a music-box file.
    pub fn is_persistable(raw: u32) -> bool {
        raw <= MAX_GID && raw != SEARCH_RESULTS_GID.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u32);

impl TrackId {
    pub const FIRST: TrackId = TrackId(MAX_GID + 1);

    pub fn in_range(raw: u32) -> bool {
        raw > MAX_GID && raw <= MAX_TID
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Either kind of node, for operations that accept both.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeId {
    Group(GroupId),
    Track(TrackId),
}

impl NodeId {
    /// Classify a raw id by the range it falls in.
    pub fn from_raw(raw: u32) -> NodeId {
        if raw <= MAX_GID {
            NodeId::Group(GroupId(raw))
        } else {
            NodeId::Track(TrackId(raw))
        }
    }
}

impl From<GroupId> for NodeId {
    fn from(gid: GroupId) -> Self {
        NodeId::Group(gid)
    }
}

impl From<TrackId> for NodeId {
    fn from(tid: TrackId) -> Self {
        NodeId::Track(tid)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    pub gid: GroupId,
    pub pgid: GroupId,
    pub name: String,
}

impl Group {
    pub fn new(gid: GroupId, name: impl Into<String>, pgid: GroupId) -> Self {
        Self {
            gid,
            pgid,
            name: name.into(),
        }
    }

    pub fn top_level() -> Self {
        Self::new(GroupId::TOP_LEVEL, "", GroupId::TOP_LEVEL)
    }

    pub fn is_top_level(&self) -> bool {
        self.gid == GroupId::TOP_LEVEL
    }

    /// Case-insensitive name with the id as tie-break.
    pub fn order_key(&self) -> (String, u32) {
        (self.name.to_lowercase(), self.gid.0)
    }
}

/// Tag data cached on a track after its first probe.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackMeta {
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub number: Option<u32>,
    /// Duration read from the file, if the probe succeeded.
    pub secs: Option<f64>,
}

impl TrackMeta {
    /// Values used when the file cannot be probed.
    pub fn fallback(path: &Path) -> Self {
        Self {
            title: title_from_filename(path),
            ..Self::default()
        }
    }

    pub fn resolve(path: &Path, prober: &dyn Prober) -> Self {
        match prober.probe(path) {
            Ok(probe) => probe.into_meta(path),
            Err(err) => {
                debug!("using fallback metadata: {err}");
                Self::fallback(path)
            }
        }
    }
}

/// A leaf referencing one audio file.
///
/// `secs <= 0` means the duration is unresolved. Tag accessors probe the file
/// once and keep the result until [`Track::refresh`] is called.
#[derive(Clone, Debug)]
pub struct Track {
    pub tid: TrackId,
    pub pgid: GroupId,
    pub filename: PathBuf,
    secs: f64,
    meta: OnceCell<TrackMeta>,
}

impl Track {
    pub fn new(tid: TrackId, filename: impl Into<PathBuf>, secs: f64, pgid: GroupId) -> Self {
        Self {
            tid,
            pgid,
            filename: filename.into(),
            secs,
            meta: OnceCell::new(),
        }
    }

    /// Best known duration without probing; `<= 0` when unresolved.
    pub fn secs(&self) -> f64 {
        if self.secs > 0.0 {
            return self.secs;
        }
        match self.meta.get().and_then(|m| m.secs) {
            Some(secs) if secs > 0.0 => secs,
            _ => self.secs,
        }
    }

    pub fn set_secs(&mut self, secs: f64) {
        self.secs = secs;
    }

    pub fn is_resolved(&self) -> bool {
        self.secs() > 0.0
    }

    pub fn is_probed(&self) -> bool {
        self.meta.get().is_some()
    }

    /// Cached metadata, probing the file on first use.
    pub fn meta(&self, prober: &dyn Prober) -> &TrackMeta {
        self.meta
            .get_or_init(|| TrackMeta::resolve(&self.filename, prober))
    }

    /// Fill the cache from an earlier probe. Ignored if already populated.
    pub fn seed(&self, meta: TrackMeta) {
        let _ = self.meta.set(meta);
    }

    /// Drop cached metadata so the next accessor probes again.
    pub fn refresh(&mut self) {
        self.meta.take();
    }

    pub fn title(&self, prober: &dyn Prober) -> &str {
        &self.meta(prober).title
    }

    pub fn artist(&self, prober: &dyn Prober) -> Option<&str> {
        self.meta(prober).artist.as_deref()
    }

    pub fn album(&self, prober: &dyn Prober) -> Option<&str> {
        self.meta(prober).album.as_deref()
    }

    pub fn number(&self, prober: &dyn Prober) -> Option<u32> {
        self.meta(prober).number
    }

    /// Duration, probing only when it is still unresolved.
    pub fn duration(&self, prober: &dyn Prober) -> f64 {
        if !self.is_resolved() {
            self.meta(prober);
        }
        self.secs()
    }

    /// Name shown in tree paths; never written back in place of the filename.
    pub fn display_name(&self) -> String {
        display_name(&self.filename)
    }

    pub fn order_key(&self) -> (String, u32) {
        (
            self.filename.to_string_lossy().to_lowercase(),
            self.tid.0,
        )
    }
}

/// Durations are compared at the millisecond resolution they are stored with.
impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.tid == other.tid
            && self.pgid == other.pgid
            && self.filename == other.filename
            && same_secs(self.secs(), other.secs())
    }
}

/// Whether two durations agree at the millisecond resolution of the file format.
pub fn same_secs(a: f64, b: f64) -> bool {
    millis(a) == millis(b)
}

fn millis(secs: f64) -> i64 {
    (secs * 1000.0).round() as i64
}
