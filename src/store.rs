//! The music-box store: the whole library in memory plus its on-disk codec.
//!
//! Groups and tracks live in flat arenas keyed by id, each node pointing at
//! its parent group. Tree-shaped views (paths, pre-order walks, the
//! indentation encoding) are derived from the parent pointers on demand.

mod emit;
mod format;
mod parse;
mod paths;

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tracing::{debug, info};

use crate::error::{FormatError, StoreError};
use crate::library::{
    Group, GroupId, MAX_GID, MAX_TID, SEARCH_RESULTS_GID, Track, TrackId, same_secs,
};

pub use format::{Encoding, INDENT, MAGIC, Section, VERSION};
pub use paths::Paths;

/// Where a store is in its load/save lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StoreState {
    Empty,
    Loading,
    Ready,
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreState::Empty => f.write_str("empty"),
            StoreState::Loading => f.write_str("loading"),
            StoreState::Ready => f.write_str("ready"),
        }
    }
}

/// The track being played and where to resume it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Current {
    pub track: TrackId,
    /// Resume position in seconds.
    pub position: f64,
}

#[derive(Debug)]
pub struct Store {
    filename: Option<PathBuf>,
    encoding: Encoding,
    state: StoreState,
    groups: Vec<Group>,
    group_slots: HashMap<GroupId, usize>,
    tracks: Vec<Track>,
    track_slots: HashMap<TrackId, usize>,
    bookmarks: Vec<TrackId>,
    history: VecDeque<TrackId>,
    current: Option<Current>,
    search_results: Vec<TrackId>,
    next_gid: u32,
    next_tid: u64,
    dirty: bool,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        let mut store = Self {
            filename: None,
            encoding: Encoding::default(),
            state: StoreState::Empty,
            groups: Vec::new(),
            group_slots: HashMap::new(),
            tracks: Vec::new(),
            track_slots: HashMap::new(),
            bookmarks: Vec::new(),
            history: VecDeque::new(),
            current: None,
            search_results: Vec::new(),
            next_gid: 1,
            next_tid: u64::from(TrackId::FIRST.0),
            dirty: false,
        };
        store.clear();
        store
    }

    /// Create a store backed by `path`, loading it if the file exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut store = Self::new();
        store.set_filename(path)?;
        Ok(store)
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    /// Point the store at `path`; an existing file replaces the current contents.
    pub fn set_filename(&mut self, path: &Path) -> Result<(), StoreError> {
        self.filename = Some(path.to_path_buf());
        if path.exists() {
            self.load(path)?;
        }
        Ok(())
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Choose the body encoding used by the next save.
    pub fn set_encoding(&mut self, encoding: Encoding) {
        if self.encoding != encoding {
            self.encoding = encoding;
            self.dirty = true;
        }
    }

    /// Whether the store changed since it was last loaded, saved or cleared.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flag an edit the store cannot see, such as one made through [`Store::track_mut`].
    pub fn set_dirty(&mut self) {
        self.dirty = true;
    }

    /// Drop every group, track, bookmark and marker, leaving only the top-level group.
    pub fn clear(&mut self) {
        self.groups.clear();
        self.group_slots.clear();
        self.tracks.clear();
        self.track_slots.clear();
        self.bookmarks.clear();
        self.history.clear();
        self.current = None;
        self.search_results.clear();
        self.next_gid = 1;
        self.next_tid = u64::from(TrackId::FIRST.0);
        self.insert_group(Group::top_level());
        self.state = StoreState::Empty;
        self.dirty = false;
    }

    /// Replace the contents with the file at `path`, which becomes the backing file.
    pub fn load(&mut self, path: &Path) -> Result<(), StoreError> {
        self.filename = Some(path.to_path_buf());
        self.clear();
        let file = File::open(path)?;
        self.load_from(file)?;
        info!(
            "loaded {} ({} groups, {} tracks, {} encoding)",
            path.display(),
            self.groups.len() - 1,
            self.tracks.len(),
            self.encoding
        );
        Ok(())
    }

    /// Replace the contents with a plain or gzip-compressed stream.
    ///
    /// On any error the store is left cleared and `Empty`.
    pub fn load_from<R: Read + Seek>(&mut self, mut reader: R) -> Result<(), StoreError> {
        self.clear();
        self.state = StoreState::Loading;
        let result = read_text(&mut reader)
            .and_then(|text| parse::parse(self, &text).map_err(StoreError::from));
        match result {
            Ok(()) => {
                self.state = StoreState::Ready;
                self.dirty = false;
                Ok(())
            }
            Err(err) => {
                debug!("load failed, discarding partial store: {err}");
                self.clear();
                Err(err)
            }
        }
    }

    /// Write the store to its backing file.
    ///
    /// The indentation encoding carries no ids, so the store is first
    /// renumbered into document order and equals what a reload produces.
    pub fn save(&mut self, compress: bool) -> Result<(), StoreError> {
        if self.state != StoreState::Ready {
            return Err(StoreError::NotReady(self.state));
        }
        let path = self.filename.clone().ok_or(StoreError::NoFilename)?;
        if self.encoding == Encoding::Tree {
            self.renumber();
        }
        let file = BufWriter::new(File::create(&path)?);
        if compress {
            let mut gz = GzEncoder::new(file, Compression::best());
            self.write_to(&mut gz)?;
            gz.finish()?.flush()?;
        } else {
            let mut file = file;
            self.write_to(&mut file)?;
            file.flush()?;
        }
        info!(
            "saved {} ({} encoding{})",
            path.display(),
            self.encoding,
            if compress { ", compressed" } else { "" }
        );
        self.dirty = false;
        Ok(())
    }

    pub fn save_as(&mut self, path: &Path, compress: bool) -> Result<(), StoreError> {
        self.filename = Some(path.to_path_buf());
        self.save(compress)
    }

    /// Serialize as plain text in the store's encoding.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        emit::write(self, writer)
    }

    // --- construction ---

    /// Add a named sub-group. Sibling names must be unique, and neither names
    /// nor filenames may hold tabs, line breaks, a leading format marker or
    /// trailing whitespace.
    pub fn add_group(&mut self, name: impl Into<String>, parent: GroupId) -> Result<GroupId, StoreError> {
        let name = name.into();
        self.require_group(parent)?;
        if let Err(reason) = format::check_name(&name) {
            return Err(StoreError::InvalidName { name, reason });
        }
        if self.child_group(parent, &name).is_some() {
            return Err(StoreError::DuplicateGroup { parent, name });
        }
        if self.next_gid >= MAX_GID {
            return Err(StoreError::IdsExhausted("group"));
        }
        let gid = GroupId(self.next_gid);
        self.insert_group(Group::new(gid, name, parent));
        self.touch();
        Ok(gid)
    }

    pub fn add_track(
        &mut self,
        filename: impl Into<PathBuf>,
        secs: f64,
        parent: GroupId,
    ) -> Result<TrackId, StoreError> {
        let filename = filename.into();
        self.require_group(parent)?;
        let checked = match filename.to_str() {
            Some(text) => format::check_name(text),
            None => Err("not valid UTF-8"),
        };
        if let Err(reason) = checked {
            return Err(StoreError::InvalidName {
                name: filename.to_string_lossy().into_owned(),
                reason,
            });
        }
        if self.next_tid > u64::from(MAX_TID) {
            return Err(StoreError::IdsExhausted("track"));
        }
        let tid = TrackId(self.next_tid as u32);
        self.insert_track(Track::new(tid, filename, secs, parent));
        self.touch();
        Ok(tid)
    }

    /// The sub-group of `parent` called `name`, if any.
    pub fn child_group(&self, parent: GroupId, name: &str) -> Option<GroupId> {
        self.child_groups(parent)
            .find(|g| g.name == name)
            .map(|g| g.gid)
    }

    /// Walk (creating as needed) the chain of named sub-groups below `parent`.
    pub fn ensure_group_path<S: AsRef<str>>(
        &mut self,
        parent: GroupId,
        names: &[S],
    ) -> Result<GroupId, StoreError> {
        let mut gid = parent;
        for name in names {
            let name = name.as_ref();
            gid = match self.child_group(gid, name) {
                Some(existing) => existing,
                None => self.add_group(name, gid)?,
            };
        }
        Ok(gid)
    }

    /// First track with this filename, searching one group or the whole store.
    pub fn track_by_filename(&self, parent: Option<GroupId>, filename: &Path) -> Option<TrackId> {
        self.tracks
            .iter()
            .filter(|t| parent.is_none_or(|p| t.pgid == p))
            .find(|t| t.filename == filename)
            .map(|t| t.tid)
    }

    // --- queries ---

    pub fn group(&self, gid: GroupId) -> Option<&Group> {
        self.group_slots.get(&gid).map(|&slot| &self.groups[slot])
    }

    pub fn track(&self, tid: TrackId) -> Option<&Track> {
        self.track_slots.get(&tid).map(|&slot| &self.tracks[slot])
    }

    pub fn track_mut(&mut self, tid: TrackId) -> Option<&mut Track> {
        let slot = *self.track_slots.get(&tid)?;
        self.tracks.get_mut(slot)
    }

    /// Every group, top-level first, in construction/load order.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn child_groups(&self, parent: GroupId) -> impl Iterator<Item = &Group> {
        self.groups
            .iter()
            .filter(move |g| g.pgid == parent && !g.is_top_level())
    }

    pub fn child_tracks(&self, parent: GroupId) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(move |t| t.pgid == parent)
    }

    /// Children of `parent` ordered case-insensitively by name, id as tie-break.
    pub fn sorted_children(&self, parent: GroupId) -> (Vec<&Group>, Vec<&Track>) {
        let mut groups: Vec<&Group> = self.child_groups(parent).collect();
        let mut tracks: Vec<&Track> = self.child_tracks(parent).collect();
        groups.sort_by_cached_key(|g| g.order_key());
        tracks.sort_by_cached_key(|t| t.order_key());
        (groups, tracks)
    }

    // --- bookmarks, history, current ---

    pub fn bookmarks(&self) -> &[TrackId] {
        &self.bookmarks
    }

    pub fn add_bookmark(&mut self, tid: TrackId) -> Result<(), StoreError> {
        self.require_track(tid)?;
        self.bookmarks.push(tid);
        self.dirty = true;
        Ok(())
    }

    pub fn remove_bookmark(&mut self, index: usize) -> Option<TrackId> {
        let removed = (index < self.bookmarks.len()).then(|| self.bookmarks.remove(index));
        self.dirty |= removed.is_some();
        removed
    }

    /// Played tracks, most recent first.
    pub fn history(&self) -> &VecDeque<TrackId> {
        &self.history
    }

    pub fn push_history(&mut self, tid: TrackId) -> Result<(), StoreError> {
        self.require_track(tid)?;
        self.history.push_front(tid);
        self.dirty = true;
        Ok(())
    }

    /// Record a play: move `tid` to the front of the history (keeping at most
    /// `cap` entries) and adopt the duration the player reported if it differs
    /// from the stored one. Returns whether anything changed.
    pub fn history_add_to(&mut self, tid: TrackId, secs: f64, cap: usize) -> Result<bool, StoreError> {
        self.require_track(tid)?;
        let mut changed = false;
        if self.history.front() != Some(&tid) {
            self.history.retain(|t| *t != tid);
            self.history.push_front(tid);
            self.history.truncate(cap.max(1));
            changed = true;
        }
        if let Some(track) = self.track_mut(tid) {
            if secs > 0.0 && !same_secs(track.secs(), secs) {
                track.set_secs(secs);
                changed = true;
            }
        }
        self.dirty |= changed;
        Ok(changed)
    }

    pub fn history_delete_item(&mut self, index: usize) -> Option<TrackId> {
        let removed = self.history.remove(index);
        self.dirty |= removed.is_some();
        removed
    }

    /// Drop every history entry but the most recent.
    pub fn history_shrink(&mut self) {
        self.truncate_history(1);
    }

    /// Keep only the `cap` most recent history entries.
    pub fn truncate_history(&mut self, cap: usize) {
        if self.history.len() > cap {
            self.history.truncate(cap);
            self.dirty = true;
        }
    }

    pub fn current(&self) -> Option<Current> {
        self.current
    }

    pub fn set_current(&mut self, tid: TrackId, position: f64) -> Result<(), StoreError> {
        self.require_track(tid)?;
        self.current = Some(Current {
            track: tid,
            position,
        });
        self.dirty = true;
        Ok(())
    }

    pub fn clear_current(&mut self) {
        self.dirty |= self.current.take().is_some();
    }

    // --- search scratch scope ---

    /// Fill the search-results pseudo-group with tracks whose display name or
    /// filename contains `needle` (case-insensitive), ranked by the ordering key.
    pub fn search(&mut self, needle: &str) -> &[TrackId] {
        let needle = needle.to_lowercase();
        let mut hits: Vec<&Track> = self
            .tracks
            .iter()
            .filter(|t| {
                t.display_name().to_lowercase().contains(&needle)
                    || t.filename.to_string_lossy().to_lowercase().contains(&needle)
            })
            .collect();
        hits.sort_by_cached_key(|t| t.order_key());
        self.search_results = hits.into_iter().map(|t| t.tid).collect();
        &self.search_results
    }

    pub fn search_results(&self) -> &[TrackId] {
        &self.search_results
    }

    // --- document order ---

    /// Reassign ids in the order the indentation encoding reads them back:
    /// groups pre-order from 1, then top-level tracks followed by each
    /// group's tracks in the same walk. Ids held elsewhere are invalidated.
    pub fn renumber(&mut self) {
        let (group_order, track_order) = self.document_order();
        let gids: HashMap<GroupId, GroupId> = group_order
            .iter()
            .enumerate()
            .map(|(i, gid)| (*gid, GroupId(i as u32)))
            .collect();
        let tids: HashMap<TrackId, TrackId> = track_order
            .iter()
            .enumerate()
            .map(|(i, tid)| (*tid, TrackId(TrackId::FIRST.0 + i as u32)))
            .collect();
        let groups_in_order = group_order.iter().enumerate().all(|(i, gid)| {
            gid.0 == i as u32 && self.groups.get(i).is_some_and(|g| g.gid == *gid)
        });
        let tracks_in_order = track_order.iter().enumerate().all(|(i, tid)| {
            tids[tid] == *tid && self.tracks.get(i).is_some_and(|t| t.tid == *tid)
        });
        if groups_in_order && tracks_in_order {
            return;
        }

        let mut groups: HashMap<GroupId, Group> =
            self.groups.drain(..).map(|g| (g.gid, g)).collect();
        let mut tracks: HashMap<TrackId, Track> =
            self.tracks.drain(..).map(|t| (t.tid, t)).collect();
        self.group_slots.clear();
        self.track_slots.clear();

        for gid in &group_order {
            if let Some(mut group) = groups.remove(gid) {
                group.gid = gids[&group.gid];
                group.pgid = gids[&group.pgid];
                self.insert_group(group);
            }
        }
        for tid in &track_order {
            if let Some(mut track) = tracks.remove(tid) {
                track.tid = tids[&track.tid];
                track.pgid = gids[&track.pgid];
                self.insert_track(track);
            }
        }

        let remap = |tid: &mut TrackId| *tid = tids[&*tid];
        self.bookmarks.iter_mut().for_each(remap);
        self.history.iter_mut().for_each(remap);
        self.search_results.iter_mut().for_each(remap);
        if let Some(current) = self.current.as_mut() {
            current.track = tids[&current.track];
        }
        debug!("renumbered {} groups and {} tracks", gids.len(), tids.len());
        self.dirty = true;
    }

    /// Group ids in pre-order (top level first) and track ids in write order.
    fn document_order(&self) -> (Vec<GroupId>, Vec<TrackId>) {
        let (subgroups, tracks) = self.children_index();
        let mut group_order = Vec::with_capacity(self.groups.len());
        let mut track_order = Vec::with_capacity(self.tracks.len());
        let mut pending = vec![GroupId::TOP_LEVEL];
        while let Some(gid) = pending.pop() {
            group_order.push(gid);
            track_order.extend(tracks.get(&gid).into_iter().flatten().map(|t| t.tid));
            pending.extend(subgroups.get(&gid).into_iter().flatten().rev().map(|g| g.gid));
        }
        (group_order, track_order)
    }

    // --- internals shared with the codec ---

    fn insert_group(&mut self, group: Group) {
        self.next_gid = self.next_gid.max(group.gid.0 + 1);
        self.group_slots.insert(group.gid, self.groups.len());
        self.groups.push(group);
    }

    fn insert_track(&mut self, track: Track) {
        self.next_tid = self.next_tid.max(u64::from(track.tid.0) + 1);
        self.track_slots.insert(track.tid, self.tracks.len());
        self.tracks.push(track);
    }

    /// Record a construction edit; an empty store becomes ready to save.
    fn touch(&mut self) {
        self.dirty = true;
        if self.state == StoreState::Empty {
            self.state = StoreState::Ready;
        }
    }

    pub(crate) fn mark_ready(&mut self) {
        if self.state == StoreState::Empty {
            self.state = StoreState::Ready;
        }
    }

    fn require_group(&self, gid: GroupId) -> Result<(), StoreError> {
        if gid == SEARCH_RESULTS_GID || self.group(gid).is_none() {
            return Err(StoreError::UnknownGroup(gid));
        }
        Ok(())
    }

    fn require_track(&self, tid: TrackId) -> Result<(), StoreError> {
        match self.track(tid) {
            Some(_) => Ok(()),
            None => Err(StoreError::UnknownTrack(tid)),
        }
    }

    /// Sub-groups and tracks of every group, each list in arena order.
    fn children_index(&self) -> (HashMap<GroupId, Vec<&Group>>, HashMap<GroupId, Vec<&Track>>) {
        let mut groups: HashMap<GroupId, Vec<&Group>> = HashMap::new();
        for group in self.groups.iter().filter(|g| !g.is_top_level()) {
            groups.entry(group.pgid).or_default().push(group);
        }
        let mut tracks: HashMap<GroupId, Vec<&Track>> = HashMap::new();
        for track in &self.tracks {
            tracks.entry(track.pgid).or_default().push(track);
        }
        (groups, tracks)
    }
}

/// Stores compare by content; the backing file, lifecycle state, search
/// results and cached tag metadata are not part of it.
impl PartialEq for Store {
    fn eq(&self, other: &Self) -> bool {
        self.groups == other.groups
            && self.tracks == other.tracks
            && self.bookmarks == other.bookmarks
            && self.history == other.history
            && self.current == other.current
    }
}

/// Read the whole stream as text, decompressing unless it starts with the magic prefix.
fn read_text<R: Read + Seek>(reader: &mut R) -> Result<String, StoreError> {
    let mut prefix = Vec::with_capacity(MAGIC.len());
    reader.by_ref().take(MAGIC.len() as u64).read_to_end(&mut prefix)?;
    reader.rewind()?;

    let mut text = String::new();
    if prefix == MAGIC.as_bytes() {
        reader
            .read_to_string(&mut text)
            .map_err(|err| undecodable(err, "not valid UTF-8 text"))?;
    } else {
        GzDecoder::new(reader)
            .read_to_string(&mut text)
            .map_err(|err| undecodable(err, "not a music box file"))?;
    }
    Ok(text)
}

fn undecodable(err: io::Error, reason: &str) -> StoreError {
    match err.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof => {
            FormatError::new(1, reason).into()
        }
        _ => err.into(),
    }
}
