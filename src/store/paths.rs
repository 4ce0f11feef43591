use std::collections::HashMap;

use super::Store;
use crate::library::{Group, GroupId, NodeId, SEARCH_RESULTS_GID, Track};

const PATH_SEP: char = '/';
const SEARCH_RESULTS_NAME: &str = "Search Results";

impl Store {
    /// Slash-joined path of a group, or of a track's group plus its display name.
    ///
    /// The top-level group contributes no segment. Returns `None` for unknown ids.
    pub fn path_for(&self, node: impl Into<NodeId>) -> Option<String> {
        match node.into() {
            NodeId::Group(gid) if gid == SEARCH_RESULTS_GID => Some(SEARCH_RESULTS_NAME.to_string()),
            NodeId::Group(gid) => self.group_path(gid),
            NodeId::Track(tid) => {
                let track = self.track(tid)?;
                let group_path = self.group_path(track.pgid)?;
                Some(join(&group_path, &track.display_name()))
            }
        }
    }

    fn group_path(&self, gid: GroupId) -> Option<String> {
        let mut names = Vec::new();
        let mut group = self.group(gid)?;
        // Loaded and built stores are acyclic; the bound only stops a corrupt chain.
        for _ in 0..self.groups.len() {
            if group.is_top_level() {
                break;
            }
            names.push(group.name.as_str());
            group = self.group(group.pgid)?;
        }
        names.reverse();
        Some(names.join(&PATH_SEP.to_string()))
    }

    /// Total resolved seconds in a scope.
    ///
    /// `None` sums the whole store; a group sums only its direct tracks; a track
    /// gives its own duration. Unresolved durations count as zero.
    pub fn secs_for(&self, scope: Option<NodeId>) -> f64 {
        match scope {
            None => self.tracks.iter().map(resolved_secs).sum(),
            Some(NodeId::Group(gid)) if gid == SEARCH_RESULTS_GID => self
                .search_results
                .iter()
                .filter_map(|tid| self.track(*tid))
                .map(resolved_secs)
                .sum(),
            Some(NodeId::Group(gid)) => self.child_tracks(gid).map(resolved_secs).sum(),
            Some(NodeId::Track(tid)) => self.track(tid).map(resolved_secs).unwrap_or(0.0),
        }
    }

    /// Depth-first, pre-order walk over every group path and track path.
    pub fn paths(&self) -> Paths<'_> {
        let (subgroups, tracks) = self.children_index();
        let mut paths = Paths {
            subgroups,
            tracks,
            pending: Vec::new(),
        };
        paths.expand(GroupId::TOP_LEVEL, "");
        paths
    }
}

fn resolved_secs(track: &Track) -> f64 {
    track.secs().max(0.0)
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}{PATH_SEP}{name}")
    }
}

enum Step<'s> {
    Group(&'s Group, String),
    Track(&'s Track, String),
}

/// Lazy iterator returned by [`Store::paths`]. Within a group its tracks come
/// before its sub-groups. Single pass; call `paths()` again to restart.
pub struct Paths<'s> {
    subgroups: HashMap<GroupId, Vec<&'s Group>>,
    tracks: HashMap<GroupId, Vec<&'s Track>>,
    pending: Vec<Step<'s>>,
}

impl<'s> Paths<'s> {
    fn expand(&mut self, gid: GroupId, path: &str) {
        let subgroups = self.subgroups.get(&gid).into_iter().flatten().copied().rev();
        for group in subgroups {
            self.pending.push(Step::Group(group, path.to_string()));
        }
        let tracks = self.tracks.get(&gid).into_iter().flatten().copied().rev();
        for track in tracks {
            self.pending.push(Step::Track(track, path.to_string()));
        }
    }
}

impl Iterator for Paths<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        match self.pending.pop()? {
            Step::Group(group, parent) => {
                let path = join(&parent, &group.name);
                self.expand(group.gid, &path);
                Some(path)
            }
            Step::Track(track, parent) => Some(join(&parent, &track.display_name())),
        }
    }
}
