//! Line-oriented state machine that fills a [`Store`] from music-box text.
//!
//! Every non-blank line is classified into a [`Shape`] and handed to the
//! single `feed` dispatch, which picks the handler from the
//! `(State, Shape)` pair. Any error aborts the whole load.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use super::format::{Encoding, INDENT, Section, Shape, TAB, check_name, classify};
use super::{Current, Store};
use crate::error::FormatError;
use crate::library::{Group, GroupId, MAX_GID, SEARCH_RESULTS_GID, Track, TrackId};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Magic,
    FirstSection,
    Fields(Section),
    Rows(Section),
    Done,
}

struct Parser<'s> {
    store: &'s mut Store,
    state: State,
    encoding: Encoding,
    /// Open groups of the indentation encoding, outermost first.
    stack: Vec<GroupId>,
    seen_groups: HashSet<GroupId>,
}

pub(super) fn parse(store: &mut Store, text: &str) -> Result<(), FormatError> {
    let mut parser = Parser {
        store,
        state: State::Magic,
        encoding: Encoding::Flat,
        stack: Vec::new(),
        seen_groups: HashSet::new(),
    };
    let mut last = 0;
    for (index, raw) in text.lines().enumerate() {
        last = index + 1;
        let line = trim_end(raw);
        if line.is_empty() {
            continue;
        }
        parser.feed(last, line)?;
    }
    parser.finish(last + 1)
}

/// Trailing whitespace goes, but not the tabs and indent markers the format uses.
fn trim_end(line: &str) -> &str {
    line.trim_end_matches(|c: char| c.is_whitespace() && c != TAB && c != INDENT)
}

impl Parser<'_> {
    fn feed(&mut self, lino: usize, line: &str) -> Result<(), FormatError> {
        self.state = match (self.state, classify(line)) {
            (State::Magic, Shape::Magic { version }) => {
                debug!("music box version {version}");
                State::FirstSection
            }
            (State::Magic, _) => return Err(FormatError::new(lino, "not a music box file")),
            (_, Shape::UnknownHeader(header)) => {
                return Err(FormatError::new(
                    lino,
                    format!("unknown section header {:?}", header),
                ));
            }
            (_, Shape::Magic { .. }) => {
                return Err(FormatError::new(lino, "unexpected second magic header"));
            }
            (State::FirstSection, Shape::Header(Section::Groups)) => {
                self.encoding = Encoding::Flat;
                State::Fields(Section::Groups)
            }
            (State::FirstSection, Shape::Header(Section::Tracks)) => {
                self.encoding = Encoding::Tree;
                State::Rows(Section::Tracks)
            }
            (State::FirstSection, _) => {
                return Err(FormatError::new(lino, "missing GROUPS or TRACKS section"));
            }
            (State::Fields(section), Shape::Data(fields)) => self.on_fields(lino, section, fields)?,
            (State::Fields(section), Shape::Header(_)) => {
                return Err(FormatError::new(
                    lino,
                    format!("missing {} field names", section.name()),
                ));
            }
            (State::Rows(section), Shape::Header(next)) => self.on_section(lino, section, next)?,
            (State::Rows(section), Shape::Data(row)) => self.on_row(lino, section, row)?,
            (State::Done, Shape::Data(_)) => {
                return Err(FormatError::new(lino, "spurious data at the end"));
            }
            (State::Done, Shape::Header(next)) => {
                return Err(FormatError::new(
                    lino,
                    format!("unexpected {} section after CURRENT", next.name()),
                ));
            }
        };
        Ok(())
    }

    fn finish(self, lino: usize) -> Result<(), FormatError> {
        match self.state {
            State::Magic => Err(FormatError::new(lino, "not a music box file")),
            State::FirstSection => Err(FormatError::new(lino, "missing GROUPS or TRACKS section")),
            State::Fields(section) => Err(FormatError::new(
                lino,
                format!("missing {} field names", section.name()),
            )),
            State::Rows(_) | State::Done => {
                self.store.encoding = self.encoding;
                Ok(())
            }
        }
    }

    fn on_section(&mut self, lino: usize, current: Section, next: Section) -> Result<State, FormatError> {
        if current.next() != Some(next) {
            return Err(FormatError::new(
                lino,
                format!("unexpected {} section after {}", next.name(), current.name()),
            ));
        }
        Ok(match self.encoding {
            Encoding::Flat => State::Fields(next),
            Encoding::Tree => State::Rows(next),
        })
    }

    fn on_fields(&mut self, lino: usize, section: Section, line: &str) -> Result<State, FormatError> {
        if line.split(TAB).next() != Some(section.leading_field()) {
            return Err(FormatError::new(
                lino,
                format!(
                    "expected {} field names starting with {:?}",
                    section.name(),
                    section.leading_field()
                ),
            ));
        }
        Ok(State::Rows(section))
    }

    fn on_row(&mut self, lino: usize, section: Section, row: &str) -> Result<State, FormatError> {
        match (self.encoding, section) {
            (Encoding::Flat, Section::Groups) => self.flat_group(lino, row)?,
            (Encoding::Flat, Section::Tracks) => self.flat_track(lino, row)?,
            (Encoding::Flat, Section::Bookmarks) => {
                let tid = self.flat_track_ref(lino, row)?;
                self.store.bookmarks.push(tid);
            }
            (Encoding::Flat, Section::History) => {
                let tid = self.flat_track_ref(lino, row)?;
                self.store.history.push_back(tid);
            }
            (Encoding::Flat, Section::Current) => {
                let (tid, position) = split_position(lino, row)?;
                let track = self.flat_track_ref(lino, tid)?;
                self.store.current = Some(Current { track, position });
                return Ok(State::Done);
            }
            (Encoding::Tree, Section::Tracks) => {
                if row.starts_with(INDENT) {
                    self.tree_group(lino, row)?;
                } else {
                    self.tree_track(lino, row)?;
                }
            }
            (Encoding::Tree, Section::Bookmarks) => {
                let tid = self.tree_track_ref(lino, row)?;
                self.store.bookmarks.push(tid);
            }
            (Encoding::Tree, Section::History) => {
                let tid = self.tree_track_ref(lino, row)?;
                self.store.history.push_back(tid);
            }
            (Encoding::Tree, Section::Current) => {
                let (filename, position) = split_position(lino, row)?;
                let track = self.tree_track_ref(lino, filename)?;
                self.store.current = Some(Current { track, position });
                return Ok(State::Done);
            }
            (Encoding::Tree, Section::Groups) => {
                return Err(FormatError::new(lino, "GROUPS rows in an indented file"));
            }
        }
        Ok(State::Rows(section))
    }

    // --- flat encoding ---

    fn flat_group(&mut self, lino: usize, row: &str) -> Result<(), FormatError> {
        let [gid, name, pgid] = split_fields(lino, row)?;
        let gid = parse_gid(lino, gid, "gid")?;
        let pgid = parse_gid(lino, pgid, "pgid")?;
        if !self.seen_groups.insert(gid) {
            return Err(FormatError::new(lino, format!("duplicate group id {gid}")));
        }
        if gid == GroupId::TOP_LEVEL {
            if pgid != GroupId::TOP_LEVEL {
                return Err(FormatError::new(lino, "the top-level group must be its own parent"));
            }
            self.store.groups[0].name = name.to_string();
            return Ok(());
        }
        if gid == pgid {
            return Err(FormatError::new(lino, format!("group {gid} is its own parent")));
        }
        if self.store.group(pgid).is_none() {
            return Err(FormatError::new(lino, format!("unknown parent group {pgid}")));
        }
        check_name(name).map_err(|reason| {
            FormatError::new(lino, format!("invalid group name {name:?}: {reason}"))
        })?;
        if self.store.child_group(pgid, name).is_some() {
            return Err(FormatError::new(
                lino,
                format!("duplicate group name {name:?} under group {pgid}"),
            ));
        }
        self.store.insert_group(Group::new(gid, name, pgid));
        Ok(())
    }

    fn flat_track(&mut self, lino: usize, row: &str) -> Result<(), FormatError> {
        let [tid, filename, secs, pgid] = split_fields(lino, row)?;
        let tid = parse_tid(lino, tid)?;
        let secs = parse_secs(lino, secs)?;
        let pgid = parse_gid(lino, pgid, "pgid")?;
        check_name(filename).map_err(|reason| {
            FormatError::new(lino, format!("invalid filename {filename:?}: {reason}"))
        })?;
        if self.store.track(tid).is_some() {
            return Err(FormatError::new(lino, format!("duplicate track id {tid}")));
        }
        if self.store.group(pgid).is_none() {
            return Err(FormatError::new(lino, format!("unknown parent group {pgid}")));
        }
        self.store.insert_track(Track::new(tid, filename, secs, pgid));
        Ok(())
    }

    fn flat_track_ref(&self, lino: usize, field: &str) -> Result<TrackId, FormatError> {
        let tid = parse_tid(lino, field)?;
        match self.store.track(tid) {
            Some(_) => Ok(tid),
            None => Err(FormatError::new(lino, format!("unknown track id {tid}"))),
        }
    }

    // --- indentation encoding ---

    fn tree_group(&mut self, lino: usize, row: &str) -> Result<(), FormatError> {
        let name = row.trim_start_matches(INDENT);
        if name.is_empty() {
            return Err(FormatError::new(lino, "missing group name"));
        }
        let depth = row.len() - name.len();
        if depth <= self.stack.len() {
            self.stack.truncate(depth - 1);
        }
        let parent = self.top();
        let gid = match self.store.child_group(parent, name) {
            Some(existing) => existing,
            None => self
                .store
                .add_group(name, parent)
                .map_err(|err| FormatError::new(lino, err.to_string()))?,
        };
        self.stack.push(gid);
        Ok(())
    }

    fn tree_track(&mut self, lino: usize, row: &str) -> Result<(), FormatError> {
        let Some((filename, secs)) = row.split_once(TAB) else {
            return Err(FormatError::new(
                lino,
                "expected a filename and duration separated by a tab",
            ));
        };
        if filename.is_empty() {
            return Err(FormatError::new(lino, "missing filename"));
        }
        let secs = parse_secs(lino, secs)?;
        let parent = self.top();
        self.store
            .add_track(filename, secs, parent)
            .map_err(|err| FormatError::new(lino, err.to_string()))?;
        Ok(())
    }

    fn tree_track_ref(&self, lino: usize, filename: &str) -> Result<TrackId, FormatError> {
        self.store
            .track_by_filename(None, Path::new(filename))
            .ok_or_else(|| FormatError::new(lino, format!("unknown track {filename:?}")))
    }

    fn top(&self) -> GroupId {
        self.stack.last().copied().unwrap_or(GroupId::TOP_LEVEL)
    }
}

fn split_fields<const N: usize>(lino: usize, row: &str) -> Result<[&str; N], FormatError> {
    let fields: Vec<&str> = row.split(TAB).collect();
    <[&str; N]>::try_from(fields).map_err(|fields| {
        FormatError::new(
            lino,
            format!("expected {N} tab-separated fields, found {}", fields.len()),
        )
    })
}

/// Split an optional `\tposition` suffix off a CURRENT row.
fn split_position(lino: usize, row: &str) -> Result<(&str, f64), FormatError> {
    match row.split_once(TAB) {
        Some((head, pos)) => Ok((head, parse_secs(lino, pos)?)),
        None => Ok((row, 0.0)),
    }
}

fn parse_int(lino: usize, field: &str, what: &str) -> Result<i64, FormatError> {
    field
        .trim()
        .parse::<i64>()
        .map_err(|_| FormatError::new(lino, format!("invalid {what} {field:?}")))
}

fn parse_gid(lino: usize, field: &str, what: &str) -> Result<GroupId, FormatError> {
    let value = parse_int(lino, field, what)?;
    match u32::try_from(value) {
        Ok(raw) if GroupId::is_persistable(raw) => Ok(GroupId(raw)),
        _ if value == i64::from(SEARCH_RESULTS_GID.0) => Err(FormatError::new(
            lino,
            format!("{what} {value} is reserved for search results"),
        )),
        _ => Err(FormatError::new(
            lino,
            format!("{what} {value} out of range 0..{MAX_GID}"),
        )),
    }
}

fn parse_tid(lino: usize, field: &str) -> Result<TrackId, FormatError> {
    let value = parse_int(lino, field, "tid")?;
    match u32::try_from(value) {
        Ok(raw) if TrackId::in_range(raw) => Ok(TrackId(raw)),
        _ => Err(FormatError::new(
            lino,
            format!("tid {value} out of range {}..", TrackId::FIRST),
        )),
    }
}

fn parse_secs(lino: usize, field: &str) -> Result<f64, FormatError> {
    match field.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() => Ok(secs),
        _ => Err(FormatError::new(lino, format!("invalid duration {field:?}"))),
    }
}
