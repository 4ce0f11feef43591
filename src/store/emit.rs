use std::collections::HashMap;
use std::io::{self, Write};

use super::format::{Encoding, INDENT, MAGIC, Section, VERSION, format_secs};
use super::{Current, Store};
use crate::library::{Group, GroupId, Track};

pub(super) fn write<W: Write>(store: &Store, w: &mut W) -> io::Result<()> {
    writeln!(w, "{MAGIC}{VERSION}")?;
    match store.encoding() {
        Encoding::Flat => write_flat(store, w),
        Encoding::Tree => write_tree(store, w),
    }
}

fn write_flat<W: Write>(store: &Store, w: &mut W) -> io::Result<()> {
    section(w, Section::Groups, true)?;
    for group in store.groups() {
        writeln!(w, "{}\t{}\t{}", group.gid, group.name, group.pgid)?;
    }

    section(w, Section::Tracks, true)?;
    for track in store.tracks() {
        writeln!(
            w,
            "{}\t{}\t{}\t{}",
            track.tid,
            track.filename.display(),
            format_secs(track.secs()),
            track.pgid
        )?;
    }

    section(w, Section::Bookmarks, true)?;
    for tid in store.bookmarks() {
        writeln!(w, "{tid}")?;
    }

    section(w, Section::History, true)?;
    for tid in store.history() {
        writeln!(w, "{tid}")?;
    }

    section(w, Section::Current, true)?;
    if let Some(current) = store.current() {
        writeln!(w, "{}{}", current.track, position_suffix(current))?;
    }
    Ok(())
}

fn write_tree<W: Write>(store: &Store, w: &mut W) -> io::Result<()> {
    let (subgroups, tracks) = store.children_index();
    let mut tree = TreeWriter {
        w: &mut *w,
        subgroups: &subgroups,
        tracks: &tracks,
    };

    section(tree.w, Section::Tracks, false)?;
    tree.tracks_of(GroupId::TOP_LEVEL)?;
    tree.groups_of(GroupId::TOP_LEVEL, 1)?;

    section(w, Section::Bookmarks, false)?;
    for tid in store.bookmarks() {
        if let Some(track) = store.track(*tid) {
            writeln!(w, "{}", track.filename.display())?;
        }
    }

    section(w, Section::History, false)?;
    for tid in store.history() {
        if let Some(track) = store.track(*tid) {
            writeln!(w, "{}", track.filename.display())?;
        }
    }

    section(w, Section::Current, false)?;
    if let Some(current) = store.current() {
        if let Some(track) = store.track(current.track) {
            writeln!(w, "{}{}", track.filename.display(), position_suffix(current))?;
        }
    }
    Ok(())
}

/// Pre-order writer for the indentation encoding: a group line, its own
/// tracks, then its sub-groups one level deeper.
struct TreeWriter<'a, 's, W> {
    w: &'a mut W,
    subgroups: &'a HashMap<GroupId, Vec<&'s Group>>,
    tracks: &'a HashMap<GroupId, Vec<&'s Track>>,
}

impl<W: Write> TreeWriter<'_, '_, W> {
    fn tracks_of(&mut self, gid: GroupId) -> io::Result<()> {
        for track in self.tracks.get(&gid).into_iter().flatten() {
            writeln!(
                self.w,
                "{}\t{}",
                track.filename.display(),
                format_secs(track.secs())
            )?;
        }
        Ok(())
    }

    fn groups_of(&mut self, gid: GroupId, depth: usize) -> io::Result<()> {
        let subgroups = self.subgroups;
        for group in subgroups.get(&gid).into_iter().flatten() {
            let indent = INDENT.to_string().repeat(depth);
            writeln!(self.w, "{indent}{}", group.name)?;
            self.tracks_of(group.gid)?;
            self.groups_of(group.gid, depth + 1)?;
        }
        Ok(())
    }
}

fn section<W: Write>(w: &mut W, section: Section, with_fields: bool) -> io::Result<()> {
    writeln!(w, "{}", section.header())?;
    if with_fields {
        writeln!(w, "{}", section.fields())?;
    }
    Ok(())
}

fn position_suffix(current: Current) -> String {
    if current.position > 0.0 {
        format!("\t{}", format_secs(current.position))
    } else {
        String::new()
    }
}
