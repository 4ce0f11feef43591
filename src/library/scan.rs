use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::LibrarySettings;
use crate::error::StoreError;
use crate::store::Store;

use super::model::GroupId;
use super::playlist;
use super::probe::Prober;

/// Counts from one folder scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    /// Playlist files found.
    pub playlists: usize,
    /// Playlists that could not be opened or stopped at a format error.
    pub failed_playlists: usize,
    pub added: usize,
    /// Entries dropped because the file was missing or unreadable.
    pub skipped: usize,
    /// Entries already present in their group.
    pub duplicates: usize,
}

fn is_playlist(path: &Path, settings: &LibrarySettings) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            settings
                .playlist_extensions
                .iter()
                .map(|e| e.trim().trim_start_matches('.'))
                .any(|e| e.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Group chain for a playlist: its directories below `root` (minus flattened
/// ones) followed by the playlist's own stem.
fn group_names(root: &Path, playlist: &Path, settings: &LibrarySettings) -> Vec<String> {
    let dir = playlist.parent().unwrap_or(root);
    let mut names: Vec<String> = dir
        .strip_prefix(root)
        .unwrap_or(Path::new(""))
        .iter()
        .map(|c| c.to_string_lossy().into_owned())
        .filter(|name| {
            !settings
                .flatten_dirs
                .iter()
                .any(|flat| flat.eq_ignore_ascii_case(name))
        })
        .collect();
    let stem = playlist
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    names.push(stem);
    names
}

/// Build a new store from every playlist below `root`.
pub fn scan(
    root: &Path,
    settings: &LibrarySettings,
    prober: &dyn Prober,
) -> Result<(Store, ScanSummary), StoreError> {
    let mut store = Store::new();
    let summary = scan_into(&mut store, root, settings, prober)?;
    Ok((store, summary))
}

/// Merge every playlist below `root` into `store`, reusing groups by name and
/// skipping files already present in their group.
pub fn scan_into(
    store: &mut Store,
    root: &Path,
    settings: &LibrarySettings,
    prober: &dyn Prober,
) -> Result<ScanSummary, StoreError> {
    let mut summary = ScanSummary::default();

    let walker = WalkDir::new(root)
        .follow_links(settings.follow_links)
        .sort_by_file_name();

    for entry in walker
        .into_iter()
        .filter_entry(|e| settings.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !path.is_file() || !is_playlist(path, settings) {
            continue;
        }
        let names = group_names(root, path, settings);
        summary.playlists += 1;
        let gid = match store.ensure_group_path(GroupId::TOP_LEVEL, &names) {
            Ok(gid) => gid,
            Err(err @ StoreError::InvalidName { .. }) => {
                warn!("skipping playlist {}: {err}", path.display());
                summary.failed_playlists += 1;
                continue;
            }
            Err(err) => return Err(err),
        };
        read_playlist(store, gid, path, prober, &mut summary)?;
    }

    store.mark_ready();
    info!(
        "scanned {}: {} playlists ({} failed), {} tracks added, {} skipped, {} duplicates",
        root.display(),
        summary.playlists,
        summary.failed_playlists,
        summary.added,
        summary.skipped,
        summary.duplicates
    );
    Ok(summary)
}

fn read_playlist(
    store: &mut Store,
    gid: GroupId,
    path: &Path,
    prober: &dyn Prober,
    summary: &mut ScanSummary,
) -> Result<(), StoreError> {
    let entries = match playlist::open(path) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("cannot read playlist {}: {err}", path.display());
            summary.failed_playlists += 1;
            return Ok(());
        }
    };

    let mut known: HashSet<PathBuf> = store
        .child_tracks(gid)
        .map(|t| t.filename.clone())
        .collect();

    for entry in entries {
        let track_path = match entry {
            Ok(track_path) => track_path,
            Err(err) => {
                warn!("playlist {}: {err}", path.display());
                summary.failed_playlists += 1;
                break;
            }
        };
        if known.contains(&track_path) {
            summary.duplicates += 1;
            continue;
        }
        match prober.probe(&track_path) {
            Ok(probe) => {
                let secs = probe.secs;
                let meta = probe.into_meta(&track_path);
                let tid = match store.add_track(track_path.clone(), secs, gid) {
                    Ok(tid) => tid,
                    Err(err @ StoreError::InvalidName { .. }) => {
                        debug!("skipping track: {err}");
                        summary.skipped += 1;
                        continue;
                    }
                    Err(err) => return Err(err),
                };
                if let Some(track) = store.track(tid) {
                    track.seed(meta);
                }
                known.insert(track_path);
                summary.added += 1;
            }
            Err(err) => {
                debug!("skipping track: {err}");
                summary.skipped += 1;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::library::Probe;
    use crate::store::StoreState;
    use std::fs;
    use tempfile::tempdir;

    /// Existing files probe as 100 seconds; anything else is missing.
    struct FakeProber;

    impl Prober for FakeProber {
        fn probe(&self, path: &Path) -> Result<Probe, ProbeError> {
            if path.is_file() {
                Ok(Probe {
                    secs: 100.0,
                    title: Some("Tagged".into()),
                    ..Probe::default()
                })
            } else {
                Err(ProbeError::NotFound(path.to_path_buf()))
            }
        }
    }

    fn m3u(entries: &[&Path]) -> String {
        let mut text = String::from("#EXTM3U\n");
        for entry in entries {
            text.push_str(&format!("#EXTINF:-1,x\n{}\n", entry.display()));
        }
        text
    }

    #[test]
    fn is_playlist_matches_configured_extensions_case_insensitive() {
        let settings = LibrarySettings::default();
        assert!(is_playlist(Path::new("/tmp/a.m3u"), &settings));
        assert!(is_playlist(Path::new("/tmp/a.M3U"), &settings));
        assert!(is_playlist(Path::new("/tmp/a.m3u8"), &settings));
        assert!(!is_playlist(Path::new("/tmp/a.mp3"), &settings));
        assert!(!is_playlist(Path::new("/tmp/a"), &settings));
    }

    #[test]
    fn group_names_skip_flattened_dirs() {
        let settings = LibrarySettings::default();
        let root = Path::new("/music");
        assert_eq!(
            group_names(root, Path::new("/music/Rock/Queen.m3u"), &settings),
            vec!["Rock".to_string(), "Queen".to_string()]
        );
        assert_eq!(
            group_names(root, Path::new("/music/playlists/Jazz.m3u"), &settings),
            vec!["Jazz".to_string()]
        );
    }

    #[test]
    fn scan_builds_groups_and_skips_unreadable_tracks() {
        let dir = tempdir().unwrap();
        let audio = dir.path().join("audio");
        fs::create_dir_all(&audio).unwrap();
        let song = audio.join("05-You_and_I.mp3");
        fs::write(&song, b"fake").unwrap();
        let missing = audio.join("missing.mp3");

        let rock = dir.path().join("Rock");
        fs::create_dir_all(&rock).unwrap();
        fs::write(rock.join("Queen.m3u"), m3u(&[&song, &missing])).unwrap();

        let (store, summary) = scan(dir.path(), &LibrarySettings::default(), &FakeProber).unwrap();
        assert_eq!(summary.playlists, 1);
        assert_eq!(summary.added, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(store.state(), StoreState::Ready);

        let rock = store.child_group(GroupId::TOP_LEVEL, "Rock").unwrap();
        let queen = store.child_group(rock, "Queen").unwrap();
        let tracks: Vec<_> = store.child_tracks(queen).collect();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].filename, song);
        assert_eq!(tracks[0].secs(), 100.0);
        assert!(tracks[0].is_probed());
    }

    #[test]
    fn scan_into_merges_without_duplicating() {
        let dir = tempdir().unwrap();
        let song = dir.path().join("song.mp3");
        fs::write(&song, b"fake").unwrap();
        let lists = dir.path().join("playlists");
        fs::create_dir_all(&lists).unwrap();
        fs::write(lists.join("Mix.m3u"), m3u(&[&song])).unwrap();

        let settings = LibrarySettings::default();
        let (mut store, _) = scan(dir.path(), &settings, &FakeProber).unwrap();
        let again = scan_into(&mut store, dir.path(), &settings, &FakeProber).unwrap();

        assert_eq!(again.added, 0);
        assert_eq!(again.duplicates, 1);
        assert_eq!(store.groups().len(), 2);
        assert_eq!(store.tracks().len(), 1);
        assert_eq!(store.path_for(store.tracks()[0].tid).unwrap(), "Mix/song");
    }

    #[test]
    fn malformed_playlist_keeps_entries_before_the_error() {
        let dir = tempdir().unwrap();
        let song = dir.path().join("a.mp3");
        fs::write(&song, b"fake").unwrap();
        let text = format!("#EXTM3U\n#EXTINF:1,a\n{}\nnot-an-extinf.mp3\n", song.display());
        fs::write(dir.path().join("Broken.m3u"), text).unwrap();

        let (store, summary) = scan(dir.path(), &LibrarySettings::default(), &FakeProber).unwrap();
        assert_eq!(summary.failed_playlists, 1);
        assert_eq!(summary.added, 1);
        assert_eq!(store.tracks().len(), 1);
    }

    #[test]
    fn scan_respects_include_hidden_false() {
        let dir = tempdir().unwrap();
        let song = dir.path().join("a.mp3");
        fs::write(&song, b"fake").unwrap();
        let hidden = dir.path().join(".secret");
        fs::create_dir_all(&hidden).unwrap();
        fs::write(hidden.join("Hidden.m3u"), m3u(&[&song])).unwrap();
        fs::write(dir.path().join("Shown.m3u"), m3u(&[&song])).unwrap();

        let (store, summary) = scan(dir.path(), &LibrarySettings::default(), &FakeProber).unwrap();
        assert_eq!(summary.playlists, 1);
        assert!(store.child_group(GroupId::TOP_LEVEL, "Shown").is_some());
        assert!(store.child_group(GroupId::TOP_LEVEL, ".secret").is_none());
    }

    #[test]
    fn unwritable_names_skip_the_playlist_not_the_scan() {
        let dir = tempdir().unwrap();
        let song = dir.path().join("a.mp3");
        fs::write(&song, b"fake").unwrap();
        let odd = dir.path().join("AC\tDC");
        fs::create_dir_all(&odd).unwrap();
        fs::write(odd.join("Live.m3u"), m3u(&[&song])).unwrap();
        fs::write(dir.path().join("Good.m3u"), m3u(&[&song])).unwrap();

        let (store, summary) = scan(dir.path(), &LibrarySettings::default(), &FakeProber).unwrap();
        assert_eq!(summary.playlists, 2);
        assert_eq!(summary.failed_playlists, 1);
        assert_eq!(summary.added, 1);
        assert!(store.child_group(GroupId::TOP_LEVEL, "Good").is_some());
    }

    #[test]
    fn tree_save_of_a_scanned_store_reloads_equal() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.mp3");
        let b = dir.path().join("b.mp3");
        fs::write(&a, b"fake").unwrap();
        fs::write(&b, b"fake").unwrap();
        let alpha = dir.path().join("Alpha");
        let lists = dir.path().join("playlists");
        fs::create_dir_all(&alpha).unwrap();
        fs::create_dir_all(&lists).unwrap();
        fs::write(alpha.join("Mix.m3u"), m3u(&[&a])).unwrap();
        fs::write(lists.join("Alpha.m3u"), m3u(&[&b])).unwrap();

        let (mut store, summary) = scan(dir.path(), &LibrarySettings::default(), &FakeProber).unwrap();
        assert_eq!(summary.added, 2);
        // `b` lands in Alpha itself, ahead of Mix's `a` in document order.
        assert_eq!(store.tracks()[0].filename, a);

        store.set_encoding(crate::store::Encoding::Tree);
        let out = dir.path().join("library.mb");
        store.save_as(&out, true).unwrap();
        assert_eq!(store.tracks()[0].filename, b);

        let loaded = Store::open(&out).unwrap();
        assert_eq!(loaded, store);
        assert!(!store.is_dirty());
    }

    #[test]
    fn empty_folder_still_yields_a_saveable_store() {
        let dir = tempdir().unwrap();
        let (store, summary) = scan(dir.path(), &LibrarySettings::default(), &FakeProber).unwrap();
        assert_eq!(summary, ScanSummary::default());
        assert_eq!(store.state(), StoreState::Ready);
    }
}
