use super::*;
use crate::error::ProbeError;
use std::path::Path;

struct NoFiles;

impl Prober for NoFiles {
    fn probe(&self, path: &Path) -> Result<Probe, ProbeError> {
        Err(ProbeError::NotFound(path.to_path_buf()))
    }
}

#[test]
fn display_name_strips_track_numbers_and_separators() {
    assert_eq!(display_name(Path::new("/m/05-You_and_I.mp3")), "You and I");
    assert_eq!(display_name(Path::new("/m/01 - Intro.flac")), "Intro");
    assert_eq!(display_name(Path::new("Song.ogg")), "Song");
}

#[test]
fn display_name_keeps_all_digit_names() {
    assert_eq!(display_name(Path::new("/m/1999.mp3")), "1999");
    assert_eq!(display_name(Path::new("/m/_42_.mp3")), "42");
}

#[test]
fn title_from_filename_only_replaces_separators() {
    assert_eq!(title_from_filename(Path::new("/m/05-You_and_I.mp3")), "05 You and I");
}

#[test]
fn humanized_time_skips_zero_units() {
    assert_eq!(humanized_time(0.0), "0″");
    assert_eq!(humanized_time(-1.0), "0″");
    assert_eq!(humanized_time(59.4), "59″");
    assert_eq!(humanized_time(60.0), "1′");
    assert_eq!(humanized_time(3723.0), "1h2′3″");
    assert_eq!(humanized_time(7200.0), "2h");
}

#[test]
fn id_ranges_partition_groups_and_tracks() {
    assert!(GroupId::is_persistable(0));
    assert!(GroupId::is_persistable(MAX_GID - 1));
    assert!(!GroupId::is_persistable(SEARCH_RESULTS_GID.0));
    assert!(!TrackId::in_range(MAX_GID));
    assert!(TrackId::in_range(TrackId::FIRST.0));
    assert!(TrackId::in_range(MAX_TID));

    assert_eq!(NodeId::from_raw(12), NodeId::Group(GroupId(12)));
    assert_eq!(NodeId::from_raw(MAX_GID + 1), NodeId::Track(TrackId::FIRST));
}

#[test]
fn unreadable_track_falls_back_to_filename_title() {
    let track = Track::new(TrackId::FIRST, "/gone/07_Last_Song.mp3", -1.0, GroupId::TOP_LEVEL);
    assert!(!track.is_resolved());
    assert_eq!(track.title(&NoFiles), "07 Last Song");
    assert_eq!(track.artist(&NoFiles), None);
    assert!(track.is_probed());
    assert_eq!(track.duration(&NoFiles), -1.0);
}

#[test]
fn seeded_metadata_is_not_overwritten() {
    let track = Track::new(TrackId::FIRST, "a.mp3", 0.0, GroupId::TOP_LEVEL);
    track.seed(TrackMeta {
        title: "Seeded".into(),
        secs: Some(30.0),
        ..TrackMeta::default()
    });
    track.seed(TrackMeta::fallback(Path::new("a.mp3")));
    assert_eq!(track.title(&NoFiles), "Seeded");
    assert_eq!(track.secs(), 30.0);
}

#[test]
fn track_equality_ignores_cache_and_sub_millisecond_noise() {
    let a = Track::new(TrackId::FIRST, "a.mp3", 245.5, GroupId::TOP_LEVEL);
    let b = Track::new(TrackId::FIRST, "a.mp3", 245.5001, GroupId::TOP_LEVEL);
    b.seed(TrackMeta::fallback(Path::new("a.mp3")));
    assert_eq!(a, b);

    let c = Track::new(TrackId::FIRST, "a.mp3", 245.51, GroupId::TOP_LEVEL);
    assert_ne!(a, c);
}

#[test]
fn group_order_key_is_case_insensitive() {
    let a = Group::new(GroupId(2), "alpha", GroupId::TOP_LEVEL);
    let b = Group::new(GroupId(1), "Beta", GroupId::TOP_LEVEL);
    assert!(a.order_key() < b.order_key());
    assert!(Group::top_level().is_top_level());
}
