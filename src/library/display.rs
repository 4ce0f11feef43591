use std::path::Path;

const SEPARATORS: [char; 2] = ['-', '_'];

/// Build the name a track shows as the last component of a tree path.
///
/// Takes the file stem, turns `-`/`_` into spaces and drops a leading run of
/// digits and spaces (a track number), unless that would leave nothing.
pub fn display_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let spaced = stem.replace(&SEPARATORS[..], " ");
    let spaced = spaced.trim();
    let unnumbered = spaced.trim_start_matches(|c: char| c.is_ascii_digit() || c == ' ');
    if unnumbered.is_empty() {
        spaced.to_string()
    } else {
        unnumbered.to_string()
    }
}

/// Title used when a file has no readable tags: the stem with `-`/`_` as spaces.
pub fn title_from_filename(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_else(|| path.to_string_lossy())
        .replace(&SEPARATORS[..], " ")
}

/// Render seconds as e.g. `1h2′3″`; unresolved or zero durations render as `0″`.
pub fn humanized_time(secs: f64) -> String {
    if secs <= 0.0 {
        return "0″".to_string();
    }
    let total = secs.round() as u64;
    let (hours, mins, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    let mut text = String::new();
    if hours > 0 {
        text.push_str(&format!("{hours}h"));
    }
    if mins > 0 {
        text.push_str(&format!("{mins}′"));
    }
    if secs > 0 {
        text.push_str(&format!("{secs}″"));
    }
    if text.is_empty() {
        text.push_str("0″");
    }
    text
}
