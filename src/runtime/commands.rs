use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;

use musicbox::config::Settings;
use musicbox::library::{GroupId, LoftyProber, humanized_time, scan as scan_folder};
use musicbox::{Encoding, Store};

const EXTENSION: &str = "mb";

pub fn scan(
    settings: &Settings,
    folder: &Path,
    out: Option<PathBuf>,
    plain: bool,
    encoding: Option<Encoding>,
) -> Result<()> {
    if !folder.is_dir() {
        bail!("{} is not a folder", folder.display());
    }
    let out = match out {
        Some(out) => out,
        None => default_output(folder)?,
    };

    let (mut store, summary) = scan_folder(folder, &settings.library, &LoftyProber)
        .with_context(|| format!("scanning {}", folder.display()))?;
    store.set_encoding(encoding.unwrap_or(settings.store.encoding));
    apply_history_cap(settings, &mut store);
    store
        .save_as(&out, settings.store.compress && !plain)
        .with_context(|| format!("writing {}", out.display()))?;

    println!(
        "read {} playlists ({} failed): {} tracks added, {} skipped, {} duplicates",
        summary.playlists,
        summary.failed_playlists,
        summary.added,
        summary.skipped,
        summary.duplicates
    );
    println!(
        "wrote {} containing {} groups totalling {}",
        out.display(),
        store.groups().len() - 1,
        humanized_time(store.secs_for(None))
    );
    Ok(())
}

/// `<folder-name>.mb` in the working directory.
fn default_output(folder: &Path) -> Result<PathBuf> {
    let folder = folder
        .canonicalize()
        .with_context(|| format!("resolving {}", folder.display()))?;
    let name = folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "library".to_string());
    Ok(PathBuf::from(name).with_extension(EXTENSION))
}

pub fn info(path: &Path) -> Result<()> {
    let store = open(path)?;

    println!(
        "read {} ({} encoding) containing {} groups and {} tracks totalling {}",
        path.display(),
        store.encoding(),
        store.groups().len() - 1,
        store.tracks().len(),
        humanized_time(store.secs_for(None))
    );
    print_group(&store, GroupId::TOP_LEVEL, 1);
    println!(
        "{} bookmarks, {} history entries{}",
        store.bookmarks().len(),
        store.history().len(),
        match store.current().and_then(|c| store.path_for(c.track)) {
            Some(path) => format!(", current: {path}"),
            None => String::new(),
        }
    );
    Ok(())
}

fn print_group(store: &Store, gid: GroupId, depth: usize) {
    let (groups, _) = store.sorted_children(gid);
    for group in groups {
        let tracks = store.child_tracks(group.gid).count();
        println!(
            "{:indent$}{} containing {} tracks totalling {}",
            "",
            group.name,
            tracks,
            humanized_time(store.secs_for(Some(group.gid.into()))),
            indent = depth * 2
        );
        print_group(store, group.gid, depth + 1);
    }
}

pub fn tree(path: &Path) -> Result<()> {
    let store = open(path)?;
    for line in store.paths() {
        println!("{line}");
    }
    Ok(())
}

pub fn convert(
    settings: &Settings,
    input: &Path,
    output: &Path,
    plain: bool,
    encoding: Option<Encoding>,
) -> Result<()> {
    if same_file(input, output) {
        bail!("input and output must be different");
    }
    let mut store = open(input)?;
    if let Some(encoding) = encoding {
        store.set_encoding(encoding);
    }
    apply_history_cap(settings, &mut store);
    store
        .save_as(output, settings.store.compress && !plain)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("saved {}", output.display());
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

pub fn print_config(settings: &Settings) -> Result<()> {
    let text = settings.to_toml().context("rendering settings")?;
    print!("{text}");
    Ok(())
}

fn open(path: &Path) -> Result<Store> {
    if !path.is_file() {
        bail!("{} does not exist", path.display());
    }
    let mut store = Store::new();
    store
        .load(path)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(store)
}

fn apply_history_cap(settings: &Settings, store: &mut Store) {
    let len = store.history().len();
    if let Some(cap) = settings.store.max_history.filter(|cap| len > *cap) {
        info!("trimming history from {len} to {cap} entries");
        store.truncate_history(cap);
    }
}
