//! Library model and the collaborators that feed it.
//!
//! `model` holds the group/track types and id ranges, `probe` reads tags,
//! `playlist` reads M3U files and `scan` builds a store from a folder of them.

mod display;
mod model;
pub mod playlist;
mod probe;
mod scan;

pub use display::{display_name, humanized_time, title_from_filename};
pub use model::*;
pub use probe::{LoftyProber, Probe, Prober};
pub use scan::{ScanSummary, scan, scan_into};

#[cfg(test)]
mod tests;
