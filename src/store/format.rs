//! Tokens of the music-box file format.
//!
//! ```text
//! \fMB\t100
//! \fGROUPS              (flat encoding only)
//! gid\tname\tpgid
//! \fTRACKS
//! tid\tfilename\tsecs\tpgid      flat rows
//! \vRock / filename\tsecs        indentation rows
//! \fBOOKMARKS
//! \fHISTORY
//! \fCURRENT
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

pub const MAGIC: &str = "\x0CMB\t";
pub const VERSION: &str = "100";
pub const INDENT: char = '\x0B';
pub const TAB: char = '\t';
const SECTION_MARK: char = '\x0C';

/// How groups and tracks are laid out in the body of a file.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    /// Tab-separated rows with explicit ids and parent pointers.
    #[default]
    Flat,
    /// Group nesting by a repeated leading indent marker.
    #[serde(alias = "indent", alias = "indentation")]
    Tree,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Flat => f.write_str("flat"),
            Encoding::Tree => f.write_str("tree"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Section {
    Groups,
    Tracks,
    Bookmarks,
    History,
    Current,
}

impl Section {
    pub fn header(self) -> &'static str {
        match self {
            Section::Groups => "\x0CGROUPS",
            Section::Tracks => "\x0CTRACKS",
            Section::Bookmarks => "\x0CBOOKMARKS",
            Section::History => "\x0CHISTORY",
            Section::Current => "\x0CCURRENT",
        }
    }

    pub fn name(self) -> &'static str {
        &self.header()[1..]
    }

    /// Field-name line preceding the rows of a flat section.
    pub fn fields(self) -> &'static str {
        match self {
            Section::Groups => "gid\tname\tpgid",
            Section::Tracks => "tid\tfilename\tsecs\tpgid",
            Section::Bookmarks | Section::History => "tid",
            Section::Current => "tid\tpos",
        }
    }

    /// The field name a flat field-name line must start with.
    pub fn leading_field(self) -> &'static str {
        match self {
            Section::Groups => "gid",
            _ => "tid",
        }
    }

    /// The section allowed to follow this one.
    pub fn next(self) -> Option<Section> {
        match self {
            Section::Groups => Some(Section::Tracks),
            Section::Tracks => Some(Section::Bookmarks),
            Section::Bookmarks => Some(Section::History),
            Section::History => Some(Section::Current),
            Section::Current => None,
        }
    }

    fn from_header(line: &str) -> Option<Section> {
        [
            Section::Groups,
            Section::Tracks,
            Section::Bookmarks,
            Section::History,
            Section::Current,
        ]
        .into_iter()
        .find(|s| s.header() == line)
    }
}

/// What a non-blank line looks like, independent of parser state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Shape<'a> {
    Magic { version: &'a str },
    Header(Section),
    UnknownHeader(&'a str),
    Data(&'a str),
}

pub fn classify(line: &str) -> Shape<'_> {
    if let Some(version) = line.strip_prefix(MAGIC) {
        Shape::Magic { version }
    } else if line.starts_with(SECTION_MARK) {
        Section::from_header(line)
            .map(Shape::Header)
            .unwrap_or(Shape::UnknownHeader(line))
    } else {
        Shape::Data(line)
    }
}

/// Reject a group name or filename that would not read back unchanged.
pub fn check_name(text: &str) -> Result<(), &'static str> {
    if text.is_empty() {
        return Err("empty");
    }
    if text.contains([TAB, '\n', '\r']) {
        return Err("contains a tab or line break");
    }
    if text.starts_with([INDENT, SECTION_MARK]) {
        return Err("starts with a format marker");
    }
    if text.ends_with(char::is_whitespace) {
        return Err("ends with whitespace");
    }
    Ok(())
}

/// Render a duration the way both encodings store it.
pub fn format_secs(secs: f64) -> String {
    format!("{secs:.3}")
}
