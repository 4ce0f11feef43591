//! Lazy, single-pass M3U reader.
//!
//! ```text
//! M3U      ::= '#EXTM3U' ENTRY+
//! ENTRY    ::= INFO FILENAME
//! INFO     ::= '#EXTINF:' SECONDS ',' TITLE
//! FILENAME ::= .+
//! ```
//!
//! Other `#` directives (e.g. `#EXTALB:`) and blank lines are skipped.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::PlaylistError;

const EXTM3U: &str = "#EXTM3U";
const EXTINF: &str = "#EXTINF:";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Expect {
    Header,
    Info,
    Filename,
    Done,
}

/// Yields the track paths of one playlist in order, then stops. Fused after an error.
pub struct Playlist<R> {
    lines: io::Lines<R>,
    lino: usize,
    expect: Expect,
    base: Option<PathBuf>,
}

/// Open an M3U file; relative entries resolve against its directory.
pub fn open(path: &Path) -> Result<Playlist<BufReader<File>>, PlaylistError> {
    let file = File::open(path)?;
    let base = path.parent().map(Path::to_path_buf);
    Ok(Playlist::new(BufReader::new(file), base))
}

impl<R: BufRead> Playlist<R> {
    pub fn new(reader: R, base: Option<PathBuf>) -> Self {
        Self {
            lines: reader.lines(),
            lino: 0,
            expect: Expect::Header,
            base,
        }
    }

    fn fail(&mut self, line: usize, message: String) -> Option<Result<PathBuf, PlaylistError>> {
        self.expect = Expect::Done;
        Some(Err(PlaylistError::Format { line, message }))
    }

    fn resolve(&self, entry: &str) -> PathBuf {
        let path = PathBuf::from(entry);
        match &self.base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }
}

impl<R: BufRead> Iterator for Playlist<R> {
    type Item = Result<PathBuf, PlaylistError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.expect == Expect::Done {
            return None;
        }
        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(err)) => {
                    self.expect = Expect::Done;
                    return Some(Err(err.into()));
                }
                None => {
                    let at = self.lino + 1;
                    return match self.expect {
                        Expect::Header => self.fail(at, format!("missing {EXTM3U} header")),
                        Expect::Filename => {
                            self.fail(at, format!("missing filename after {EXTINF} line"))
                        }
                        _ => {
                            self.expect = Expect::Done;
                            None
                        }
                    };
                }
            };
            self.lino += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match self.expect {
                Expect::Header => {
                    if line != EXTM3U {
                        return self.fail(self.lino, format!("invalid M3U header: {line:?}"));
                    }
                    self.expect = Expect::Info;
                }
                Expect::Info => {
                    if line.starts_with(EXTINF) {
                        self.expect = Expect::Filename;
                    } else if !line.starts_with('#') {
                        return self.fail(self.lino, format!("invalid {EXTINF} line: {line:?}"));
                    }
                }
                Expect::Filename => {
                    if line.starts_with(EXTINF) {
                        return self
                            .fail(self.lino, format!("unexpected {EXTINF} line: {line:?}"));
                    }
                    if line.starts_with('#') {
                        continue;
                    }
                    self.expect = Expect::Info;
                    return Some(Ok(self.resolve(line)));
                }
                Expect::Done => return None,
            }
        }
    }
}
