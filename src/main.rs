use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use musicbox::Encoding;

mod runtime;

#[derive(Parser)]
#[command(name = "musicbox")]
#[command(about = "Build, inspect and convert music-box library files", long_about = None)]
#[command(version, arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build a music box from a folder of M3U playlists
    Scan {
        /// Folder to scan; sub-folders become groups, playlists become leaf groups
        folder: PathBuf,
        /// Output file (defaults to `<folder-name>.mb`)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Write plain text instead of gzip
        #[arg(long)]
        plain: bool,
        /// Body encoding (defaults to `store.encoding` from the config)
        #[arg(long, value_enum)]
        encoding: Option<EncodingArg>,
    },
    /// Print a per-group summary with total durations
    Info {
        /// Music-box file to read
        store: PathBuf,
    },
    /// Print every group and track path, depth first
    Tree {
        /// Music-box file to read
        store: PathBuf,
    },
    /// Re-save a music box, optionally changing encoding or compression
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// Write plain text instead of gzip
        #[arg(long)]
        plain: bool,
        /// Body encoding (defaults to the input's encoding)
        #[arg(long, value_enum)]
        encoding: Option<EncodingArg>,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Copy, Clone, ValueEnum)]
pub enum EncodingArg {
    Flat,
    #[value(alias = "indent")]
    Tree,
}

impl From<EncodingArg> for Encoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Flat => Encoding::Flat,
            EncodingArg::Tree => Encoding::Tree,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match runtime::run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("musicbox: {err:#}");
            ExitCode::FAILURE
        }
    }
}
