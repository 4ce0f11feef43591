use anyhow::Result;
use tracing::warn;

use crate::Command;

mod commands;
mod logging;
mod settings;

pub fn run(command: Command) -> Result<()> {
    let (settings, problem) = settings::load_settings();
    logging::init(&settings.log);
    if let Some(problem) = problem {
        warn!("{problem}; using defaults");
    }

    match command {
        Command::Scan {
            folder,
            out,
            plain,
            encoding,
        } => commands::scan(&settings, &folder, out, plain, encoding.map(Into::into)),
        Command::Info { store } => commands::info(&store),
        Command::Tree { store } => commands::tree(&store),
        Command::Convert {
            input,
            output,
            plain,
            encoding,
        } => commands::convert(&settings, &input, &output, plain, encoding.map(Into::into)),
        Command::Config => commands::print_config(&settings),
    }
}
