mod app;
mod cli;
mod logging;
mod persistence;
mod render;
mod session;
mod settings;
mod ui;

#[cfg(test)]
mod tests;

use crate::cli::{Args, Mode};
use crate::logging::{setup_logging, setup_logging_for_interactive};
use crate::persistence::FileHistoryStore;
use crate::settings::Settings;
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if matches!(args.mode, Some(Mode::Interactive { .. })) {
        setup_logging_for_interactive(args.verbose);
    } else {
        setup_logging(args.verbose);
    }

    let settings_path = Settings::default_path()?;
    let connection = app::resolve_connection(&settings_path, args.api_url, args.model)?;

    match args.mode {
        Some(Mode::Translate(translate)) => app::translate::run(connection, translate).await,
        Some(Mode::Interactive {
            html_out,
            no_history,
        }) => app::interactive::run(connection, html_out, no_history).await,
        Some(Mode::Models) => app::models::run(&connection.api_url, &settings_path).await,
        Some(Mode::History { action }) => {
            let store = FileHistoryStore::open_default()?;
            app::history::run(&store, action)
        }
        // Translate mode (default)
        None => app::translate::run(connection, args.translate).await,
    }
}
