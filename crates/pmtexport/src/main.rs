use crate::prelude::*;
use clap::Parser;

mod config;
mod error;
mod export;
mod inspect;
mod pipeline;
mod prelude;
mod sink;
mod source;
mod target;
mod upsert;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Export legacy project and release records into a metadata store and a JSON file"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Whether to display additional information.
    #[clap(long, env = "PMT_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Export projects and releases
    Export(crate::export::App),

    /// Inspect a target metadata store
    Inspect(crate::inspect::App),
}

fn main() -> Result<()> {
    let app = App::parse();

    let default_filter = if app.global.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    color_eyre::install()?;

    match app.command {
        SubCommands::Export(sub_app) => crate::export::run(sub_app, app.global),
        SubCommands::Inspect(sub_app) => crate::inspect::run(sub_app, app.global),
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
