use std::path::PathBuf;

use colored::Colorize;

use crate::config::{ConfigFile, ExportConfig};
use crate::pipeline::{export_all, ExportSummary};
use crate::prelude::{eprintln, println, *};
use crate::sink::JsonSink;
use crate::source::{JsonSourceStore, SourceStore};
use crate::target::SqliteTargetStore;

#[derive(Debug, clap::Args)]
#[command(about = "Export projects and releases into the metadata store and a JSON file")]
pub struct App {
    /// Source document dump (JSON)
    #[arg(long, env = "PMT_SOURCE")]
    pmt: Option<String>,

    /// Target metadata store (SQLite), created when missing
    #[arg(long, env = "PMT_TARGET")]
    target: Option<String>,

    /// JSON export file, overwritten on every run
    #[arg(long, env = "PMT_JSON")]
    json: Option<String>,

    /// TOML file providing `pmt`, `target` and `json`
    #[arg(long, env = "PMT_CONFIG")]
    config: Option<PathBuf>,

    /// Exit with an error when any record fails to export
    #[arg(long)]
    strict: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    summary_json: bool,
}

pub fn run(app: App, global: crate::Global) -> Result<()> {
    let file = match &app.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };
    let config = ExportConfig::resolve(app.pmt, app.target, app.json, file)?;

    if global.verbose {
        eprintln!("Source: {}", config.source.display());
        eprintln!("Target: {}", config.target.display());
        eprintln!("JSON:   {}", config.json.display());
        eprintln!();
    }

    let source = JsonSourceStore::open(&config.source)?;
    let mut target = SqliteTargetStore::open(&config.target)?;
    let mut sink = JsonSink::create(&config.json).map_err(Error::ExportWrite)?;

    log::info!("Exporting {} from {}", source.title(), source.path());
    let summaries = export_all(&source, &mut target, &mut sink)
        .with_context(|| format!("Export from {} failed", config.source.display()))?;

    if app.summary_json {
        std::println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        println!(
            "{}",
            format!("JSON file written successfully to {}", config.json.display())
                .green()
                .bold()
        );
        print_summary(&summaries);
    }

    let failed: usize = summaries.iter().map(|s| s.failures.len()).sum();
    if app.strict && failed > 0 {
        return Err(eyre!("{failed} record(s) failed to export"));
    }

    Ok(())
}

fn print_summary(summaries: &[ExportSummary]) {
    let mut table = new_table();
    table.add_row(prettytable::row![
        "Kind".bold().cyan(),
        "Exported".bold().cyan(),
        "Skipped".bold().cyan(),
        "Failed".bold().cyan()
    ]);
    for summary in summaries {
        let failed = summary.failures.len().to_string();
        let failed = if summary.is_clean() {
            failed.bright_black()
        } else {
            failed.red().bold()
        };
        table.add_row(prettytable::row![
            summary.kind.to_string().bright_white(),
            summary.count.to_string().green(),
            summary.skipped.to_string().bright_black(),
            failed
        ]);
    }
    table.printstd();

    let failures: Vec<_> = summaries.iter().flat_map(|s| &s.failures).collect();
    if failures.is_empty() {
        return;
    }

    println!();
    let mut table = new_table();
    table.add_row(prettytable::row![
        "Id".bold().cyan(),
        "Record".bold().cyan(),
        "Error".bold().cyan()
    ]);
    for failure in failures {
        let error = if failure.upsert {
            failure.error.red().bold()
        } else {
            failure.error.yellow()
        };
        table.add_row(prettytable::row![
            failure.id.bright_black(),
            failure.label.bright_white(),
            error
        ]);
    }
    table.printstd();
}
