use std::path::PathBuf;

use colored::Colorize;

use crate::prelude::{println, *};
use pmtexport_core::source::ItemValue;

use crate::target::{NoteId, SqliteTargetStore, TargetStore};

#[derive(Debug, clap::Args)]
#[command(about = "Show the title and record counts of a target metadata store")]
pub struct App {
    /// Target metadata store (SQLite)
    #[arg(long, env = "PMT_TARGET")]
    target: PathBuf,

    /// Show the stored items of the documents with this record id
    #[arg(long)]
    id: Option<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, serde::Serialize)]
struct StoreOverview {
    title: Option<String>,
    total: i64,
    counts: Vec<FormCount>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    documents: Vec<StoredDocument>,
}

#[derive(Debug, serde::Serialize)]
struct StoredDocument {
    note: NoteId,
    form: String,
    items: Vec<(String, ItemValue)>,
}

#[derive(Debug, serde::Serialize)]
struct FormCount {
    form: String,
    count: i64,
}

pub fn run(app: App, _global: crate::Global) -> Result<()> {
    let store = SqliteTargetStore::open_existing(&app.target)?;

    let mut documents = Vec::new();
    if let Some(id) = &app.id {
        for note in store.find_by_id(id).map_err(Error::from)? {
            if let Some(document) = store.load(note).map_err(Error::from)? {
                documents.push(StoredDocument {
                    note,
                    form: document.kind.form().to_string(),
                    items: document.items,
                });
            }
        }
    }

    let overview = StoreOverview {
        title: store.title().map_err(Error::from)?,
        total: store.count_documents().map_err(Error::from)?,
        counts: store
            .count_by_form()
            .map_err(Error::from)?
            .into_iter()
            .map(|(form, count)| FormCount { form, count })
            .collect(),
        documents,
    };

    if app.json {
        std::println!("{}", serde_json::to_string_pretty(&overview)?);
        return Ok(());
    }

    println!(
        "{}",
        overview.title.as_deref().unwrap_or("(untitled)").bold()
    );

    if overview.counts.is_empty() {
        println!("No records found.");
        return Ok(());
    }

    let mut table = new_table();
    table.add_row(prettytable::row!["Form".bold().cyan(), "Records".bold().cyan()]);
    for entry in &overview.counts {
        table.add_row(prettytable::row![
            entry.form.bright_white(),
            entry.count.to_string().green()
        ]);
    }
    table.add_row(prettytable::row![
        "Total".bold(),
        overview.total.to_string().green().bold()
    ]);
    table.printstd();

    if let Some(id) = &app.id {
        print_documents(id, &overview.documents)?;
    }

    Ok(())
}

fn print_documents(id: &str, documents: &[StoredDocument]) -> Result<()> {
    println!();
    if documents.is_empty() {
        println!("No documents with id {}", id.yellow());
        return Ok(());
    }

    for document in documents {
        println!(
            "{} {} ({})",
            "Note".bold(),
            document.note.to_string().bright_white(),
            document.form.cyan()
        );
        let mut table = new_table();
        table.add_row(prettytable::row!["Item".bold().cyan(), "Value".bold().cyan()]);
        for (name, value) in &document.items {
            let value = serde_json::to_string(value)?;
            table.add_row(prettytable::row![name.bright_white(), value]);
        }
        table.printstd();
    }

    Ok(())
}
