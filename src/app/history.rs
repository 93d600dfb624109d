use crate::cli::HistoryAction;
use crate::persistence::{HistoryEntry, HistoryStore};
use anyhow::Result;
use std::io::{BufRead, Write};
use tracing::warn;

pub fn run(store: &dyn HistoryStore, action: HistoryAction) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match action {
        HistoryAction::List { raw } => list(store, raw, &mut out),
        HistoryAction::Delete { timestamp } => delete(store, &timestamp, &mut out),
        HistoryAction::Clear { yes } => {
            let stdin = std::io::stdin();
            clear(store, yes, &mut stdin.lock(), &mut out)
        }
    }
}

/// Convert stored output markup back into markdown for the terminal
fn to_markdown(html: &str) -> String {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["button", "script", "style"])
        .build();
    match converter.convert(html) {
        Ok(markdown) => markdown,
        Err(e) => {
            warn!("Failed to convert stored output: {e}");
            html.to_string()
        }
    }
}

fn write_entry(entry: &HistoryEntry, raw: bool, out: &mut impl Write) -> Result<()> {
    writeln!(out, "[{}] {}", entry.timestamp, entry.model)?;
    writeln!(out, "> {}", entry.input.replace('\n', "\n> "))?;
    if raw {
        writeln!(out, "{}", entry.output_html.trim_end())?;
    } else {
        writeln!(out, "{}", to_markdown(&entry.output_html).trim_end())?;
    }
    writeln!(out)?;
    Ok(())
}

fn list(store: &dyn HistoryStore, raw: bool, out: &mut impl Write) -> Result<()> {
    let entries = store.load()?;
    if entries.is_empty() {
        writeln!(out, "History is empty.")?;
        return Ok(());
    }
    for entry in &entries {
        write_entry(entry, raw, out)?;
    }
    Ok(())
}

fn delete(store: &dyn HistoryStore, timestamp: &str, out: &mut impl Write) -> Result<()> {
    if store.delete_by_key(timestamp)? {
        writeln!(out, "Deleted entry {timestamp}.")?;
    } else {
        writeln!(out, "No entry with timestamp {timestamp}.")?;
    }
    Ok(())
}

fn clear(
    store: &dyn HistoryStore,
    yes: bool,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<()> {
    let count = store.load()?.len();
    if count == 0 {
        writeln!(out, "History is already empty.")?;
        return Ok(());
    }

    if !yes {
        write!(out, "Delete all {count} history entries? [y/N] ")?;
        out.flush()?;
        let mut answer = String::new();
        input.read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            writeln!(out, "Kept the history.")?;
            return Ok(());
        }
    }

    store.clear()?;
    writeln!(out, "Cleared {count} entries.")?;
    Ok(())
}
