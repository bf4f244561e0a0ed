use console::{style, StyledObject};
use serde::Serialize;
use std::fmt::Display;
use tabled::{settings::Style, Table, Tabled};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Writes command output to stdout and diagnostics to stderr
///
/// In JSON mode stdout carries exactly one document, produced by
/// [`OutputWriter::result`]; the human-mode helpers print nothing.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        let format = if json { OutputFormat::Json } else { OutputFormat::Human };
        Self { format }
    }

    fn human(&self) -> bool {
        self.format == OutputFormat::Human
    }

    fn diagnostic(&self, status: &str, marker: StyledObject<&str>, message: impl Display) {
        if self.human() {
            eprintln!("{} {}", marker, message);
        } else {
            eprintln!("{}", serde_json::json!({ "status": status, "message": message.to_string() }));
        }
    }

    pub fn success(&self, message: impl Display) {
        if self.human() {
            println!("{} {}", style("✓").green().bold(), message);
        }
    }

    pub fn info(&self, message: impl Display) {
        if self.human() {
            println!("{} {}", style("ℹ").blue().bold(), message);
        }
    }

    pub fn warning(&self, message: impl Display) {
        self.diagnostic("warning", style("⚠").yellow().bold(), message);
    }

    pub fn error(&self, message: impl Display) {
        self.diagnostic("error", style("✗").red().bold(), message);
    }

    pub fn kv(&self, key: impl Display, value: impl Display) {
        if self.human() {
            println!("{}: {}", style(key).bold(), value);
        }
    }

    pub fn section(&self, title: impl Display) {
        if self.human() {
            println!("\n{}", style(title).bold().underlined());
        }
    }

    pub fn table<T: Tabled>(&self, rows: Vec<T>) {
        if !self.human() {
            return;
        }
        if rows.is_empty() {
            println!("{}", style("(none)").dim());
        } else {
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{}", table);
        }
    }

    pub fn result<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if !self.human() {
            let output = serde_json::json!({ "status": "success", "data": data });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Ok(())
    }
}
