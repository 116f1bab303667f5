//! Terminal output formatting
//!
//! ASCII only, colored with owo-colors.

use owo_colors::OwoColorize;

pub const SEPARATOR: &str = "------------------------------------------------------------";

/// Status level for messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    pub fn tag(&self) -> &'static str {
        match self {
            Level::Info => "[INFO]",
            Level::Success => "[OK]",
            Level::Warning => "[WARN]",
            Level::Error => "[ERROR]",
        }
    }
}

pub fn header(text: &str) -> String {
    format!("{}\n{}", text.bold(), SEPARATOR.dimmed())
}

pub fn section(text: &str) -> String {
    let title = format!("[{}]", text.to_uppercase());
    title.cyan().to_string()
}

pub fn status(level: Level, message: &str) -> String {
    let tag = level.tag();
    let tag = match level {
        Level::Info => tag.cyan().to_string(),
        Level::Success => tag.bright_green().to_string(),
        Level::Warning => tag.yellow().to_string(),
        Level::Error => tag.bright_red().to_string(),
    };
    format!("{} {}", tag, message)
}

/// `  key:            value` with keys padded to a common column
pub fn kv(key: &str, value: &str) -> String {
    let key = format!("{:<16}", format!("{}:", key));
    format!("  {} {}", key.dimmed(), value)
}

/// Fixed-width rows for list output
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.len());
            }
        }
    }

    let mut lines = vec![render_row(headers, &widths)];
    for row in rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        lines.push(render_row(&cells, &widths));
    }
    lines.join("\n")
}

fn render_row(cells: &[&str], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}
