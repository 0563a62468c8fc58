//! Output formatting
//!
//! Commands render through an [`OutputFormatter`] picked from the global
//! `--json/--csv/--quiet` flags or `output.format`. In the machine-readable
//! formats status lines go to stderr so stdout stays parseable.

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;

pub use ghl_core::config::OutputFormat;

/// Dotted path into a record, and its header
pub type Column = (&'static str, &'static str);

const MAX_CELL_WIDTH: usize = 48;

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &Value);
    /// A list of records, one row each
    fn print_list(&self, title: &str, rows: &[Value], columns: &[Column]);
    /// One record, one line per field
    fn print_record(&self, record: &Value, fields: &[Column]);
    /// Outcome of a write and the record it returned
    fn print_result(&self, message: &str, record: &Value, fields: &[Column]) {
        self.success(message);
        self.print_record(record, fields);
    }
}

// ============================================================================
// Cell rendering
// ============================================================================

/// Follows a dotted path (`contact.name`) into a record.
pub fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(record, |value, key| value.get(key))
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(render)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

/// Display text of the field at `path`; empty when missing.
pub fn cell(record: &Value, path: &str) -> String {
    lookup(record, path).map(render).unwrap_or_default()
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Column-aligned table with a header and a rule.
pub fn render_table(rows: &[Value], columns: &[Column]) -> String {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|(path, _)| truncate(&cell(row, path).replace(['\n', '\r'], " "), MAX_CELL_WIDTH))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|(_, h)| h.chars().count()).collect();
    for row in &cells {
        for (width, value) in widths.iter_mut().zip(row) {
            *width = (*width).max(value.chars().count());
        }
    }

    let line = |values: &[String]| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(value, &width)| format!("{value:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let headers: Vec<String> = columns.iter().map(|(_, h)| h.to_string()).collect();
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let mut lines = vec![line(&headers), line(&rule)];
    lines.extend(cells.iter().map(|row| line(row)));
    lines.join("\n")
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// RFC 4180 CSV with a header row.
pub fn render_csv(rows: &[Value], columns: &[Column]) -> String {
    let header = columns
        .iter()
        .map(|(_, h)| csv_field(h))
        .collect::<Vec<_>>()
        .join(",");
    let mut lines = vec![header];
    for row in rows {
        lines.push(
            columns
                .iter()
                .map(|(path, _)| csv_field(&cell(row, path)))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    lines.join("\n")
}

/// `Label: value` lines for the non-empty fields of a record.
pub fn render_fields(record: &Value, fields: &[Column]) -> String {
    let present: Vec<(&str, String)> = fields
        .iter()
        .map(|(path, label)| (*label, cell(record, path)))
        .filter(|(_, value)| !value.is_empty())
        .collect();
    let width = present.iter().map(|(label, _)| label.chars().count() + 1).max().unwrap_or(0);
    present
        .iter()
        .map(|(label, value)| format!("  {:<width$}  {value}", format!("{label}:")))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn to_rows<T: Serialize>(items: &[T]) -> anyhow::Result<Vec<Value>> {
    items
        .iter()
        .map(|item| serde_json::to_value(item).context("Failed to serialize record"))
        .collect()
}

pub fn to_record<T: Serialize>(item: &T) -> anyhow::Result<Value> {
    serde_json::to_value(item).context("Failed to serialize record")
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

// ============================================================================
// Formatters
// ============================================================================

/// Human-readable tables with checkmarks
pub struct TableFormatter;

impl OutputFormatter for TableFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn print_json(&self, value: &Value) {
        println!("{}", pretty(value));
    }
    fn print_list(&self, title: &str, rows: &[Value], columns: &[Column]) {
        println!("{title}");
        if rows.is_empty() {
            println!("  No results");
            return;
        }
        println!();
        println!("{}", render_table(rows, columns));
    }
    fn print_record(&self, record: &Value, fields: &[Column]) {
        println!("{}", render_fields(record, fields));
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"success": true, "message": message})
        );
    }
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn warn(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"level": "warning", "message": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &Value) {
        println!("{}", pretty(value));
    }
    fn print_list(&self, _title: &str, rows: &[Value], _columns: &[Column]) {
        println!("{}", pretty(&Value::Array(rows.to_vec())));
    }
    fn print_record(&self, record: &Value, _fields: &[Column]) {
        println!("{}", pretty(record));
    }
    fn print_result(&self, _message: &str, record: &Value, _fields: &[Column]) {
        println!("{}", pretty(record));
    }
}

/// CSV rows on stdout, status on stderr
pub struct CsvFormatter;

impl OutputFormatter for CsvFormatter {
    fn success(&self, message: &str) {
        eprintln!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &Value) {
        println!("{}", pretty(value));
    }
    fn print_list(&self, _title: &str, rows: &[Value], columns: &[Column]) {
        println!("{}", render_csv(rows, columns));
    }
    fn print_record(&self, record: &Value, fields: &[Column]) {
        println!("{}", render_csv(std::slice::from_ref(record), fields));
    }
    fn print_result(&self, _message: &str, record: &Value, fields: &[Column]) {
        self.print_record(record, fields);
    }
}

/// Ids only, one per line
pub struct QuietFormatter;

impl OutputFormatter for QuietFormatter {
    fn success(&self, _message: &str) {}
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &Value) {
        let id = cell(value, "id");
        if !id.is_empty() {
            println!("{id}");
        }
    }
    fn print_list(&self, _title: &str, rows: &[Value], _columns: &[Column]) {
        for row in rows {
            self.print_json(row);
        }
    }
    fn print_record(&self, record: &Value, _fields: &[Column]) {
        self.print_json(record);
    }
    fn print_result(&self, _message: &str, record: &Value, _fields: &[Column]) {
        self.print_json(record);
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
        OutputFormat::Quiet => Box::new(QuietFormatter),
    }
}
