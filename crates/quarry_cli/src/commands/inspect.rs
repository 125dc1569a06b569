//! Inspect command implementation.

use crate::error::CliResult;
use clap::ValueEnum;
use quarry_core::Database;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

/// Output format for `inspect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable report.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Database path, `:mem:` for in-memory stores.
    pub path: String,
    /// File format version.
    pub format_version: String,
    /// Key/value engine name.
    pub engine: String,
    /// Page size in bytes.
    pub page_size: usize,
    /// Pages in the file, header included.
    pub page_count: u64,
    /// Pages on the free list.
    pub free_pages: u64,
    /// File size implied by the page count.
    pub total_size: u64,
    /// Stored records.
    pub record_count: u64,
    /// Committed transactions over the life of the file.
    pub commit_counter: u64,
    /// Whether a rollback journal is in use.
    pub journal: bool,
    /// Whether the handle is read-only.
    pub read_only: bool,
    /// Runtime counters for this handle.
    pub stats: BTreeMap<&'static str, u64>,
}

/// Runs the inspect command.
pub fn run(db: &Database, format: Format, out: &mut dyn Write) -> CliResult<()> {
    let info = db.info()?;
    let result = InspectResult {
        path: info.path.map_or_else(
            || quarry_core::MEMORY_PATH.to_string(),
            |p| p.display().to_string(),
        ),
        format_version: format!("{}.{}", info.version.0, info.version.1),
        engine: info.engine,
        page_size: info.page_size,
        page_count: info.page_count,
        free_pages: info.free_pages,
        total_size: info.page_count * info.page_size as u64,
        record_count: info.record_count,
        commit_counter: info.commit_counter,
        journal: info.journal,
        read_only: info.read_only,
        stats: db.stats().fields().into_iter().collect(),
    };

    match format {
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?,
        Format::Text => print_text_output(&result, out)?,
    }
    Ok(())
}

fn print_text_output(result: &InspectResult, out: &mut dyn Write) -> CliResult<()> {
    writeln!(out, "QuarryDB Database Inspection")?;
    writeln!(out, "============================")?;
    writeln!(out)?;
    writeln!(out, "Path:    {}", result.path)?;
    writeln!(out, "Format:  {}", result.format_version)?;
    writeln!(out, "Engine:  {}", result.engine)?;
    writeln!(out, "Journal: {}", if result.journal { "on" } else { "off" })?;
    writeln!(out)?;
    writeln!(out, "Storage:")?;
    writeln!(out, "  Page size:   {} bytes", result.page_size)?;
    writeln!(out, "  Pages:       {}", result.page_count)?;
    writeln!(out, "  Free pages:  {}", result.free_pages)?;
    writeln!(out, "  Total size:  {}", format_size(result.total_size))?;
    writeln!(out)?;
    writeln!(out, "Records:       {}", result.record_count)?;
    writeln!(out, "Commits:       {}", result.commit_counter)?;
    writeln!(out)?;
    writeln!(out, "Counters:")?;
    for (name, value) in &result.stats {
        writeln!(out, "  {name:<26} {value}")?;
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_report_carries_header_and_counters() {
        let db = Database::open_in_memory().unwrap();
        db.store(b"k", b"v").unwrap();
        let mut out = Vec::new();
        run(&db, Format::Json, &mut out).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["path"], ":mem:");
        assert_eq!(json["record_count"], 1);
        assert_eq!(json["stats"]["writes"], 1);
    }

    #[test]
    fn text_report() {
        let db = Database::open_in_memory().unwrap();
        let mut out = Vec::new();
        run(&db, Format::Text, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("QuarryDB Database Inspection"));
        assert!(text.contains("Records:       0"));
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(4096), "4.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
