//! Terminal output helpers.
//!
//! Human-readable lines go to stdout, except errors which go to stderr.
//! `--json` output is always a single pretty-printed document on stdout.

use anyhow::Result;
use chrono::DateTime;
use serde::Serialize;
use std::io::Write;

pub fn success(message: &str) {
    println!("✓ {}", message);
}

pub fn error(message: &str) {
    eprintln!("✗ {}", message);
}

pub fn info(message: &str) {
    println!("ℹ {}", message);
}

/// Progress feedback on stderr so it never mixes with `--json` output.
pub fn progress(message: &str) {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "{}", message);
    let _ = stderr.flush();
}

pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn table(headers: &[&str], rows: &[Vec<String>]) {
    print!("{}", format_table(headers, rows));
}

/// Left-aligned columns separated by two spaces, with a dashed rule under
/// the header.
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = format_row(&widths, headers.iter().copied());
    let rule = widths
        .iter()
        .map(|&w| "-".repeat(w))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(&rule);
    out.push('\n');
    for row in rows {
        out.push_str(&format_row(&widths, row.iter().map(String::as_str)));
    }
    out
}

fn format_row<'a>(widths: &[usize], mut cells: impl Iterator<Item = &'a str>) -> String {
    let line = widths
        .iter()
        .map(|&width| {
            let cell = cells.next().unwrap_or("");
            let pad = width.saturating_sub(cell.chars().count());
            format!("{}{}", cell, " ".repeat(pad))
        })
        .collect::<Vec<_>>()
        .join("  ");
    format!("{}\n", line.trim_end())
}

/// `m:ss` for a length in seconds.
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Calendar date of an RFC 3339 timestamp; anything else is shown as given.
pub fn format_date(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_table_pads_columns() {
        let rows = vec![
            vec!["Bedtime Stories".to_string(), "5ukMR".to_string()],
            vec!["Car".to_string(), "x1".to_string()],
        ];
        let out = format_table(&["Title", "Card ID"], &rows);

        assert_eq!(
            out,
            "Title            Card ID\n\
             ---------------  -------\n\
             Bedtime Stories  5ukMR\n\
             Car              x1\n"
        );
    }

    #[test]
    fn test_format_table_short_row() {
        let rows = vec![vec!["only".to_string()]];
        let out = format_table(&["A", "B"], &rows);
        assert_eq!(out.lines().nth(2), Some("only"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(61), "1:01");
        assert_eq!(format_duration(3600), "60:00");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2024-06-01T12:30:00.000Z"), "2024-06-01");
        assert_eq!(format_date("yesterday"), "yesterday");
    }
}
