//! Text sanitizer: maps known non-ASCII characters to ASCII, deletes whatever
//! non-ASCII is left, and collapses whitespace in every text column.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::constants::cleaned_name;
use crate::error::{EtlError, Result};
use crate::metrics::{phase_metric, time_operation, SanitizeMetrics};
use crate::table::{Cell, Table};

static NON_ASCII: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\x00-\x7F]+").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// One literal substitution applied before the catch-all deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replacement {
    pub from: String,
    pub to: String,
}

impl Replacement {
    fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Ordered dictionary of literal replacements.
///
/// Every key contains a non-ASCII character and every value is pure ASCII, so a
/// sanitized string never matches a key again and the pass is idempotent.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplacementMap {
    entries: Vec<Replacement>,
}

impl ReplacementMap {
    pub fn new(entries: Vec<Replacement>) -> Result<Self> {
        for entry in &entries {
            if entry.from.is_ascii() {
                return Err(EtlError::Config(format!(
                    "replacement key {:?} has no non-ASCII character",
                    entry.from
                )));
            }
            if !entry.to.is_ascii() {
                return Err(EtlError::Config(format!(
                    "replacement for {:?} must be ASCII, got {:?}",
                    entry.from, entry.to
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[Replacement] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for entry in &self.entries {
            if out.contains(entry.from.as_str()) {
                out = out.replace(entry.from.as_str(), &entry.to);
            }
        }
        out
    }
}

impl Default for ReplacementMap {
    fn default() -> Self {
        Self {
            entries: vec![
                Replacement::new("\u{2019}", "'"),
                Replacement::new("\u{201d}", "\""),
                Replacement::new("\u{201c}", "\""),
                Replacement::new("\u{3010}", "["),
                Replacement::new("\u{3011}", "]"),
                Replacement::new("\u{2013}", "-"),
                Replacement::new("\u{2014}", "-"),
                Replacement::new("\u{1f381}", ""),
                Replacement::new("\u{2605}", "*"),
                Replacement::new("\u{00b0}", " degrees"),
                Replacement::new("\u{03a9}", "Omega"),
                Replacement::new("\u{00b1}", "+/-"),
                Replacement::new("\u{00d7}", "x"),
                Replacement::new("\u{00a0}", " "),
                Replacement::new("\u{200e}", ""),
                Replacement::new("\u{2764}", ""),
                Replacement::new("\u{270c}", ""),
                Replacement::new("\u{274c}", ""),
                Replacement::new("\u{1f44d}", ""),
                Replacement::new("\u{2717}", ""),
                Replacement::new("\u{2713}", ""),
                Replacement::new("\u{2728}", ""),
            ],
        }
    }
}

/// Clean a single string. Replacements run first so mapped characters are not
/// swallowed by the non-ASCII deletion.
pub fn sanitize_text(text: &str, map: &ReplacementMap) -> String {
    let replaced = map.apply(text);
    let ascii = NON_ASCII.replace_all(&replaced, "");
    WHITESPACE.replace_all(&ascii, " ").trim().to_string()
}

/// Missing cells stay missing.
pub fn sanitize_cell(cell: &Cell, map: &ReplacementMap) -> Cell {
    cell.as_deref().map(|text| sanitize_text(text, map))
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SanitizeReport {
    pub artifact: String,
    pub output: Option<PathBuf>,
    pub text_columns: Vec<String>,
    pub cells_seen: usize,
    pub cells_changed: usize,
}

/// Sanitize every text column, returning a new table; `table` is not modified.
pub fn sanitize_table(table: &Table, map: &ReplacementMap) -> (Table, SanitizeReport) {
    let _timing = time_operation(phase_metric!(histogram, "sanitize", "duration_seconds"));

    let mut cleaned = table.clone();
    let mut report = SanitizeReport {
        artifact: table.name().to_string(),
        ..SanitizeReport::default()
    };

    for idx in table.text_columns() {
        report.text_columns.push(table.headers()[idx].clone());
        cleaned.map_column(idx, |cell| {
            let out = sanitize_cell(cell, map);
            if cell.is_some() {
                report.cells_seen += 1;
                if out != *cell {
                    report.cells_changed += 1;
                }
            }
            out
        });
    }

    SanitizeMetrics::record_cells(report.cells_seen, report.cells_changed);
    debug!(
        artifact = %report.artifact,
        columns = ?report.text_columns,
        "Sanitized {} of {} text cells",
        report.cells_changed,
        report.cells_seen
    );
    (cleaned, report)
}

/// Sanitize the artifact at `input` and write it next to it as `cleaned_<name>`.
#[instrument(skip_all, fields(input = %input.display()))]
pub fn sanitize_file(input: &Path, map: &ReplacementMap) -> Result<SanitizeReport> {
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| EtlError::Config(format!("not a file path: {}", input.display())))?;
    let output = input.with_file_name(cleaned_name(&file_name));

    let table = Table::read(input)?;
    let (cleaned, mut report) = sanitize_table(&table, map);
    cleaned.with_name(cleaned_name(&file_name)).write(&output)?;

    info!("Cleaned CSV saved as: {}", output.display());
    report.output = Some(output);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(text: &str) -> String {
        sanitize_text(text, &ReplacementMap::default())
    }

    #[test]
    fn replaces_known_characters() {
        assert_eq!(clean("\u{201c}Best\u{201d} \u{2013} 5\u{00d7}2"), "\"Best\" - 5x2");
        assert_eq!(clean("Heats to 60\u{00b0}"), "Heats to 60 degrees");
        assert_eq!(clean("\u{00b1}5%"), "+/-5%");
        assert_eq!(clean("\u{3010}Combo\u{3011} 10\u{03a9}"), "[Combo] 10Omega");
        assert_eq!(clean("It\u{2019}s \u{2605}\u{2605}"), "It's **");
    }

    #[test]
    fn deletes_emoji_and_remaining_non_ascii() {
        assert_eq!(clean("Gift \u{1f381} for you \u{1f44d}\u{2728}"), "Gift for you");
        assert_eq!(clean("caf\u{e9} na\u{ef}ve"), "caf nave");
        assert_eq!(clean("\u{0928}\u{092e}\u{0938}\u{094d}\u{0924}\u{0947}"), "");
    }

    #[test]
    fn collapses_whitespace_and_trims() {
        assert_eq!(clean("  a \t\n b\u{00a0}\u{00a0}c  "), "a b c");
        assert_eq!(clean("left\u{200e} mark"), "left mark");
    }

    #[test]
    fn replacements_run_before_deletion() {
        let map = ReplacementMap::new(vec![Replacement::new("\u{e9}", "e")]).unwrap();
        assert_eq!(sanitize_text("caf\u{e9}", &map), "cafe");
    }

    #[test]
    fn output_is_ascii_and_idempotent() {
        let inputs = [
            "Boat \u{2013} \u{201c}Rockerz\u{201d} 450 \u{2764}\u{fe0f}",
            "\u{2714} Fast \u{00d7} 2\u{00b0}  \u{1f600} end ",
            "plain ascii",
            "",
        ];
        for input in inputs {
            let once = clean(input);
            assert!(once.is_ascii(), "{once:?}");
            assert_eq!(clean(&once), once);
        }
    }

    #[test]
    fn missing_cell_is_passed_through() {
        assert_eq!(sanitize_cell(&None, &ReplacementMap::default()), None);
    }

    #[test]
    fn rejects_non_ascii_replacement_value() {
        let err = ReplacementMap::new(vec![Replacement::new("\u{2019}", "\u{2018}")]).unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[test]
    fn sanitize_table_touches_only_text_columns() {
        let table = Table::from_rows(
            "products.csv",
            &["product_id", "product_name", "rating"],
            &[&["B01", "USB\u{2013}C  Cable", "4.2"], &["B02", "", "4.0"]],
        )
        .unwrap();
        let before = table.clone();

        let (cleaned, report) = sanitize_table(&table, &ReplacementMap::default());

        assert_eq!(table, before);
        assert_eq!(report.text_columns, vec!["product_id".to_string(), "product_name".to_string()]);
        assert_eq!(report.cells_seen, 3);
        assert_eq!(report.cells_changed, 1);
        assert_eq!(cleaned.rows()[0][1].as_deref(), Some("USB-C Cable"));
        assert_eq!(cleaned.rows()[1][1], None);
        assert_eq!(cleaned.rows()[0][2].as_deref(), Some("4.2"));
    }
}
