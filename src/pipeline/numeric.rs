//! Numeric normalizer for currency, count and percentage columns.
//!
//! Each cell yields a [`CellOutcome`]: the parsed value or a missing value, plus
//! a diagnostic when the raw text could not be parsed. Parse failures never abort
//! the stage.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument, warn};

use crate::constants::{ACTUAL_PRICE, DISCOUNTED_PRICE, DISCOUNT_PERCENTAGE, RATING_COUNT};
use crate::error::Result;
use crate::metrics::NumericMetrics;
use crate::table::{Cell, Table};

const CURRENCY_GLYPH: char = '\u{20b9}';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NumericKind {
    /// Thousands separators and the currency glyph are stripped; optionally
    /// converted at the configured rate; rounded to 2 places.
    Price { convert: bool },
    /// A trailing percent sign is stripped; the value is kept as parsed.
    Percentage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericRule {
    pub column: String,
    pub kind: NumericKind,
}

impl NumericRule {
    pub fn price(column: &str, convert: bool) -> Self {
        Self {
            column: column.to_string(),
            kind: NumericKind::Price { convert },
        }
    }

    pub fn percentage(column: &str) -> Self {
        Self {
            column: column.to_string(),
            kind: NumericKind::Percentage,
        }
    }
}

/// Both prices are converted; the rating count is only de-formatted.
pub fn default_rules() -> Vec<NumericRule> {
    vec![
        NumericRule::price(DISCOUNTED_PRICE, true),
        NumericRule::price(ACTUAL_PRICE, true),
        NumericRule::price(RATING_COUNT, false),
        NumericRule::percentage(DISCOUNT_PERCENTAGE),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellOutcome {
    pub value: Option<f64>,
    pub diagnostic: Option<String>,
}

impl CellOutcome {
    fn missing() -> Self {
        Self {
            value: None,
            diagnostic: None,
        }
    }

    fn parsed(value: f64) -> Self {
        // NaN is how a missing number is spelled in some exports
        Self {
            value: (!value.is_nan()).then_some(value),
            diagnostic: None,
        }
    }

    fn failed(reason: String) -> Self {
        Self {
            value: None,
            diagnostic: Some(reason),
        }
    }

    pub fn to_cell(&self) -> Cell {
        self.value.map(format_float)
    }
}

pub fn parse_price(raw: &Cell, convert: bool, rate: f64) -> CellOutcome {
    let Some(raw) = raw.as_deref() else {
        return CellOutcome::missing();
    };

    let cleaned = raw.replace(',', "").replace(CURRENCY_GLYPH, "");
    match cleaned.trim().parse::<f64>() {
        Ok(value) => {
            let value = if convert { value * rate } else { value };
            CellOutcome::parsed(round_to(value, 2))
        }
        Err(_) => CellOutcome::failed(format!("Could not convert price/count: {}", raw)),
    }
}

pub fn parse_percentage(raw: &Cell) -> CellOutcome {
    let Some(raw) = raw.as_deref() else {
        return CellOutcome::missing();
    };

    match raw.replace('%', "").trim().parse::<f64>() {
        Ok(value) => CellOutcome::parsed(value),
        Err(_) => CellOutcome::failed(format!("Could not convert percentage: {}", raw)),
    }
}

/// Round to `places` decimal places; exact ties go to the even neighbour.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round_ties_even() / factor
}

/// Shortest round-trip form, always with a fractional part (`12.0`, `13.19`).
/// Magnitudes of 1e16 and above use exponent form (`1e+16`).
pub fn format_float(value: f64) -> String {
    if !value.is_finite() {
        format!("{}", value)
    } else if value.abs() >= 1e16 {
        format_exponent(value)
    } else if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

fn format_exponent(value: f64) -> String {
    let rendered = format!("{:e}", value);
    match rendered.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => rendered,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellDiagnostic {
    pub column: String,
    pub row: usize,
    pub raw: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizeReport {
    pub artifact: String,
    pub columns_normalized: Vec<String>,
    pub columns_skipped: Vec<String>,
    pub cells_parsed: usize,
    pub diagnostics: Vec<CellDiagnostic>,
}

/// Apply `rules` to `table` in place. Columns a rule names but the table lacks
/// are skipped.
pub fn normalize_table(table: &mut Table, rules: &[NumericRule], rate: f64) -> NormalizeReport {
    let mut report = NormalizeReport {
        artifact: table.name().to_string(),
        ..NormalizeReport::default()
    };

    for rule in rules {
        let Ok(idx) = table.column_index(&rule.column) else {
            report.columns_skipped.push(rule.column.clone());
            continue;
        };

        let mut row = 0;
        table.map_column(idx, |cell| {
            let outcome = match rule.kind {
                NumericKind::Price { convert } => parse_price(cell, convert, rate),
                NumericKind::Percentage => parse_percentage(cell),
            };

            if let Some(reason) = &outcome.diagnostic {
                warn!(column = %rule.column, row, "{}", reason);
                NumericMetrics::record_parse_failure();
                report.diagnostics.push(CellDiagnostic {
                    column: rule.column.clone(),
                    row,
                    raw: cell.clone().unwrap_or_default(),
                    reason: reason.clone(),
                });
            } else if outcome.value.is_some() {
                report.cells_parsed += 1;
            }

            row += 1;
            outcome.to_cell()
        });
        report.columns_normalized.push(rule.column.clone());
    }

    NumericMetrics::record_parsed(report.cells_parsed);
    report
}

/// Normalize the artifact at `path` and overwrite it.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn normalize_file(path: &Path, rules: &[NumericRule], rate: f64) -> Result<NormalizeReport> {
    let mut table = Table::read(path)?;
    let report = normalize_table(&mut table, rules, rate);
    table.write(path)?;

    info!(
        "Columns cleaned and saved to: {} ({} parse failures)",
        path.display(),
        report.diagnostics.len()
    );
    Ok(report)
}
