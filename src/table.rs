//! In-memory tabular artifact persisted as comma-delimited text with a header row.
//!
//! Every stage reads a whole artifact, works on it in memory and writes it back
//! wholesale. An empty field is a missing cell; all other text is kept verbatim
//! so columns a stage does not touch round-trip byte for byte.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{EtlError, Result};

/// A single value; `None` is a missing cell.
pub type Cell = Option<String>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        let name = name.into();
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != headers.len()) {
            return Err(EtlError::Table {
                artifact: name,
                message: format!("row {} has {} cells, expected {}", idx, row.len(), headers.len()),
            });
        }
        Ok(Self { name, headers, rows })
    }

    /// Build a table from string literals; empty strings become missing cells.
    pub fn from_rows(name: &str, headers: &[&str], rows: &[&[&str]]) -> Result<Self> {
        let headers = headers.iter().map(|h| h.to_string()).collect();
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|v| to_cell(v)).collect())
            .collect();
        Self::new(name, headers, rows)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(to_cell).collect());
        }

        debug!("Read {} rows x {} columns from {}", rows.len(), headers.len(), path.display());
        Self::new(artifact_name(path), headers, rows)
    }

    /// Write the table to `path` via a sibling temp file renamed into place,
    /// so a failed write leaves any existing artifact untouched.
    pub fn write(&self, path: &Path) -> Result<()> {
        write_atomically(path, |tmp| self.write_to(tmp))?;
        debug!("Wrote {} rows to {}", self.rows.len(), path.display());
        Ok(())
    }

    fn write_to(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| EtlError::schema(column, &self.name))
    }

    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |row| &row[idx])
    }

    /// Select `columns` in the given order. Every column must exist.
    pub fn project(&self, name: &str, columns: &[&str]) -> Result<Table> {
        let indices = columns
            .iter()
            .map(|c| self.column_index(c))
            .collect::<Result<Vec<_>>>()?;

        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();

        Ok(Table {
            name: name.to_string(),
            headers: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        })
    }

    /// Drop rows identical to an earlier row across all columns, keeping the
    /// first occurrence. Returns the number of rows removed.
    pub fn dedup(&mut self) -> usize {
        let before = self.rows.len();
        let mut seen: HashSet<Vec<Cell>> = HashSet::with_capacity(before);
        self.rows.retain(|row| seen.insert(row.clone()));
        before - self.rows.len()
    }

    /// Keep only rows for which `keep` returns true.
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[Cell]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }

    /// Replace every cell of column `idx` with `f(cell)`.
    pub fn map_column<F>(&mut self, idx: usize, mut f: F)
    where
        F: FnMut(&Cell) -> Cell,
    {
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// A column holds text when at least one present value is neither a
    /// number nor a boolean literal. All-missing columns are not text.
    pub fn is_text_column(&self, idx: usize) -> bool {
        self.column_values(idx)
            .flatten()
            .any(|v| !is_numeric_literal(v) && !is_bool_literal(v))
    }

    pub fn text_columns(&self) -> Vec<usize> {
        (0..self.headers.len()).filter(|&i| self.is_text_column(i)).collect()
    }
}

fn to_cell(value: &str) -> Cell {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn is_numeric_literal(value: &str) -> bool {
    value.trim().parse::<f64>().is_ok()
}

fn is_bool_literal(value: &str) -> bool {
    let v = value.trim();
    v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("false")
}

fn artifact_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn temp_path(path: &Path) -> PathBuf {
    path.with_file_name(format!(".{}.tmp", artifact_name(path)))
}

/// Run `write` against a sibling temp file, then rename it over `path`.
/// On failure the temp file is removed and `path` is left as it was.
pub(crate) fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let tmp = temp_path(path);
    if let Err(e) = write(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
