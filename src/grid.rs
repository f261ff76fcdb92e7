use std::path::Path;

use anyhow::{bail, Context};
use calamine::{open_workbook_auto, DataType, Reader};
use chrono::NaiveDateTime;

use crate::normalize;

/// Scalar cell value of a parsed export, before any interpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
    Bool(bool),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Text rendering used by header matching and identity fields.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => {
                if n.fract() == 0.0 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            Cell::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Cell::Bool(b) => b.to_string(),
        }
    }
}

pub type RawGrid = Vec<Vec<Cell>>;

/// Reads a delimited text export. Quoting, doubled-quote escapes and
/// CRLF/LF endings are handled by the csv reader itself.
pub fn read_csv_grid(path: &Path) -> anyhow::Result<RawGrid> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut grid = Vec::new();
    for result in reader.records() {
        let record = result?;
        let row = record
            .iter()
            .map(|field| {
                if field.trim().is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(field.to_string())
                }
            })
            .collect();
        grid.push(row);
    }
    Ok(grid)
}

/// Reads the first worksheet of a spreadsheet export.
pub fn read_sheet_grid(path: &Path) -> anyhow::Result<RawGrid> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let sheet_names = workbook.sheet_names().to_owned();
    let first = sheet_names
        .first()
        .context("workbook has no worksheets")?
        .clone();
    let range = workbook
        .worksheet_range(&first)
        .context("worksheet is missing")?
        .with_context(|| format!("failed to read worksheet {first}"))?;

    let mut grid = Vec::new();
    for row in range.rows() {
        grid.push(row.iter().map(cell_from_sheet).collect());
    }
    Ok(grid)
}

fn cell_from_sheet(value: &DataType) -> Cell {
    match value {
        DataType::Empty => Cell::Empty,
        DataType::String(s) => {
            if s.trim().is_empty() {
                Cell::Empty
            } else {
                Cell::Text(s.clone())
            }
        }
        DataType::Float(f) => Cell::Number(*f),
        DataType::Int(i) => Cell::Number(*i as f64),
        DataType::Bool(b) => Cell::Bool(*b),
        DataType::DateTime(serial) => match normalize::datetime_from_serial(*serial) {
            Some(dt) => Cell::DateTime(dt),
            None => Cell::Number(*serial),
        },
        other => Cell::Text(other.to_string()),
    }
}

/// Loads any supported export into a raw grid, dispatching on extension.
pub fn load_grid(path: &Path) -> anyhow::Result<RawGrid> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let grid = if extension == "csv" || extension == "txt" {
        read_csv_grid(path)?
    } else {
        read_sheet_grid(path)?
    };

    if grid.is_empty() {
        bail!("{}: empty or unreadable export", path.display());
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn csv_grid_handles_quotes_and_crlf() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(b"Chat ID,Operator,Note\r\nC-1,\"Rossi, Marta\",\"said \"\"hi\"\"\"\nC-2,,\n")
            .unwrap();

        let grid = read_csv_grid(file.path()).unwrap();
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[1][1], Cell::Text("Rossi, Marta".to_string()));
        assert_eq!(grid[1][2], Cell::Text("said \"hi\"".to_string()));
        assert!(grid[2][1].is_empty());
    }

    #[test]
    fn empty_file_is_rejected() {
        let file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        let err = load_grid(file.path()).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn number_cells_render_without_fraction() {
        assert_eq!(Cell::Number(42.0).as_text(), "42");
        assert_eq!(Cell::Number(4.5).as_text(), "4.5");
    }

    #[test]
    fn sheet_serial_cells_become_timestamps() {
        let cell = cell_from_sheet(&DataType::DateTime(45339.0));
        match cell {
            Cell::DateTime(dt) => assert_eq!(
                dt.date(),
                chrono::NaiveDate::from_ymd_opt(2024, 2, 17).unwrap()
            ),
            other => panic!("expected a timestamp cell, got {other:?}"),
        }
    }
}
