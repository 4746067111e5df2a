//! Rectangular string table: one header row followed by data rows.
//!
//! The header fixes the width. Data rows that come back shorter are padded
//! with empty cells and longer rows are cut to the header width. Cells longer
//! than a spreadsheet cell can hold are cut to [`MAX_CELL_CHARS`]. Every such
//! change is counted in [`RowAdjustments`] so callers can report it.
//!
//! Deserialized tables go through the same constructor, so a `Table` is
//! rectangular however it was made.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Most characters an xlsx cell accepts.
pub const MAX_CELL_CHARS: usize = 32_767;

/// How many rows and cells had to be reshaped to fit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowAdjustments {
    /// Rows padded with trailing empty cells.
    pub padded: usize,
    /// Rows whose extra trailing cells were dropped.
    pub truncated: usize,
    /// Cells cut to [`MAX_CELL_CHARS`].
    #[serde(default)]
    pub clipped_cells: usize,
}

impl RowAdjustments {
    pub fn is_empty(&self) -> bool {
        self.padded == 0 && self.truncated == 0 && self.clipped_cells == 0
    }
}

/// Header row plus data rows, every row exactly as wide as the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TableRepr")]
pub struct Table {
    rows: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "RowAdjustments::is_empty")]
    adjustments: RowAdjustments,
}

/// Unchecked wire shape of a [`Table`].
#[derive(Deserialize)]
struct TableRepr {
    rows: Vec<Vec<String>>,
    #[serde(default)]
    adjustments: RowAdjustments,
}

impl TryFrom<TableRepr> for Table {
    type Error = String;

    fn try_from(repr: TableRepr) -> Result<Self, Self::Error> {
        let mut rows = repr.rows.into_iter();
        let header = rows.next().ok_or("table has no header row")?;
        let mut table = Table::new(header, rows.collect());
        table.adjustments.padded += repr.adjustments.padded;
        table.adjustments.truncated += repr.adjustments.truncated;
        table.adjustments.clipped_cells += repr.adjustments.clipped_cells;
        Ok(table)
    }
}

impl Table {
    /// Build a table, reshaping ragged data rows to the header width and
    /// clipping oversized cells.
    pub fn new(header: Vec<String>, data: Vec<Vec<String>>) -> Self {
        let width = header.len();
        let mut adjustments = RowAdjustments::default();
        let mut rows = Vec::with_capacity(data.len() + 1);
        rows.push(header);

        for mut row in data {
            if row.len() < width {
                adjustments.padded += 1;
                row.resize(width, String::new());
            } else if row.len() > width {
                adjustments.truncated += 1;
                row.truncate(width);
            }
            rows.push(row);
        }

        for cell in rows.iter_mut().flatten() {
            if clip_cell(cell) {
                adjustments.clipped_cells += 1;
            }
        }

        if !adjustments.is_empty() {
            warn!(
                "Reshaped table to width {}: {} rows padded, {} truncated, {} cells clipped",
                width, adjustments.padded, adjustments.truncated, adjustments.clipped_cells
            );
        }

        Self { rows, adjustments }
    }

    pub fn header(&self) -> &[String] {
        &self.rows[0]
    }

    pub fn data_rows(&self) -> &[Vec<String>] {
        &self.rows[1..]
    }

    /// Every row, header first.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of columns (the header width).
    pub fn width(&self) -> usize {
        self.rows[0].len()
    }

    /// Number of data rows, excluding the header.
    pub fn data_row_count(&self) -> usize {
        self.rows.len() - 1
    }

    pub fn adjustments(&self) -> RowAdjustments {
        self.adjustments
    }
}

/// Cut `cell` to [`MAX_CELL_CHARS`] characters; true if it was cut.
fn clip_cell(cell: &mut String) -> bool {
    if cell.len() <= MAX_CELL_CHARS {
        return false;
    }
    match cell.char_indices().nth(MAX_CELL_CHARS) {
        Some((at, _)) => {
            cell.truncate(at);
            true
        }
        None => false,
    }
}
