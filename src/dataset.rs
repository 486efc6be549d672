//! Headered CSV datasets.
//!
//! Every column is loaded as numbers. A column whose non-empty cells do not
//! all parse as `f64` is categorical: its distinct values are encoded as
//! `0, 1, 2, ...` in sorted order. Empty cells are missing (`NaN`).

use crate::table::{Record, Table, TableError};
use serde::Serialize;
use std::collections::BTreeSet;
use std::io;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    kind: ColumnKind,
    values: Vec<f64>,
    categories: Vec<String>,
}

impl Column {
    fn parse(name: String, cells: Vec<String>) -> Self {
        let numeric = cells
            .iter()
            .filter(|c| !c.is_empty())
            .all(|c| c.parse::<f64>().is_ok());
        if numeric {
            let values = cells
                .iter()
                .map(|c| c.parse::<f64>().unwrap_or(f64::NAN))
                .collect();
            return Self {
                name,
                kind: ColumnKind::Numeric,
                values,
                categories: Vec::new(),
            };
        }

        let categories = cells
            .iter()
            .filter(|c| !c.is_empty())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        let values = cells
            .iter()
            .map(|c| {
                categories
                    .binary_search(c)
                    .map_or(f64::NAN, |code| code as f64)
            })
            .collect();
        Self {
            name,
            kind: ColumnKind::Categorical,
            values,
            categories,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    /// Cell values; missing cells are `NaN`.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Category labels, indexed by their code. Empty for numeric columns.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn code_of(&self, category: &str) -> Option<f64> {
        self.categories
            .iter()
            .position(|c| c == category)
            .map(|code| code as f64)
    }

    fn empty_cells(&self, rows: &RangeInclusive<usize>) -> usize {
        self.values[rows.clone()].iter().filter(|v| v.is_nan()).count()
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<Column>,
    rows_len: usize,
}

impl Dataset {
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dataset = Self::from_reader(file)?;
        info!(
            rows = dataset.rows_len(),
            columns = dataset.columns_len(),
            "dataset loaded"
        );
        Ok(dataset)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, DatasetError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let names = rdr
            .headers()?
            .iter()
            .map(str::to_owned)
            .collect::<Vec<_>>();
        debug!(columns = names.len(), "read CSV header");

        let mut cells = vec![Vec::new(); names.len()];
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            if record.len() != names.len() {
                return Err(DatasetError::RowLength {
                    row,
                    expected: names.len(),
                    got: record.len(),
                });
            }
            for (column, cell) in cells.iter_mut().zip(record.iter()) {
                column.push(cell.to_owned());
            }
        }

        let rows_len = cells.first().map_or(0, Vec::len);
        if names.is_empty() || rows_len == 0 {
            return Err(DatasetError::EmptyDataset);
        }

        let columns = names
            .into_iter()
            .zip(cells)
            .map(|(name, cells)| Column::parse(name, cells))
            .collect();
        Ok(Self { columns, rows_len })
    }

    pub fn rows_len(&self) -> usize {
        self.rows_len
    }

    pub fn columns_len(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Result<&Column, DatasetError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| DatasetError::UnknownColumn {
                name: name.to_owned(),
            })
    }

    pub fn records(&self) -> impl '_ + Iterator<Item = DatasetRecord<'_>> {
        (0..self.rows_len).map(move |row| DatasetRecord { dataset: self, row })
    }

    /// Builds a [`Table`]; a missing cell in any requested column is an error.
    pub fn table<S: AsRef<str>>(&self, features: &[S], target: &str) -> Result<Table, TableError> {
        Table::from_records(self.records(), features, target)
    }

    /// Summarizes the cells inside `window` (the whole dataset when `None`).
    pub fn describe(&self, window: Option<&Window>) -> Result<Description, DatasetError> {
        let window = match window {
            Some(w) => w.to_zero_based(self.rows_len, self.columns.len())?,
            None => Window::new(1..=self.rows_len, 1..=self.columns.len())
                .to_zero_based(self.rows_len, self.columns.len())?,
        };
        let rows = window.rows.end() - window.rows.start() + 1;

        let columns = self.columns[window.columns.clone()]
            .iter()
            .map(|c| {
                let empty_cells = c.empty_cells(&window.rows);
                ColumnSummary {
                    name: c.name.clone(),
                    kind: c.kind,
                    empty_cells,
                    filled_cells: rows - empty_cells,
                }
            })
            .collect::<Vec<_>>();

        let empty_cells = columns.iter().map(|c| c.empty_cells).sum();
        let filled_cells = columns.iter().map(|c| c.filled_cells).sum();
        Ok(Description {
            total_rows: rows,
            total_cols: columns.len(),
            empty_cells,
            filled_cells,
            columns,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DatasetRecord<'a> {
    dataset: &'a Dataset,
    row: usize,
}

impl Record for DatasetRecord<'_> {
    fn field(&self, name: &str) -> Option<f64> {
        let value = self.dataset.column(name).ok()?.values[self.row];
        if value.is_nan() {
            None
        } else {
            Some(value)
        }
    }
}

/// A block of cells given by 1-based inclusive row and column ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    rows: RangeInclusive<usize>,
    columns: RangeInclusive<usize>,
}

impl Window {
    pub fn new(rows: RangeInclusive<usize>, columns: RangeInclusive<usize>) -> Self {
        Self { rows, columns }
    }

    fn to_zero_based(&self, rows_len: usize, columns_len: usize) -> Result<Self, DatasetError> {
        let valid = |r: &RangeInclusive<usize>, len: usize| {
            1 <= *r.start() && r.start() <= r.end() && *r.end() <= len
        };
        if !valid(&self.rows, rows_len) || !valid(&self.columns, columns_len) {
            return Err(DatasetError::InvalidWindow {
                rows: rows_len,
                columns: columns_len,
            });
        }
        Ok(Self {
            rows: self.rows.start() - 1..=self.rows.end() - 1,
            columns: self.columns.start() - 1..=self.columns.end() - 1,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub kind: ColumnKind,
    pub empty_cells: usize,
    pub filled_cells: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Description {
    pub total_rows: usize,
    pub total_cols: usize,
    pub empty_cells: usize,
    pub filled_cells: usize,
    pub columns: Vec<ColumnSummary>,
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to open {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed CSV")]
    Csv(#[from] csv::Error),

    #[error("dataset must have a header and at least one data row")]
    EmptyDataset,

    #[error("row {row} has {got} cells, expected {expected}")]
    RowLength {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("unknown column {name:?}")]
    UnknownColumn { name: String },

    #[error("window is outside the dataset (rows 1..={rows}, columns 1..={columns})")]
    InvalidWindow { rows: usize, columns: usize },
}
