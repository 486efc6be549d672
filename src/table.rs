use ordered_float::OrderedFloat;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::ops::Range;
use thiserror::Error;

/// A sample addressed by field name.
///
/// Categorical fields are expected to be numerically encoded already
/// (e.g. `0.0` / `1.0` for a binary indicator).
pub trait Record {
    fn field(&self, name: &str) -> Option<f64>;
}

impl<R: Record + ?Sized> Record for &R {
    fn field(&self, name: &str) -> Option<f64> {
        (**self).field(name)
    }
}

impl<H: BuildHasher> Record for HashMap<String, f64, H> {
    fn field(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl Record for BTreeMap<String, f64> {
    fn field(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl<S: AsRef<str>> Record for [(S, f64)] {
    fn field(&self, name: &str) -> Option<f64> {
        self.iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|&(_, v)| v)
    }
}

impl<S: AsRef<str>, const N: usize> Record for [(S, f64); N] {
    fn field(&self, name: &str) -> Option<f64> {
        self[..].field(name)
    }
}

impl<S: AsRef<str>> Record for Vec<(S, f64)> {
    fn field(&self, name: &str) -> Option<f64> {
        self[..].field(name)
    }
}

/// Column-major sample matrix: named feature columns plus one target column.
///
/// Field names are resolved to column indices once, when the table is built.
#[derive(Debug, Clone)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    target_name: String,
    target: Vec<f64>,
}

impl Table {
    pub fn new(
        names: Vec<String>,
        columns: Vec<Vec<f64>>,
        target_name: impl Into<String>,
        target: Vec<f64>,
    ) -> Result<Self, TableError> {
        if target.is_empty() {
            return Err(TableError::EmptyTable);
        }
        if names.len() != columns.len() || columns.iter().any(|c| c.len() != target.len()) {
            return Err(TableError::RowSizeMismatch);
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(TableError::DuplicateColumn { name: name.clone() });
            }
        }

        if target.iter().any(|t| !t.is_finite()) {
            return Err(TableError::NonFiniteTarget);
        }
        for (name, column) in names.iter().zip(columns.iter()) {
            if let Some(row) = column.iter().position(|x| !x.is_finite()) {
                return Err(TableError::NonFiniteFeature {
                    row,
                    name: name.clone(),
                });
            }
        }

        Ok(Self {
            names,
            columns,
            target_name: target_name.into(),
            target,
        })
    }

    /// Builds a table by looking up `features` and `target` in every record.
    pub fn from_records<I, R, S>(
        records: I,
        features: &[S],
        target: &str,
    ) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = R>,
        R: Record,
        S: AsRef<str>,
    {
        let names = features
            .iter()
            .map(|f| f.as_ref().to_owned())
            .collect::<Vec<_>>();
        let mut columns = vec![Vec::new(); names.len()];
        let mut target_column = Vec::new();
        for (row, record) in records.into_iter().enumerate() {
            for (name, column) in names.iter().zip(columns.iter_mut()) {
                let x = record.field(name).ok_or_else(|| TableError::MissingField {
                    row,
                    name: name.clone(),
                })?;
                column.push(x);
            }
            let y = record.field(target).ok_or_else(|| TableError::MissingField {
                row,
                name: target.to_owned(),
            })?;
            target_column.push(y);
        }
        Self::new(names, columns, target, target_column)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, column_index: usize) -> &[f64] {
        &self.columns[column_index]
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn target(&self) -> &[f64] {
        &self.target
    }

    pub fn features_len(&self) -> usize {
        self.columns.len()
    }

    pub fn rows_len(&self) -> usize {
        self.target.len()
    }

    /// Feature values of one row, in column order.
    pub fn row(&self, row: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[row]).collect()
    }
}

/// An ordered subset of table rows.
///
/// One index buffer is shared by a whole tree build; each node works on a
/// contiguous range of it.
#[derive(Debug, Clone)]
pub struct Subset<'a> {
    table: &'a Table,
    row_index: Vec<usize>,
    row_range: Range<usize>,
}

impl<'a> Subset<'a> {
    pub fn new(table: &'a Table) -> Self {
        let rows_len = table.rows_len();
        Self {
            table,
            row_index: (0..rows_len).collect(),
            row_range: Range {
                start: 0,
                end: rows_len,
            },
        }
    }

    pub fn table(&self) -> &'a Table {
        self.table
    }

    pub fn rows(&self) -> impl '_ + Iterator<Item = usize> + Clone {
        self.row_index[self.row_range.start..self.row_range.end]
            .iter()
            .copied()
    }

    pub fn rows_len(&self) -> usize {
        self.row_range.end - self.row_range.start
    }

    pub fn target(&self) -> impl '_ + Iterator<Item = f64> + Clone {
        let target = self.table.target();
        self.rows().map(move |i| target[i])
    }

    /// Row indices sorted by a column; equal values keep their subset order.
    pub fn sorted_by_column(&self, column_index: usize) -> Vec<usize> {
        let column = self.table.column(column_index);
        let mut rows = self.rows().collect::<Vec<_>>();
        rows.sort_by_key(|&i| OrderedFloat(column[i]));
        rows
    }

    /// Moves rows with `value <= threshold` in front of the others, keeping
    /// the relative order inside both groups. Returns the size of the first group.
    pub fn partition(&mut self, column_index: usize, threshold: f64) -> usize {
        let column = self.table.column(column_index);
        let (left, right): (Vec<usize>, Vec<usize>) =
            self.rows().partition(|&i| column[i] <= threshold);
        let left_len = left.len();
        for (slot, i) in self.row_index[self.row_range.start..self.row_range.end]
            .iter_mut()
            .zip(left.into_iter().chain(right))
        {
            *slot = i;
        }
        left_len
    }

    pub fn with_split<F, T>(&mut self, row: usize, mut f: F) -> (T, T)
    where
        F: FnMut(&mut Self) -> T,
    {
        let row = row + self.row_range.start;
        let original = self.row_range.clone();

        self.row_range.end = row;
        let left = f(self);
        self.row_range.end = original.end;

        self.row_range.start = row;
        let right = f(self);
        self.row_range.start = original.start;

        (left, right)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TableError {
    #[error("table must have at least one row")]
    EmptyTable,

    #[error("some of columns have a different row count from others")]
    RowSizeMismatch,

    #[error("column {name:?} appears more than once")]
    DuplicateColumn { name: String },

    #[error("record {row} has no field {name:?}")]
    MissingField { row: usize, name: String },

    #[error("target column contains non finite numbers")]
    NonFiniteTarget,

    #[error("feature {name:?} has a non finite value at row {row}")]
    NonFiniteFeature { row: usize, name: String },
}
