//! The aligned monthly table every stage reads.
//!
//! Rows are indexed by date (ascending), columns one per indicator. Storage
//! is column-major; missing cells are NaN.

use crate::data::provider::RawSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Row index, sorted ascending.
    pub dates: Vec<NaiveDate>,
    /// Column names in insertion order.
    pub columns: Vec<String>,
    /// One vector per column, each `dates.len()` long.
    pub values: Vec<Vec<f64>>,
}

impl Dataset {
    pub fn empty() -> Self {
        Self {
            dates: Vec::new(),
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Outer-join raw series on date.
    ///
    /// Column order follows the input order. A later series with a name that
    /// is already present replaces the earlier one. Duplicate dates within a
    /// series keep the last value.
    pub fn from_series(series: &[RawSeries]) -> Self {
        let dates: Vec<NaiveDate> = series
            .iter()
            .flat_map(|s| s.observations.iter().map(|o| o.date))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let row_of: HashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let mut dataset = Self {
            dates,
            columns: Vec::new(),
            values: Vec::new(),
        };

        for s in series {
            let mut column = vec![f64::NAN; dataset.dates.len()];
            for obs in &s.observations {
                if let Some(&row) = row_of.get(&obs.date) {
                    column[row] = obs.value;
                }
            }
            dataset.insert_column(&s.name, column);
        }

        dataset
    }

    /// Build from already-aligned parts.
    ///
    /// Returns `None` when a column's length differs from the date axis or
    /// the names and value vectors do not pair up.
    pub fn from_columns(
        dates: Vec<NaiveDate>,
        columns: Vec<String>,
        values: Vec<Vec<f64>>,
    ) -> Option<Self> {
        if columns.len() != values.len() || values.iter().any(|v| v.len() != dates.len()) {
            return None;
        }
        Some(Self {
            dates,
            columns,
            values,
        })
    }

    fn insert_column(&mut self, name: &str, column: Vec<f64>) {
        match self.column_index(name) {
            Some(i) => self.values[i] = column,
            None => {
                self.columns.push(name.to_string());
                self.values.push(column);
            }
        }
    }

    pub fn n_rows(&self) -> usize {
        self.dates.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// True when there are no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.columns.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.column_index(name).map(|i| self.values[i].as_slice())
    }

    /// Iterate `(name, values)` pairs in column order.
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Number of NaN cells across the table.
    pub fn missing_cells(&self) -> usize {
        self.values
            .iter()
            .map(|col| col.iter().filter(|v| v.is_nan()).count())
            .sum()
    }

    /// Deterministic BLAKE3 hash over column names, dates and cell values.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for name in &self.columns {
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
        }
        for date in &self.dates {
            hasher.update(date.to_string().as_bytes());
        }
        for column in &self.values {
            for v in column {
                hasher.update(&v.to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}
