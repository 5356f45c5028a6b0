use crate::error::{ProcessingError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One `(time, zone)` row of zonal means, values ordered like the table's columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonalMeanRow {
    pub time: NaiveDate,
    pub zone: i64,
    pub values: Vec<f64>,
}

/// Zonal means indexed by `(time, zone)` with one column per variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZonalMeanTable {
    columns: Vec<String>,
    rows: Vec<ZonalMeanRow>,
}

impl ZonalMeanTable {
    /// Build a table; rows are sorted by `(time, zone)`.
    pub fn new(columns: Vec<String>, mut rows: Vec<ZonalMeanRow>) -> Result<Self> {
        if let Some(row) = rows.iter().find(|r| r.values.len() != columns.len()) {
            return Err(ProcessingError::InvalidFormat(format!(
                "Row ({}, {}) has {} values for {} columns",
                row.time,
                row.zone,
                row.values.len(),
                columns.len()
            )));
        }
        rows.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.zone.cmp(&b.zone)));
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[ZonalMeanRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn row(&self, time: NaiveDate, zone: i64) -> Option<&ZonalMeanRow> {
        self.rows
            .binary_search_by(|r| r.time.cmp(&time).then_with(|| r.zone.cmp(&zone)))
            .ok()
            .map(|i| &self.rows[i])
    }

    pub fn value(&self, time: NaiveDate, zone: i64, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.row(time, zone).map(|r| r.values[idx])
    }

    pub fn zones(&self) -> BTreeSet<i64> {
        self.rows.iter().map(|r| r.zone).collect()
    }

    pub fn times(&self) -> BTreeSet<NaiveDate> {
        self.rows.iter().map(|r| r.time).collect()
    }

    /// Apply `f` to every value of `column`, e.g. a unit conversion.
    pub fn map_column(mut self, column: &str, f: impl Fn(f64) -> f64) -> Result<Self> {
        let idx = self.column_index(column).ok_or_else(|| {
            ProcessingError::MissingData(format!("Table has no column named '{}'", column))
        })?;
        for row in &mut self.rows {
            row.values[idx] = f(row.values[idx]);
        }
        Ok(self)
    }
}
