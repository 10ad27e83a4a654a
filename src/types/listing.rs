//! Raw job-listing table as uploaded by the user

use crate::error::{DashboardError, Result};
use std::io::Read;

/// Columns the dashboard reads from every upload.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "title",
    "location",
    "description",
    "telecommuting",
    "has_company_logo",
];

/// Uploaded listings kept as text, in file order.
///
/// The schema is whatever the file carries; only [`REQUIRED_COLUMNS`] are
/// interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Positions of the interpreted columns within a [`RawTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingColumns {
    pub title: usize,
    pub location: usize,
    pub description: usize,
    pub telecommuting: usize,
    pub has_company_logo: usize,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if headers.is_empty() {
            return Err(DashboardError::Schema("table has no columns".to_string()));
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != headers.len()) {
            return Err(DashboardError::Schema(format!(
                "row {} has {} fields, expected {}",
                i,
                row.len(),
                headers.len()
            )));
        }
        Ok(Self { headers, rows })
    }

    /// Parse a CSV upload. Ragged rows and invalid UTF-8 are parse errors.
    pub fn from_reader<R: Read>(reader: R, source_name: &str) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| DashboardError::parse(source_name, e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(DashboardError::Schema(format!(
                "{} has no header row",
                source_name
            )));
        }

        let rows = rdr
            .records()
            .map(|r| {
                r.map(|record| record.iter().map(str::to_string).collect::<Vec<_>>())
                    .map_err(|e| DashboardError::parse(source_name, e))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(headers, rows)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Resolve the interpreted columns, failing on the first one missing.
    pub fn listing_columns(&self) -> Result<ListingColumns> {
        let find = |name: &str| {
            self.column_index(name).ok_or_else(|| {
                DashboardError::Schema(format!("required column '{}' is missing", name))
            })
        };
        Ok(ListingColumns {
            title: find("title")?,
            location: find("location")?,
            description: find("description")?,
            telecommuting: find("telecommuting")?,
            has_company_logo: find("has_company_logo")?,
        })
    }

    /// Keep only the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Result<Self> {
        let rows = indices
            .iter()
            .map(|&i| {
                self.rows.get(i).cloned().ok_or_else(|| {
                    DashboardError::Alignment(format!(
                        "row {} requested from an upload of {} rows",
                        i,
                        self.rows.len()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            headers: self.headers.clone(),
            rows,
        })
    }
}
