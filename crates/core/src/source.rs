//! Source registry records.
//!
//! The registry is a CSV whose column positions are fixed:
//!
//! ```text
//! 0 id | 1 url_template | 2 interval | 3 (unused) | 4 status | 5..6 (free) | 7 type | 8 pattern_template | 9 utc_offset_hours
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const COL_ID: usize = 0;
pub const COL_URL: usize = 1;
pub const COL_INTERVAL: usize = 2;
pub const COL_STATUS: usize = 4;
pub const COL_TYPE: usize = 7;
pub const COL_PATTERN: usize = 8;
pub const COL_UTC_OFFSET: usize = 9;

/// Minimum number of columns a row needs to describe a source.
pub const MIN_COLUMNS: usize = COL_UTC_OFFSET + 1;

/// Activation status stored in column 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceStatus {
    Inactive,
    Active,
    /// Set by the error path; an operator has to fix the source.
    NeedsFix,
}

impl SourceStatus {
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker.trim() {
            "0" => Some(Self::Inactive),
            "1" => Some(Self::Active),
            "2" => Some(Self::NeedsFix),
            _ => None,
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            Self::Inactive => "0",
            Self::Active => "1",
            Self::NeedsFix => "2",
        }
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// Typed view of one registry row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,
    pub url_template: String,
    pub interval: String,
    pub status: SourceStatus,
    /// Raw job type tag; validated by the worker, not here.
    pub kind: String,
    pub pattern_template: String,
    pub utc_offset_hours: i64,
    /// Offset exactly as written in the registry, forwarded in job messages.
    pub utc_offset_raw: String,
}

impl SourceRecord {
    /// Parse a registry row. Header rows and short rows are rejected.
    pub fn from_row<S: AsRef<str>>(row: &[S]) -> Result<Self, CoreError> {
        if row.len() < MIN_COLUMNS {
            return Err(CoreError::MalformedRow(format!(
                "expected at least {MIN_COLUMNS} columns, got {}",
                row.len()
            )));
        }
        let col = |i: usize| row[i].as_ref();

        let status = SourceStatus::from_marker(col(COL_STATUS)).ok_or_else(|| {
            CoreError::MalformedRow(format!("invalid status '{}'", col(COL_STATUS)))
        })?;
        let utc_offset_raw = col(COL_UTC_OFFSET).to_string();
        let utc_offset_hours = utc_offset_raw.trim().parse::<i64>().map_err(|_| {
            CoreError::MalformedRow(format!("invalid utc offset '{utc_offset_raw}'"))
        })?;

        Ok(Self {
            id: col(COL_ID).to_string(),
            url_template: col(COL_URL).to_string(),
            interval: col(COL_INTERVAL).to_string(),
            status,
            kind: col(COL_TYPE).to_string(),
            pattern_template: col(COL_PATTERN).to_string(),
            utc_offset_hours,
            utc_offset_raw,
        })
    }

    /// Only active records of the running interval are harvested.
    pub fn is_eligible(&self, interval: &str) -> bool {
        self.status == SourceStatus::Active && self.interval == interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, interval: &str) -> Vec<String> {
        vec![
            "7", "http://x/{year}", interval, "", status, "", "", "LINKS", "*.csv", "10",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    #[test]
    fn parses_fixed_columns() {
        let rec = SourceRecord::from_row(&row("1", "daily")).unwrap();
        assert_eq!(rec.id, "7");
        assert_eq!(rec.url_template, "http://x/{year}");
        assert_eq!(rec.kind, "LINKS");
        assert_eq!(rec.pattern_template, "*.csv");
        assert_eq!(rec.utc_offset_hours, 10);
        assert_eq!(rec.utc_offset_raw, "10");
        assert_eq!(rec.status, SourceStatus::Active);
    }

    #[test]
    fn header_row_is_rejected() {
        let header: Vec<&str> = vec![
            "ID", "URL", "Interval", "Note", "Active", "a", "b", "Type", "Pattern", "UTC",
        ];
        assert!(SourceRecord::from_row(&header).is_err());
    }

    #[test]
    fn short_row_is_rejected() {
        assert!(SourceRecord::from_row(&["1", "http://x"]).is_err());
    }

    #[test]
    fn eligibility_requires_active_and_interval() {
        assert!(SourceRecord::from_row(&row("1", "daily")).unwrap().is_eligible("daily"));
        assert!(!SourceRecord::from_row(&row("1", "hourly")).unwrap().is_eligible("daily"));
        assert!(!SourceRecord::from_row(&row("0", "daily")).unwrap().is_eligible("daily"));
        assert!(!SourceRecord::from_row(&row("2", "daily")).unwrap().is_eligible("daily"));
    }

    #[test]
    fn negative_offset_parses() {
        let mut r = row("1", "daily");
        r[COL_UTC_OFFSET] = "-5".into();
        assert_eq!(SourceRecord::from_row(&r).unwrap().utc_offset_hours, -5);
    }

    #[test]
    fn status_marker_roundtrip() {
        for s in [SourceStatus::Inactive, SourceStatus::Active, SourceStatus::NeedsFix] {
            assert_eq!(SourceStatus::from_marker(s.marker()), Some(s));
        }
        assert_eq!(SourceStatus::from_marker("Active"), None);
    }
}
