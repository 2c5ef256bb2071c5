//! Time placeholder substitution for registry URL and pattern templates.
//!
//! Templates use `{name}` placeholders with `{{` / `}}` as literal braces.
//! Supported names: `year`, `month`, `lastmonth`, `day`, `hour`, `minute`.

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, Timelike, Utc};

use crate::error::CoreError;

/// Date/time components for one run, computed once and applied to every
/// template field of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVars {
    pub year: String,
    pub month: String,
    pub lastmonth: String,
    pub day: String,
    pub hour: String,
    pub minute: String,
}

/// Previous-month token: a `0` glued onto `month - 1`.
///
/// Known defect kept for compatibility with existing registry templates:
/// January yields `"00"`, November and December yield three characters
/// (`"010"`, `"011"`).
pub fn last_month_token(month: u32) -> String {
    format!("0{}", month as i64 - 1)
}

impl TemplateVars {
    /// Components of `run_time` as zero-padded strings.
    pub fn at(run_time: NaiveDateTime) -> Self {
        Self {
            year: format!("{:04}", run_time.year()),
            month: format!("{:02}", run_time.month()),
            lastmonth: last_month_token(run_time.month()),
            day: format!("{:02}", run_time.day()),
            hour: format!("{:02}", run_time.hour()),
            minute: format!("{:02}", run_time.minute()),
        }
    }

    /// Components of `now` shifted by a record's UTC offset.
    pub fn for_offset(now: DateTime<Utc>, utc_offset_hours: i64) -> Self {
        Self::at((now + Duration::hours(utc_offset_hours)).naive_utc())
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "year" => Some(&self.year),
            "month" => Some(&self.month),
            "lastmonth" => Some(&self.lastmonth),
            "day" => Some(&self.day),
            "hour" => Some(&self.hour),
            "minute" => Some(&self.minute),
            _ => None,
        }
    }

    /// Substitute every placeholder in `template`.
    ///
    /// Unknown names and unbalanced braces are errors, never passed through.
    pub fn resolve(&self, template: &str) -> Result<String, CoreError> {
        let err = |reason: String| CoreError::Template {
            template: template.to_string(),
            reason,
        };

        let mut out = String::with_capacity(template.len() + 16);
        let mut chars = template.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(err("unclosed placeholder".into()));
                    }
                    let value = self
                        .lookup(&name)
                        .ok_or_else(|| err(format!("unknown placeholder '{name}'")))?;
                    out.push_str(value);
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '}' => return Err(err("single '}' encountered".into())),
                other => out.push(other),
            }
        }

        Ok(out)
    }
}
