//! Job messages carried by the work queue.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::source::SourceRecord;
use crate::template::TemplateVars;

/// Wire format of a queued job. Field names are fixed by existing producers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMessage {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "TYPE")]
    pub kind: String,
    #[serde(rename = "PATTERN")]
    pub pattern: String,
    #[serde(rename = "UTC")]
    pub utc_offset: String,
}

impl JobMessage {
    /// Snapshot a registry record with its templates resolved for this run.
    pub fn from_record(record: &SourceRecord, vars: &TemplateVars) -> Result<Self, CoreError> {
        Ok(Self {
            id: record.id.clone(),
            url: vars.resolve(&record.url_template)?,
            kind: record.kind.clone(),
            pattern: vars.resolve(&record.pattern_template)?,
            utc_offset: record.utc_offset_raw.clone(),
        })
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(body: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(body)?)
    }
}

/// The five job type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Links,
    LinksOverwrite,
    Direct,
    DirectFtp,
    FtpFiles,
}

impl JobKind {
    pub const ALL: [JobKind; 5] = [
        JobKind::Links,
        JobKind::LinksOverwrite,
        JobKind::Direct,
        JobKind::DirectFtp,
        JobKind::FtpFiles,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            JobKind::Links => "LINKS",
            JobKind::LinksOverwrite => "LINKS_OVERWRITE",
            JobKind::Direct => "DIRECT",
            JobKind::DirectFtp => "DIRECT_FTP",
            JobKind::FtpFiles => "FTP_FILES",
        }
    }

    /// Key prefix (under the landing root) for files stored by this kind.
    pub fn key_prefix(self) -> &'static str {
        match self {
            JobKind::Links => "LINK",
            JobKind::LinksOverwrite => "LINKS_OVER",
            JobKind::Direct => "LINKS_DIRECT",
            JobKind::DirectFtp => "FTP_FILE",
            JobKind::FtpFiles => "FTP_FILES",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for JobKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|k| k.tag() == s)
            .ok_or_else(|| CoreError::UnknownJobType(s.to_string()))
    }
}

/// A decoded job: one variant per fetch strategy, each with only the
/// fields it uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Scrape anchors from an HTML page and fetch every linked file.
    LinkScrape { id: String, url: String, overwrite: bool },
    /// Fetch one file over HTTP; `file_name` comes from the pattern field.
    Direct { id: String, url: String, file_name: String },
    /// Fetch one file over FTP; `file_name` comes from the pattern field.
    DirectFtp { id: String, url: String, file_name: String },
    /// List an FTP directory and fetch every entry matching `pattern`.
    FtpListing { id: String, url: String, pattern: String },
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self {
            Job::LinkScrape { overwrite: false, .. } => JobKind::Links,
            Job::LinkScrape { overwrite: true, .. } => JobKind::LinksOverwrite,
            Job::Direct { .. } => JobKind::Direct,
            Job::DirectFtp { .. } => JobKind::DirectFtp,
            Job::FtpListing { .. } => JobKind::FtpFiles,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Job::LinkScrape { id, .. }
            | Job::Direct { id, .. }
            | Job::DirectFtp { id, .. }
            | Job::FtpListing { id, .. } => id,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Job::LinkScrape { url, .. }
            | Job::Direct { url, .. }
            | Job::DirectFtp { url, .. }
            | Job::FtpListing { url, .. } => url,
        }
    }
}

impl TryFrom<JobMessage> for Job {
    type Error = CoreError;

    fn try_from(msg: JobMessage) -> Result<Self, Self::Error> {
        let JobMessage { id, url, kind, pattern, .. } = msg;
        Ok(match kind.parse::<JobKind>()? {
            JobKind::Links => Job::LinkScrape { id, url, overwrite: false },
            JobKind::LinksOverwrite => Job::LinkScrape { id, url, overwrite: true },
            JobKind::Direct => Job::Direct { id, url, file_name: pattern },
            JobKind::DirectFtp => Job::DirectFtp { id, url, file_name: pattern },
            JobKind::FtpFiles => Job::FtpListing { id, url, pattern },
        })
    }
}

/// A decoded job paired with the queue's acknowledgement token.
#[derive(Debug, Clone)]
pub struct FetchJob {
    pub job: Job,
    pub receipt_handle: String,
}
