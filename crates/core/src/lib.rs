pub mod config;
pub mod error;
pub mod job;
pub mod source;
pub mod template;

pub use config::Config;
pub use error::*;
pub use job::{FetchJob, Job, JobKind, JobMessage};
pub use source::{SourceRecord, SourceStatus};
pub use template::TemplateVars;
