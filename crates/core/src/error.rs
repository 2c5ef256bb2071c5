use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Unknown job type: {0}")]
    UnknownJobType(String),

    #[error("Malformed source row: {0}")]
    MalformedRow(String),

    #[error("Template error in '{template}': {reason}")]
    Template { template: String, reason: String },

    #[error("{0}")]
    Other(String),
}
