use thiserror::Error;

pub type Result<T> = std::result::Result<T, AtlasError>;

#[derive(Error, Debug)]
pub enum AtlasError {
    /// Source file missing, unreadable, or not decodable as CSV.
    #[error("cannot load source `{origin}`: {message}")]
    SourceLoad { origin: String, message: String },

    /// Required columns could not be mapped. Fatal for the load.
    #[error("source is missing required columns: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    /// One row could not be parsed. The loader skips it and keeps going.
    #[error("row {row}: {reason}")]
    MalformedRow { row: u64, reason: String },

    #[error("export failed: {message}")]
    Export { message: String },

    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl AtlasError {
    pub fn source_load(origin: impl Into<String>, message: impl ToString) -> Self {
        Self::SourceLoad {
            origin: origin.into(),
            message: message.to_string(),
        }
    }

    pub fn malformed(row: u64, reason: impl Into<String>) -> Self {
        Self::MalformedRow {
            row,
            reason: reason.into(),
        }
    }

    pub fn export(message: impl ToString) -> Self {
        Self::Export {
            message: message.to_string(),
        }
    }

    pub fn config(message: impl ToString) -> Self {
        Self::Config {
            message: message.to_string(),
        }
    }
}
