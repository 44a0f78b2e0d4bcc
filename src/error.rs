use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum AutotrustError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Record parse error: {0}")]
    RecordParse(String),

    #[error("Comment parse error: {0}")]
    CommentParse(String),

    #[error("Invalid domain name: {0}")]
    InvalidName(String),

    #[error("File {} has mismatching data inside: expected {expected}, found {found}", .file.display())]
    ZoneMismatch {
        file: PathBuf,
        expected: String,
        found: String,
    },

    #[error("No trust anchors could be read from {}", .0.display())]
    EmptyAnchorFile(PathBuf),

    #[error("Allocation failure: {0}")]
    Allocation(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<std::io::Error> for AutotrustError {
    fn from(err: std::io::Error) -> Self {
        AutotrustError::Io(err.to_string())
    }
}

impl From<std::collections::TryReserveError> for AutotrustError {
    fn from(err: std::collections::TryReserveError) -> Self {
        AutotrustError::Allocation(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Invalid interval bounds: {0}")]
    InvalidInterval(String),

    #[error("Invalid worker count: {0}")]
    InvalidWorkers(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Configuration file error: {0}")]
    FileError(String),
}

pub type Result<T> = std::result::Result<T, AutotrustError>;
