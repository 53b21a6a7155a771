use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("ESPA returned {status} for {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("Response from {endpoint} is missing the '{field}' field")]
    MissingField { endpoint: String, field: String },
    #[error("Unexpected response shape from {endpoint}: {detail}")]
    UnexpectedShape { endpoint: String, detail: String },
    #[error("Item {0} is complete but has no download url")]
    MissingDownloadUrl(String),
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid date range '{0}', expected YYYYMMDD_YYYYMMDD")]
    DateRangeFormat(String),
    #[error("Date range '{0}' ends before it starts")]
    DateRangeOrder(String),
    #[error("At least one {0} must be configured")]
    Empty(&'static str),
}

/// Reasons a single archive is left in place by the unpacker.
#[derive(Error, Debug)]
pub enum UnpackError {
    #[error("Unable to read archive: {0}")]
    Read(#[source] std::io::Error),
    #[error("No metadata xml member found")]
    NoMetadata,
    #[error("Metadata member name '{0}' is too short to hold a tile key")]
    BadMetadataName(String),
    #[error("Scene directory {0} already exists")]
    SceneExists(String),
    #[error("Unable to create scene directory: {0}")]
    CreateDir(#[source] std::io::Error),
    #[error("Extraction failed: {0}")]
    Extract(#[source] std::io::Error),
    #[error("Extraction did not produce {0}")]
    Unverified(String),
}
