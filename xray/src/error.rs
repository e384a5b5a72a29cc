use crate::client::Operation;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("run result does not match a supported schema: {0}")]
    SchemaMismatch(String),
    #[error("unknown test status {0:?}")]
    UnknownStatus(String),
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error(
        "no viable Xray configuration was found; set XRAY_CLIENT_ID and XRAY_CLIENT_SECRET, \
         XRAY_API_TOKEN and JIRA_API_URL, or XRAY_USERNAME, XRAY_PASSWORD and JIRA_API_URL"
    )]
    NoViableCredentials,
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("{operation} failed: {message}{}", describe_artifact(.artifact))]
    Transport {
        operation: Operation,
        message: String,
        artifact: Option<PathBuf>,
    },
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

fn describe_artifact(artifact: &Option<PathBuf>) -> String {
    match artifact {
        Some(path) => format!(
            " (complete error logs have been written to {})",
            path.display()
        ),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
