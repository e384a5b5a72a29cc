use crate::error::Error;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Passed,
    Failed,
    Pending,
    Skipped,
}

impl FromStr for Status {
    type Err = Error;

    /// Map a Cypress test state onto a status.
    ///
    /// Unknown states are rejected, never defaulted.
    fn from_str(state: &str) -> Result<Status, Error> {
        match state {
            "passed" => Ok(Status::Passed),
            "failed" => Ok(Status::Failed),
            "pending" => Ok(Status::Pending),
            "skipped" => Ok(Status::Skipped),
            other => Err(Error::UnknownStatus(other.into())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// One test outcome, independent of the Cypress version that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestRecord {
    pub issue_key: Option<String>,
    pub title: String,
    pub status: Status,
    pub started_at: String,
    pub finished_at: String,
    pub duration_ms: u64,
    pub attachments: Vec<Attachment>,
}
