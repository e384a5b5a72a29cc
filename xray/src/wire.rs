//! Xray JSON formats, as sent to and received from the import endpoints.

use crate::client::Dialect;
use crate::config::StatusOverrides;
use crate::report::ExecutionReport;
use crate::result::{Attachment, Status, TestRecord};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XrayExecution<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_execution_key: Option<&'a str>,
    pub info: XrayInfo<'a>,
    pub tests: Vec<XrayTest<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XrayInfo<'a> {
    pub project: &'a str,
    pub start_date: &'a str,
    pub finish_date: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_plan_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_environments: Option<&'a [String]>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XrayTest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_key: Option<&'a str>,
    /// Describes the test to create when no issue key is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_info: Option<XrayTestInfo<'a>>,
    pub start: &'a str,
    pub finish: &'a str,
    pub status: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<XrayEvidence<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XrayTestInfo<'a> {
    pub project_key: &'a str,
    pub summary: &'a str,
    #[serde(rename = "type")]
    pub test_type: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XrayEvidence<'a> {
    pub data: String,
    pub filename: &'a str,
    pub content_type: &'a str,
}

/// Status names as understood by an Xray instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusLabels {
    pub passed: String,
    pub failed: String,
    pub pending: String,
    pub skipped: String,
}

impl StatusLabels {
    pub fn new(dialect: Dialect, overrides: &StatusOverrides) -> StatusLabels {
        let (passed, failed, pending, skipped) = match dialect {
            Dialect::Cloud => ("PASSED", "FAILED", "TODO", "FAILED"),
            Dialect::Server => ("PASS", "FAIL", "TODO", "FAIL"),
        };
        let pick = |explicit: &Option<String>, default: &str| {
            explicit.clone().unwrap_or_else(|| default.to_owned())
        };
        StatusLabels {
            passed: pick(&overrides.passed, passed),
            failed: pick(&overrides.failed, failed),
            pending: pick(&overrides.pending, pending),
            skipped: pick(&overrides.skipped, skipped),
        }
    }

    pub fn label(&self, status: Status) -> &str {
        match status {
            Status::Passed => &self.passed,
            Status::Failed => &self.failed,
            Status::Pending => &self.pending,
            Status::Skipped => &self.skipped,
        }
    }
}

pub fn execution<'a>(report: &'a ExecutionReport, labels: &'a StatusLabels) -> XrayExecution<'a> {
    XrayExecution {
        test_execution_key: report.test_execution_issue_key.as_deref(),
        info: XrayInfo {
            project: &report.project,
            start_date: &report.start_date,
            finish_date: &report.finish_date,
            summary: report.summary.as_deref(),
            description: report.description.as_deref(),
            test_plan_key: report.test_plan_issue_key.as_deref(),
            test_environments: report.test_environments.as_deref(),
        },
        tests: report
            .tests
            .iter()
            .map(|test| xray_test(&report.project, test, labels))
            .collect(),
    }
}

fn xray_test<'a>(project: &'a str, test: &'a TestRecord, labels: &'a StatusLabels) -> XrayTest<'a> {
    XrayTest {
        test_key: test.issue_key.as_deref(),
        test_info: match test.issue_key {
            Some(_) => None,
            None => Some(XrayTestInfo {
                project_key: project,
                summary: &test.title,
                test_type: "Generic",
            }),
        },
        start: &test.started_at,
        finish: &test.finished_at,
        status: labels.label(test.status),
        evidence: test.attachments.iter().map(evidence).collect(),
    }
}

fn evidence(attachment: &Attachment) -> XrayEvidence<'_> {
    XrayEvidence {
        data: STANDARD.encode(&attachment.data),
        filename: &attachment.name,
        content_type: &attachment.mime_type,
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct IssueRef {
    #[serde(default)]
    pub id: Option<String>,
    pub key: String,
    #[serde(default, rename = "self")]
    pub url: Option<String>,
}

/// Response of `POST /import/execution`.
///
/// Xray cloud answers with the issue itself, Xray server wraps it in
/// `testExecIssue`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ImportExecutionResponse {
    Server {
        #[serde(rename = "testExecIssue")]
        test_exec_issue: IssueRef,
    },
    Cloud(IssueRef),
}

impl ImportExecutionResponse {
    pub fn issue(&self) -> &IssueRef {
        match self {
            ImportExecutionResponse::Server { test_exec_issue } => test_exec_issue,
            ImportExecutionResponse::Cloud(issue) => issue,
        }
    }
}

/// Response of `POST /import/feature`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportFeatureResponse {
    #[serde(default)]
    pub updated_or_created_tests: Vec<IssueRef>,
    #[serde(default)]
    pub updated_or_created_preconditions: Vec<IssueRef>,
    #[serde(default)]
    pub errors: Vec<ItemError>,
}

/// An entry the remote service rejected while accepting the rest.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(from = "RawItemError")]
pub struct ItemError {
    pub message: String,
    pub entity_key: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawItemError {
    Message(String),
    Detailed {
        #[serde(alias = "error")]
        message: String,
        #[serde(default, alias = "issueKey")]
        key: Option<String>,
    },
}

impl From<RawItemError> for ItemError {
    fn from(raw: RawItemError) -> ItemError {
        match raw {
            RawItemError::Message(message) => ItemError {
                message,
                entity_key: None,
            },
            RawItemError::Detailed { message, key } => ItemError {
                message,
                entity_key: key,
            },
        }
    }
}
