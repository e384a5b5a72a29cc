//! Cypress run results as handed over by `cypress run`.
//!
//! Two schema versions are understood. Cypress 12 records timing and
//! screenshots per attempt; Cypress 13 moved screenshots up to the spec run
//! and only reports a duration per test. The shape is selected from the
//! `cypressVersion` field before deserializing, never by probing fields.

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use time::serde::iso8601;
use time::OffsetDateTime;

#[derive(Debug)]
pub enum RunOutcome {
    /// Cypress aborted before completing the run.
    Failed(FailedRun),
    Finished(RunResult),
}

#[derive(Debug, Deserialize)]
pub struct FailedRun {
    pub failures: u64,
    pub message: String,
}

#[derive(Debug)]
pub enum RunResult {
    V12(v12::RunResult),
    V13(v13::RunResult),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    V12,
    V13,
}

impl Shape {
    pub fn detect(cypress_version: &str) -> Result<Shape> {
        let major = cypress_version
            .split('.')
            .next()
            .and_then(|x| x.trim().parse::<u64>().ok())
            .ok_or_else(|| {
                Error::SchemaMismatch(format!("invalid Cypress version {:?}", cypress_version))
            })?;
        match major {
            12 => Ok(Shape::V12),
            x if x >= 13 => Ok(Shape::V13),
            _ => Err(Error::SchemaMismatch(format!(
                "Cypress version {} is not supported",
                cypress_version
            ))),
        }
    }
}

impl RunOutcome {
    pub fn from_value(value: Value) -> Result<RunOutcome> {
        if value.get("status").and_then(Value::as_str) == Some("failed") {
            let failed = serde_json::from_value(value)
                .map_err(|e| Error::SchemaMismatch(format!("failed run: {}", e)))?;
            return Ok(RunOutcome::Failed(failed));
        }
        Ok(RunOutcome::Finished(RunResult::from_value(value)?))
    }
}

impl RunResult {
    pub fn from_value(value: Value) -> Result<RunResult> {
        let version = value
            .get("cypressVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::SchemaMismatch("missing cypressVersion".into()))?;
        let shape = Shape::detect(version)?;
        let mismatch = |e: serde_json::Error| Error::SchemaMismatch(format!("{:?}: {}", shape, e));
        match shape {
            Shape::V12 => serde_json::from_value(value).map(RunResult::V12).map_err(mismatch),
            Shape::V13 => serde_json::from_value(value).map(RunResult::V13).map_err(mismatch),
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            RunResult::V12(_) => Shape::V12,
            RunResult::V13(_) => Shape::V13,
        }
    }

    pub fn info(&self) -> &RunInfo {
        match self {
            RunResult::V12(x) => &x.info,
            RunResult::V13(x) => &x.info,
        }
    }

    /// Number of per-test outcomes across all spec runs.
    pub fn test_count(&self) -> usize {
        match self {
            RunResult::V12(x) => x.runs.iter().map(|run| run.tests.len()).sum(),
            RunResult::V13(x) => x.runs.iter().map(|run| run.tests.len()).sum(),
        }
    }
}

/// Fields both schema versions carry at the top level.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInfo {
    #[serde(with = "iso8601")]
    pub started_tests_at: OffsetDateTime,
    #[serde(with = "iso8601")]
    pub ended_tests_at: OffsetDateTime,
    pub cypress_version: String,
    pub browser_name: String,
    pub browser_version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    #[serde(with = "iso8601")]
    pub started_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct Spec {
    pub relative: String,
}

#[derive(Debug, Deserialize)]
pub struct Screenshot {
    pub path: String,
}

pub mod v12 {
    use super::{RunInfo, Screenshot, Spec, Stats};
    use serde::Deserialize;
    use time::serde::iso8601;
    use time::OffsetDateTime;

    #[derive(Debug, Deserialize)]
    pub struct RunResult {
        #[serde(flatten)]
        pub info: RunInfo,
        pub runs: Vec<SpecRun>,
    }

    #[derive(Debug, Deserialize)]
    pub struct SpecRun {
        pub stats: Stats,
        pub spec: Spec,
        pub tests: Vec<TestResult>,
    }

    #[derive(Debug, Deserialize)]
    pub struct TestResult {
        pub title: Vec<String>,
        pub state: String,
        #[serde(default)]
        pub attempts: Vec<Attempt>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Attempt {
        pub state: String,
        #[serde(default, with = "iso8601::option")]
        pub started_at: Option<OffsetDateTime>,
        #[serde(default)]
        pub duration: Option<u64>,
        #[serde(default)]
        pub screenshots: Vec<Screenshot>,
    }
}

pub mod v13 {
    use super::{RunInfo, Screenshot, Spec, Stats};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct RunResult {
        #[serde(flatten)]
        pub info: RunInfo,
        pub runs: Vec<SpecRun>,
    }

    #[derive(Debug, Deserialize)]
    pub struct SpecRun {
        pub stats: Stats,
        pub spec: Spec,
        pub tests: Vec<TestResult>,
        #[serde(default)]
        pub screenshots: Vec<Screenshot>,
    }

    #[derive(Debug, Deserialize)]
    pub struct TestResult {
        pub title: Vec<String>,
        pub state: String,
        #[serde(default)]
        pub duration: Option<u64>,
    }
}

pub fn parse(json: &str) -> Result<RunOutcome> {
    RunOutcome::from_value(serde_json::from_str(json)?)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{json, Value};

    pub fn v12() -> Value {
        json!({
            "status": "finished",
            "startedTestsAt": "2022-11-28T17:41:12.234Z",
            "endedTestsAt": "2022-11-28T17:41:19.702Z",
            "cypressVersion": "12.17.4",
            "browserName": "electron",
            "browserVersion": "106.0.5249.51",
            "totalTests": 3,
            "runs": [{
                "stats": {"startedAt": "2022-11-28T17:41:12.234Z", "endedAt": "2022-11-28T17:41:19.702Z"},
                "spec": {"relative": "cypress/e2e/demo.cy.ts"},
                "tests": [
                    {
                        "title": ["xray upload demo", "CYP-452 should have the title"],
                        "state": "passed",
                        "attempts": [{
                            "state": "passed",
                            "startedAt": "2022-11-28T17:41:15.091Z",
                            "duration": 244,
                            "screenshots": []
                        }]
                    },
                    {
                        "title": ["xray upload demo", "CYP-268 should fail"],
                        "state": "failed",
                        "attempts": [{
                            "state": "failed",
                            "startedAt": "2022-11-28T17:41:15.338Z",
                            "duration": 1100,
                            "screenshots": [{
                                "name": null,
                                "takenAt": "2022-11-28T17:41:16.100Z",
                                "path": "/screenshots/demo.cy.ts/xray upload demo -- CYP-268 should fail (failed).png"
                            }]
                        }]
                    },
                    {
                        "title": ["xray upload demo", "CYP-237 is pending"],
                        "state": "pending",
                        "attempts": [{"state": "pending", "startedAt": null, "duration": null, "screenshots": []}]
                    }
                ]
            }]
        })
    }

    pub fn v13() -> Value {
        json!({
            "status": "finished",
            "startedTestsAt": "2023-09-09T10:59:28.829Z",
            "endedTestsAt": "2023-09-09T10:59:31.650Z",
            "cypressVersion": "13.2.0",
            "browserName": "electron",
            "browserVersion": "114.0.5735.289",
            "runs": [{
                "stats": {"startedAt": "2023-09-09T10:59:28.829Z", "endedAt": "2023-09-09T10:59:31.650Z"},
                "spec": {"relative": "cypress/e2e/demo.cy.ts"},
                "screenshots": [{
                    "name": null,
                    "takenAt": "2023-09-09T10:59:31.366Z",
                    "path": "/screenshots/demo.cy.ts/xray upload demo -- CYP-268 should fail (failed).png"
                }],
                "tests": [
                    {
                        "title": ["xray upload demo", "CYP-452 should have the title"],
                        "state": "passed",
                        "duration": 244,
                        "attempts": [{"state": "passed"}]
                    },
                    {
                        "title": ["xray upload demo", "CYP-268 should fail"],
                        "state": "failed",
                        "duration": 2200,
                        "attempts": [{"state": "failed"}, {"state": "failed"}]
                    },
                    {
                        "title": ["xray upload demo", "CYP-237 is skipped"],
                        "state": "skipped",
                        "duration": null,
                        "attempts": [{"state": "skipped"}]
                    }
                ]
            }]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_v12_shape() {
        match RunOutcome::from_value(fixtures::v12()).unwrap() {
            RunOutcome::Finished(run) => {
                assert_eq!(run.shape(), Shape::V12);
                assert_eq!(run.test_count(), 3);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn detects_v13_shape() {
        match RunOutcome::from_value(fixtures::v13()).unwrap() {
            RunOutcome::Finished(run) => {
                assert_eq!(run.shape(), Shape::V13);
                assert_eq!(run.info().browser_version, "114.0.5735.289");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn later_majors_use_v13_shape() {
        assert_eq!(Shape::detect("14.0.1").unwrap(), Shape::V13);
    }

    #[test]
    fn rejects_old_versions() {
        assert!(matches!(Shape::detect("10.3.0"), Err(Error::SchemaMismatch(_))));
        assert!(matches!(Shape::detect("latest"), Err(Error::SchemaMismatch(_))));
    }

    #[test]
    fn recognises_failed_runs() {
        let value = json!({"status": "failed", "failures": 2, "message": "browser crashed"});
        match RunOutcome::from_value(value).unwrap() {
            RunOutcome::Failed(failed) => {
                assert_eq!(failed.failures, 2);
                assert_eq!(failed.message, "browser crashed");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn missing_version_is_a_mismatch() {
        let value = json!({"status": "finished", "runs": []});
        assert!(matches!(
            RunOutcome::from_value(value),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn wrong_shape_for_version_is_a_mismatch() {
        let mut value = fixtures::v13();
        value["runs"] = json!([{"tests": "nope"}]);
        assert!(matches!(
            RunOutcome::from_value(value),
            Err(Error::SchemaMismatch(_))
        ));
    }
}
