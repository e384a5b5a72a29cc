use crate::error::{Error, Result};
use crate::feature::IssueLinker;
use crate::result::{Attachment, Status, TestRecord};
use crate::run::{v12, v13, RunResult, Screenshot};
use crate::timestamp::truncate_iso_time;
use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::io;
use std::path::Path;
use time::{Duration, OffsetDateTime};

lazy_static! {
    static ref NON_NAME_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9.]+").unwrap();
}

/// Source of screenshot bytes.
pub trait Evidence {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

#[derive(Debug, Default)]
pub struct FileEvidence;

impl Evidence for FileEvidence {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct EvidenceOptions {
    pub upload_screenshots: bool,
    pub normalize_names: bool,
}

/// Turns a Cypress run result into one record per test.
pub struct Normalizer<'a> {
    linker: IssueLinker<'a>,
    evidence: &'a dyn Evidence,
    options: EvidenceOptions,
}

impl<'a> Normalizer<'a> {
    pub fn new(
        linker: IssueLinker<'a>,
        evidence: &'a dyn Evidence,
        options: EvidenceOptions,
    ) -> Normalizer<'a> {
        Normalizer {
            linker,
            evidence,
            options,
        }
    }

    pub fn normalize(&self, run: &RunResult) -> Result<Vec<TestRecord>> {
        match run {
            RunResult::V12(x) => self.v12(x),
            RunResult::V13(x) => self.v13(x),
        }
    }

    fn v12(&self, run: &v12::RunResult) -> Result<Vec<TestRecord>> {
        let mut records = Vec::with_capacity(run.runs.iter().map(|x| x.tests.len()).sum());
        for spec_run in run.runs.iter() {
            for test in spec_run.tests.iter() {
                let status = test.state.parse::<Status>()?;
                let started_at = test
                    .attempts
                    .first()
                    .and_then(|x| x.started_at)
                    .unwrap_or(spec_run.stats.started_at);
                let last = test
                    .attempts
                    .last()
                    .and_then(|x| x.started_at.map(|start| (start, x.duration.unwrap_or(0))));
                let finished_at = match last {
                    Some((start, duration)) => advance(start, duration)?,
                    None => started_at,
                };
                let screenshots = test
                    .attempts
                    .iter()
                    .flat_map(|x| x.screenshots.iter())
                    .collect::<Vec<&Screenshot>>();
                records.push(self.record(&test.title, status, started_at, finished_at, &screenshots)?);
            }
        }
        Ok(records)
    }

    fn v13(&self, run: &v13::RunResult) -> Result<Vec<TestRecord>> {
        let mut records = Vec::with_capacity(run.runs.iter().map(|x| x.tests.len()).sum());
        for spec_run in run.runs.iter() {
            // Tests only report durations, so start times are laid out
            // back to back from the start of their spec.
            let mut cursor = spec_run.stats.started_at;
            for test in spec_run.tests.iter() {
                let status = test.state.parse::<Status>()?;
                let started_at = cursor;
                let finished_at = advance(started_at, test.duration.unwrap_or(0))?;
                cursor = finished_at;
                let name = test.title.join(" -- ");
                let screenshots = spec_run
                    .screenshots
                    .iter()
                    .filter(|x| {
                        Path::new(&x.path)
                            .file_stem()
                            .and_then(|stem| stem.to_str())
                            .map(|stem| screenshot_of(stem, &name))
                            .unwrap_or(false)
                    })
                    .collect::<Vec<&Screenshot>>();
                records.push(self.record(&test.title, status, started_at, finished_at, &screenshots)?);
            }
        }
        Ok(records)
    }

    fn record(
        &self,
        title: &[String],
        status: Status,
        started_at: OffsetDateTime,
        finished_at: OffsetDateTime,
        screenshots: &[&Screenshot],
    ) -> Result<TestRecord> {
        let attachments = if self.options.upload_screenshots {
            screenshots
                .iter()
                .map(|x| self.attachment(x))
                .collect::<Result<Vec<Attachment>>>()?
        } else {
            Vec::new()
        };
        Ok(TestRecord {
            issue_key: self.linker.issue_key(title),
            title: title.join(" "),
            status,
            started_at: truncate_iso_time(started_at)?,
            finished_at: truncate_iso_time(finished_at)?,
            duration_ms: (finished_at - started_at).whole_milliseconds().max(0) as u64,
            attachments,
        })
    }

    fn attachment(&self, screenshot: &Screenshot) -> Result<Attachment> {
        let path = Path::new(&screenshot.path);
        let file_name = path
            .file_name()
            .map(|x| x.to_string_lossy().into_owned())
            .unwrap_or_else(|| screenshot.path.clone());
        let name = if self.options.normalize_names {
            NON_NAME_CHARS.replace_all(&file_name, "_").into_owned()
        } else {
            file_name
        };
        Ok(Attachment {
            mime_type: mime_type(path).into(),
            name,
            data: self.evidence.read(path)?,
        })
    }
}

fn advance(start: OffsetDateTime, ms: u64) -> Result<OffsetDateTime> {
    i64::try_from(ms)
        .ok()
        .and_then(|x| start.checked_add(Duration::milliseconds(x)))
        .ok_or_else(|| {
            Error::SchemaMismatch(format!("test duration of {} ms is out of range", ms))
        })
}

/// Screenshot names are the test title, optionally followed by a
/// parenthesised suffix such as ` (failed)` or ` (attempt 2)`.
fn screenshot_of(stem: &str, name: &str) -> bool {
    match stem.strip_prefix(name) {
        Some(rest) => rest.is_empty() || rest.starts_with(" ("),
        None => false,
    }
}

fn mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|x| x.to_str())
        .map(|x| x.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("mp4") => "video/mp4",
        Some("txt") | Some("log") => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Evidence;
    use std::collections::BTreeMap;
    use std::io;
    use std::path::{Path, PathBuf};

    #[derive(Debug, Default)]
    pub struct MemoryEvidence {
        pub files: BTreeMap<PathBuf, Vec<u8>>,
    }

    impl MemoryEvidence {
        pub fn with(mut self, path: &str, data: &[u8]) -> MemoryEvidence {
            self.files.insert(PathBuf::from(path), data.to_vec());
            self
        }
    }

    impl Evidence for MemoryEvidence {
        fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryEvidence;
    use super::*;
    use crate::feature::ScenarioTags;
    use crate::run::{fixtures, RunOutcome};
    use serde_json::Value;

    const SCREENSHOT: &str =
        "/screenshots/demo.cy.ts/xray upload demo -- CYP-268 should fail (failed).png";

    fn finished(value: Value) -> RunResult {
        match RunOutcome::from_value(value).unwrap() {
            RunOutcome::Finished(run) => run,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    fn normalize(value: Value, options: EvidenceOptions) -> Result<Vec<TestRecord>> {
        let scenarios = ScenarioTags::new();
        let evidence = MemoryEvidence::default().with(SCREENSHOT, b"\x89PNG");
        let linker = IssueLinker::new("CYP", &scenarios).unwrap();
        Normalizer::new(linker, &evidence, options).normalize(&finished(value))
    }

    fn with_screenshots() -> EvidenceOptions {
        EvidenceOptions {
            upload_screenshots: true,
            normalize_names: false,
        }
    }

    #[test]
    fn one_record_per_test() {
        for value in [fixtures::v12(), fixtures::v13()] {
            let expected = finished(value.clone()).test_count();
            let records = normalize(value, with_screenshots()).unwrap();
            assert_eq!(records.len(), expected);
        }
    }

    #[test]
    fn v12_records() {
        let records = normalize(fixtures::v12(), with_screenshots()).unwrap();
        let keys = records
            .iter()
            .map(|x| x.issue_key.as_deref())
            .collect::<Vec<_>>();
        assert_eq!(keys, vec![Some("CYP-452"), Some("CYP-268"), Some("CYP-237")]);

        let failed = &records[1];
        assert_eq!(failed.status, Status::Failed);
        assert_eq!(failed.started_at, "2022-11-28T17:41:15Z");
        assert_eq!(failed.finished_at, "2022-11-28T17:41:16Z");
        assert_eq!(failed.duration_ms, 1100);
        assert_eq!(failed.attachments.len(), 1);
        assert_eq!(failed.attachments[0].mime_type, "image/png");
        assert_eq!(failed.attachments[0].data, b"\x89PNG".to_vec());

        let pending = &records[2];
        assert_eq!(pending.status, Status::Pending);
        assert_eq!(pending.started_at, "2022-11-28T17:41:12Z");
        assert_eq!(pending.duration_ms, 0);
    }

    #[test]
    fn v13_records() {
        let records = normalize(fixtures::v13(), with_screenshots()).unwrap();
        assert_eq!(records[0].started_at, "2023-09-09T10:59:28Z");
        assert_eq!(records[0].finished_at, "2023-09-09T10:59:29Z");
        assert_eq!(records[1].started_at, "2023-09-09T10:59:29Z");
        assert_eq!(records[1].finished_at, "2023-09-09T10:59:31Z");
        assert_eq!(records[1].attachments.len(), 1);
        assert!(records[0].attachments.is_empty());
        assert_eq!(records[2].status, Status::Skipped);
    }

    #[test]
    fn screenshots_can_be_disabled() {
        let records = normalize(fixtures::v12(), EvidenceOptions::default()).unwrap();
        assert!(records.iter().all(|x| x.attachments.is_empty()));
    }

    #[test]
    fn normalizes_screenshot_names() {
        let options = EvidenceOptions {
            upload_screenshots: true,
            normalize_names: true,
        };
        let records = normalize(fixtures::v12(), options).unwrap();
        assert_eq!(
            records[1].attachments[0].name,
            "xray_upload_demo_CYP_268_should_fail_failed_.png"
        );
    }

    #[test]
    fn unknown_state_fails() {
        let mut value = fixtures::v13();
        value["runs"][0]["tests"][0]["state"] = "flaky".into();
        assert!(matches!(
            normalize(value, with_screenshots()),
            Err(Error::UnknownStatus(_))
        ));
    }

    #[test]
    fn missing_screenshot_fails() {
        let mut value = fixtures::v12();
        value["runs"][0]["tests"][1]["attempts"][0]["screenshots"][0]["path"] =
            "/nowhere.png".into();
        assert!(matches!(
            normalize(value, with_screenshots()),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn v13_duration_out_of_range_fails() {
        let mut value = fixtures::v13();
        value["runs"][0]["tests"][0]["duration"] = 9_000_000_000_000_000u64.into();
        assert!(matches!(
            normalize(value, with_screenshots()),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn v12_duration_out_of_range_fails() {
        let mut value = fixtures::v12();
        value["runs"][0]["tests"][0]["attempts"][0]["duration"] = u64::MAX.into();
        assert!(matches!(
            normalize(value, with_screenshots()),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn screenshots_need_the_whole_title() {
        let mut value = fixtures::v13();
        value["runs"][0]["tests"][0]["title"] = serde_json::json!(["xray upload demo", "CYP-26"]);
        let records = normalize(value, with_screenshots()).unwrap();
        assert!(records[0].attachments.is_empty());
        assert_eq!(records[1].attachments.len(), 1);
    }

    #[test]
    fn screenshot_suffixes() {
        assert!(screenshot_of("demo -- works", "demo -- works"));
        assert!(screenshot_of("demo -- works (attempt 2)", "demo -- works"));
        assert!(!screenshot_of("demo -- works too", "demo -- works"));
        assert!(!screenshot_of("demo -- work", "demo -- works"));
    }
}
