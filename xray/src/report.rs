use crate::config::Config;
use crate::error::{Error, Result};
use crate::feature::{IssueLinker, ScenarioTags};
use crate::normalize::{Evidence, EvidenceOptions, Normalizer};
use crate::result::TestRecord;
use crate::run::{RunInfo, RunResult};
use crate::timestamp::{truncate_iso_time, unix_millis};

/// The canonical description of one complete test run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionReport {
    pub test_execution_issue_key: Option<String>,
    pub project: String,
    pub start_date: String,
    pub finish_date: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub test_plan_issue_key: Option<String>,
    pub test_environments: Option<Vec<String>>,
    pub tests: Vec<TestRecord>,
}

pub struct ReportBuilder<'a> {
    config: &'a Config,
    evidence: &'a dyn Evidence,
    scenarios: &'a ScenarioTags,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(
        config: &'a Config,
        evidence: &'a dyn Evidence,
        scenarios: &'a ScenarioTags,
    ) -> ReportBuilder<'a> {
        ReportBuilder {
            config,
            evidence,
            scenarios,
        }
    }

    pub fn build(&self, run: &RunResult) -> Result<ExecutionReport> {
        let jira = &self.config.jira;
        let project = jira.project_key.as_deref().ok_or_else(|| {
            Error::Configuration("a Jira project key is required (JIRA_PROJECT_KEY)".into())
        })?;
        let info = run.info();
        if info.ended_tests_at < info.started_tests_at {
            return Err(Error::SchemaMismatch(format!(
                "run ended at {} before it started at {}",
                info.ended_tests_at, info.started_tests_at
            )));
        }
        let normalizer = Normalizer::new(
            IssueLinker::new(project, self.scenarios)?,
            self.evidence,
            EvidenceOptions {
                upload_screenshots: self.config.xray.upload_screenshots,
                normalize_names: self.config.plugin.normalize_screenshot_names,
            },
        );
        Ok(ExecutionReport {
            test_execution_issue_key: jira.test_execution_issue_key.clone(),
            project: project.to_owned(),
            start_date: truncate_iso_time(info.started_tests_at)?,
            finish_date: truncate_iso_time(info.ended_tests_at)?,
            summary: self.summary(info),
            description: self.description(info),
            test_plan_issue_key: jira.test_plan_issue_key.clone(),
            test_environments: self.config.xray.test_environments.clone(),
            tests: normalizer.normalize(run)?,
        })
    }

    // Existing execution issues keep their summary and description unless
    // an override is configured explicitly.
    fn keeps_existing(&self, explicit: &Option<String>) -> bool {
        self.config.jira.test_execution_issue_key.is_some() && explicit.is_none()
    }

    fn summary(&self, info: &RunInfo) -> Option<String> {
        let explicit = &self.config.jira.test_execution_issue_summary;
        if self.keeps_existing(explicit) {
            return None;
        }
        Some(explicit.clone().unwrap_or_else(|| {
            format!("Execution Results [{}]", unix_millis(info.started_tests_at))
        }))
    }

    fn description(&self, info: &RunInfo) -> Option<String> {
        let explicit = &self.config.jira.test_execution_issue_description;
        if self.keeps_existing(explicit) {
            return None;
        }
        Some(explicit.clone().unwrap_or_else(|| {
            format!(
                "Cypress version: {}\nBrowser: {} ({})",
                info.cypress_version, info.browser_name, info.browser_version
            )
        }))
    }
}
