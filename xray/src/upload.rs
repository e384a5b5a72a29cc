//! Control flow at the end of a Cypress run.

use crate::client::{self, ExportedFeature, FeatureExport, FeatureImport, XrayClient};
use crate::config::{Config, Env};
use crate::credentials;
use crate::error::Result;
use crate::feature::ScenarioTags;
use crate::heartbeat::{LogProgress, Progress};
use crate::normalize::{Evidence, FileEvidence};
use crate::report::ReportBuilder;
use crate::run::RunOutcome;
use crate::wire::{ImportExecutionResponse, ImportFeatureResponse, ItemError};
use log::{error, info};
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    RunFailed,
    Disabled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::RunFailed => "run failed",
            SkipReason::Disabled => "disabled",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Upload {
    Skipped(SkipReason),
    Uploaded(UploadOutcome),
}

/// What the remote service created or updated.
///
/// Non-empty `errors` do not make the upload a failure, all other entries
/// were still accepted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadOutcome {
    pub issues: Vec<String>,
    pub preconditions: Vec<String>,
    pub errors: Vec<ItemError>,
}

impl From<ImportExecutionResponse> for UploadOutcome {
    fn from(response: ImportExecutionResponse) -> UploadOutcome {
        UploadOutcome {
            issues: vec![response.issue().key.clone()],
            ..Default::default()
        }
    }
}

impl From<ImportFeatureResponse> for UploadOutcome {
    fn from(response: ImportFeatureResponse) -> UploadOutcome {
        UploadOutcome {
            issues: response
                .updated_or_created_tests
                .into_iter()
                .map(|x| x.key)
                .collect(),
            preconditions: response
                .updated_or_created_preconditions
                .into_iter()
                .map(|x| x.key)
                .collect(),
            errors: response.errors,
        }
    }
}

enum Transport {
    /// Credentials are resolved from the environment on first use.
    Environment(Env),
    Client(Arc<dyn XrayClient>),
}

/// Everything one upload needs, passed in explicitly.
pub struct UploadContext {
    config: Config,
    transport: Transport,
    evidence: Box<dyn Evidence>,
    scenarios: ScenarioTags,
    progress: Arc<dyn Progress>,
}

impl UploadContext {
    pub fn from_env(env: Env) -> Result<UploadContext> {
        let config = Config::from_env(&env)?;
        Ok(UploadContext::new(config, Transport::Environment(env)))
    }

    pub fn with_client(config: Config, client: Arc<dyn XrayClient>) -> UploadContext {
        UploadContext::new(config, Transport::Client(client))
    }

    fn new(config: Config, transport: Transport) -> UploadContext {
        UploadContext {
            config,
            transport,
            evidence: Box::new(FileEvidence),
            scenarios: ScenarioTags::new(),
            progress: Arc::new(LogProgress),
        }
    }

    pub fn evidence(mut self, evidence: Box<dyn Evidence>) -> UploadContext {
        self.evidence = evidence;
        self
    }

    pub fn scenarios(mut self, scenarios: ScenarioTags) -> UploadContext {
        self.scenarios = scenarios;
        self
    }

    pub fn progress(mut self, progress: Arc<dyn Progress>) -> UploadContext {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The client for this upload. No network activity happens here.
    pub fn client(&self) -> Result<Arc<dyn XrayClient>> {
        match &self.transport {
            Transport::Client(client) => Ok(client.clone()),
            Transport::Environment(env) => {
                let credentials = credentials::resolve(env)?;
                let client = client::connect(&self.config, credentials, self.progress.clone())?;
                Ok(Arc::from(client))
            }
        }
    }
}

/// Upload the results of a finished run.
///
/// Failed runs and disabled uploads return before credentials are resolved.
pub fn run(outcome: &RunOutcome, context: &UploadContext) -> Result<Upload> {
    let run = match outcome {
        RunOutcome::Failed(failed) => {
            error!("Failed to run {} tests: {}", failed.failures, failed.message);
            return Ok(Upload::Skipped(SkipReason::RunFailed));
        }
        RunOutcome::Finished(run) => run,
    };
    if !context.config.xray.upload_results {
        info!("Skipping results upload: disabled");
        return Ok(Upload::Skipped(SkipReason::Disabled));
    }
    let report =
        ReportBuilder::new(&context.config, context.evidence.as_ref(), &context.scenarios)
            .build(run)?;
    let client = context.client()?;
    let response = client.import_execution(&report)?;
    Ok(Upload::Uploaded(response.into()))
}

pub fn import_feature(context: &UploadContext, request: &FeatureImport) -> Result<UploadOutcome> {
    let client = context.client()?;
    Ok(client.import_feature(request)?.into())
}

pub fn export_feature(context: &UploadContext, request: &FeatureExport) -> Result<ExportedFeature> {
    context.client()?.export_feature(request)
}
