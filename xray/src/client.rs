//! Clients for the Xray import and export endpoints.
//!
//! Xray cloud and Xray server share the same request and response contracts
//! and differ in how requests are authenticated and where the API lives.
//! Every operation runs through the same steps:
//!
//! 1. authenticate, which may mean a token exchange for Xray cloud
//! 2. send the request while a [`Heartbeat`] reports progress
//! 3. on failure, write a diagnostics artifact and return [`Error::Transport`]
//!
//! No operation is retried.

use crate::config::Config;
use crate::credentials::{Credentials, JwtCredentials};
use crate::diagnostics::Diagnostics;
use crate::endpoint;
use crate::error::{Error, Result};
use crate::heartbeat::{Heartbeat, LogProgress, Progress};
use crate::network::{self, Failure};
use crate::report::ExecutionReport;
use crate::wire::{self, ImportExecutionResponse, ImportFeatureResponse, IssueRef, StatusLabels};
use log::{error, info};
use reqwest::blocking::multipart::Form;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_DISPOSITION};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Base URL of the Xray cloud API.
pub const CLOUD_URL: &str = "https://xray.cloud.getxray.app/api/v2";

/// Path of the Xray server API below the Jira base URL.
pub const SERVER_PATH: &str = "rest/raven/1.0";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    ImportExecutionResults,
    ImportCucumberTests,
    ExportCucumberTests,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ImportExecutionResults => "importExecutionResults",
            Operation::ImportCucumberTests => "importCucumberTests",
            Operation::ExportCucumberTests => "exportCucumberTests",
        }
    }

    pub fn still_working(&self) -> &'static str {
        match self {
            Operation::ImportExecutionResults => "Still uploading...",
            Operation::ImportCucumberTests => "Still importing...",
            Operation::ExportCucumberTests => "Still exporting...",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Cloud,
    Server,
}

/// A feature file to import, with optional query parameters.
#[derive(Clone, Debug, Default)]
pub struct FeatureImport {
    pub file: PathBuf,
    pub project_key: Option<String>,
    pub project_id: Option<String>,
    pub source: Option<String>,
}

impl FeatureImport {
    fn query(&self) -> Vec<(&'static str, &str)> {
        [
            ("projectKey", self.project_key.as_deref()),
            ("projectId", self.project_id.as_deref()),
            ("source", self.source.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|x| (key, x)))
        .collect()
    }
}

/// Selects the tests to export, by issue keys, by a saved filter or both.
#[derive(Clone, Debug, Default)]
pub struct FeatureExport {
    pub keys: Vec<String>,
    pub filter: Option<u64>,
}

impl FeatureExport {
    fn query(&self) -> Result<Vec<(&'static str, String)>> {
        let mut query = Vec::with_capacity(2);
        if !self.keys.is_empty() {
            query.push(("keys", self.keys.join(";")));
        }
        if let Some(filter) = self.filter {
            query.push(("filter", filter.to_string()));
        }
        if query.is_empty() {
            return Err(Error::Configuration(
                "exporting feature files requires issue keys or a filter".into(),
            ));
        }
        Ok(query)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedFeature {
    pub filename: String,
    pub content: Vec<u8>,
}

/// Extract the quoted filename of a `Content-Disposition` header.
pub fn attachment_filename(headers: &HeaderMap) -> Result<String> {
    let value = headers
        .get(CONTENT_DISPOSITION)
        .ok_or_else(|| Error::MalformedResponse("missing Content-Disposition header".into()))?
        .to_str()
        .map_err(|e| Error::MalformedResponse(format!("unreadable Content-Disposition: {}", e)))?;
    match (value.find('"'), value.rfind('"')) {
        (Some(start), Some(end)) if end > start + 1 => Ok(value[start + 1..end].to_owned()),
        _ => Err(Error::MalformedResponse(format!(
            "no quoted filename in Content-Disposition: {}",
            value
        ))),
    }
}

/// State shared by both dialects: the HTTP client, progress reporting,
/// diagnostics and the status names of the target instance.
pub struct Session {
    http: Client,
    progress: Arc<dyn Progress>,
    heartbeat_interval: Duration,
    diagnostics: Diagnostics,
    labels: StatusLabels,
}

impl Session {
    pub fn new(config: &Config, dialect: Dialect) -> Result<Session> {
        let http = network::client(config.plugin.timeout)
            .map_err(|e| Error::Configuration(format!("failed to create HTTP client: {}", e)))?;
        Ok(Session {
            http,
            progress: Arc::new(LogProgress),
            heartbeat_interval: config.plugin.heartbeat_interval,
            diagnostics: Diagnostics::new(config.plugin.log_directory.clone()),
            labels: StatusLabels::new(dialect, &config.xray.status),
        })
    }

    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Session {
        self.progress = progress;
        self
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn labels(&self) -> &StatusLabels {
        &self.labels
    }

    /// Run one remote call with an already obtained authorization header.
    ///
    /// The heartbeat lives exactly as long as `call`.
    fn perform<T, F>(&self, operation: Operation, authorization: HeaderValue, call: F) -> Result<T>
    where
        F: FnOnce(&Client, HeaderMap) -> std::result::Result<T, Failure>,
    {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);
        let outcome = {
            let _heartbeat = Heartbeat::start(
                operation,
                self.heartbeat_interval,
                self.progress.clone(),
            );
            call(&self.http, headers)
        };
        outcome.map_err(|failure| {
            error!("{} failed: {}", operation, failure);
            let artifact = self.diagnostics.write(operation, &failure);
            Error::Transport {
                operation,
                message: failure.to_string(),
                artifact,
            }
        })
    }
}

pub trait XrayClient {
    fn dialect(&self) -> Dialect;

    fn session(&self) -> &Session;

    fn base_url(&self) -> &Url;

    /// The `Authorization` header for the next request.
    fn authorization(&self) -> Result<HeaderValue>;

    fn import_execution(&self, report: &ExecutionReport) -> Result<ImportExecutionResponse> {
        let url = endpoint(self.base_url(), "import/execution")?;
        let authorization = self.authorization()?;
        info!("Uploading test results...");
        let session = self.session();
        let body = wire::execution(report, session.labels());
        let response: ImportExecutionResponse =
            session.perform(Operation::ImportExecutionResults, authorization, |http, headers| {
                network::json(network::send(http.post(url).headers(headers).json(&body))?)
            })?;
        info!(
            "Successfully uploaded test execution results: {}",
            response.issue().key
        );
        Ok(response)
    }

    fn import_feature(&self, request: &FeatureImport) -> Result<ImportFeatureResponse> {
        let url = endpoint(self.base_url(), "import/feature")?;
        let authorization = self.authorization()?;
        info!("Importing cucumber feature files...");
        let response: ImportFeatureResponse = self.session().perform(
            Operation::ImportCucumberTests,
            authorization,
            |http, headers| {
                let form = Form::new().file("file", &request.file)?;
                network::json(network::send(
                    http.post(url)
                        .headers(headers)
                        .query(&request.query())
                        .multipart(form),
                )?)
            },
        )?;
        if !response.updated_or_created_tests.is_empty() {
            info!(
                "Successfully updated or created test issues: {}",
                keys(&response.updated_or_created_tests)
            );
        }
        if !response.updated_or_created_preconditions.is_empty() {
            info!(
                "Successfully updated or created precondition issues: {}",
                keys(&response.updated_or_created_preconditions)
            );
        }
        if !response.errors.is_empty() {
            error!(
                "Encountered some errors during import: {}",
                response
                    .errors
                    .iter()
                    .map(|x| x.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            );
        }
        Ok(response)
    }

    /// A successful response without a quoted filename is a
    /// [`Error::MalformedResponse`] and leaves no diagnostics artifact.
    fn export_feature(&self, request: &FeatureExport) -> Result<ExportedFeature> {
        let url = endpoint(self.base_url(), "export/cucumber")?;
        let query = request.query()?;
        let authorization = self.authorization()?;
        info!("Exporting cucumber tests...");
        let (headers, content) = self.session().perform(
            Operation::ExportCucumberTests,
            authorization,
            |http, headers| {
                let resp = network::send(http.get(url).headers(headers).query(&query))?;
                let headers = resp.headers().clone();
                Ok((headers, resp.bytes()?.to_vec()))
            },
        )?;
        let filename = attachment_filename(&headers)?;
        info!("Successfully exported cucumber tests to: {}", filename);
        Ok(ExportedFeature { filename, content })
    }
}

fn keys(issues: &[IssueRef]) -> String {
    issues
        .iter()
        .map(|x| x.key.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct CloudClient {
    base_url: Url,
    credentials: JwtCredentials,
    session: Session,
}

impl CloudClient {
    pub fn new(credentials: JwtCredentials, session: Session) -> Result<CloudClient> {
        Ok(CloudClient {
            base_url: Url::parse(CLOUD_URL)?,
            credentials,
            session,
        })
    }

    /// Point the client at another Xray cloud API root.
    pub fn with_base_url(mut self, base_url: Url) -> CloudClient {
        self.base_url = base_url;
        self
    }
}

impl XrayClient for CloudClient {
    fn dialect(&self) -> Dialect {
        Dialect::Cloud
    }

    fn session(&self) -> &Session {
        &self.session
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn authorization(&self) -> Result<HeaderValue> {
        let url = endpoint(&self.base_url, "authenticate")?;
        self.credentials.authorization_header(self.session.http(), &url)
    }
}

pub struct ServerClient {
    base_url: Url,
    authorization: HeaderValue,
    session: Session,
}

impl ServerClient {
    /// `jira_url` is the Jira base URL, the Xray API lives below it.
    pub fn new(jira_url: &Url, authorization: HeaderValue, session: Session) -> Result<ServerClient> {
        Ok(ServerClient {
            base_url: endpoint(jira_url, SERVER_PATH)?,
            authorization,
            session,
        })
    }
}

impl XrayClient for ServerClient {
    fn dialect(&self) -> Dialect {
        Dialect::Server
    }

    fn session(&self) -> &Session {
        &self.session
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn authorization(&self) -> Result<HeaderValue> {
        Ok(self.authorization.clone())
    }
}

/// Create the client matching the resolved credentials.
pub fn connect(
    config: &Config,
    credentials: Credentials,
    progress: Arc<dyn Progress>,
) -> Result<Box<dyn XrayClient>> {
    let server_url = || {
        config.jira.url.as_ref().ok_or_else(|| {
            Error::Configuration("Xray server requires a Jira URL (JIRA_API_URL)".into())
        })
    };
    Ok(match credentials {
        Credentials::Jwt(jwt) => {
            let session = Session::new(config, Dialect::Cloud)?.with_progress(progress);
            Box::new(CloudClient::new(jwt, session)?)
        }
        Credentials::Pat(pat) => {
            let session = Session::new(config, Dialect::Server)?.with_progress(progress);
            Box::new(ServerClient::new(server_url()?, pat.authorization_header()?, session)?)
        }
        Credentials::Basic(basic) => {
            let session = Session::new(config, Dialect::Server)?.with_progress(progress);
            Box::new(ServerClient::new(server_url()?, basic.authorization_header()?, session)?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::PatCredentials;

    fn disposition(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_DISPOSITION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_quoted_filename() {
        let headers = disposition(r#"attachment; filename="results.feature""#);
        assert_eq!(attachment_filename(&headers).unwrap(), "results.feature");
    }

    #[test]
    fn rejects_unquoted_filename() {
        let headers = disposition("attachment; filename=results.feature");
        assert!(matches!(
            attachment_filename(&headers),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            attachment_filename(&disposition(r#"attachment; filename=""#)),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn rejects_missing_header() {
        assert!(matches!(
            attachment_filename(&HeaderMap::new()),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn feature_import_omits_missing_parameters() {
        let request = FeatureImport {
            file: PathBuf::from("login.feature"),
            project_key: Some("CYP".into()),
            source: Some("cypress".into()),
            ..Default::default()
        };
        assert_eq!(
            request.query(),
            vec![("projectKey", "CYP"), ("source", "cypress")]
        );
        assert!(FeatureImport::default().query().is_empty());
    }

    #[test]
    fn feature_export_needs_a_selection() {
        assert!(matches!(
            FeatureExport::default().query(),
            Err(Error::Configuration(_))
        ));
        let request = FeatureExport {
            keys: vec!["CYP-1".into(), "CYP-2".into()],
            filter: Some(56),
        };
        assert_eq!(
            request.query().unwrap(),
            vec![("keys", "CYP-1;CYP-2".to_string()), ("filter", "56".to_string())]
        );
    }

    #[test]
    fn server_api_below_jira_url() {
        let config = Config::default();
        let session = Session::new(&config, Dialect::Server).unwrap();
        let client = ServerClient::new(
            &Url::parse("https://example.org/jira/").unwrap(),
            PatCredentials::new("token").authorization_header().unwrap(),
            session,
        )
        .unwrap();
        assert_eq!(
            client.base_url().as_str(),
            "https://example.org/jira/rest/raven/1.0"
        );
        assert_eq!(client.dialect(), Dialect::Server);
    }

    #[test]
    fn server_connection_requires_url() {
        let config = Config::default();
        let result = connect(
            &config,
            Credentials::Pat(PatCredentials::new("token")),
            Arc::new(LogProgress),
        );
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
