//! Upload options read from environment variables.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub type Env = BTreeMap<String, String>;

pub const ENV_XRAY_CLIENT_ID: &str = "XRAY_CLIENT_ID";
pub const ENV_XRAY_CLIENT_SECRET: &str = "XRAY_CLIENT_SECRET";
pub const ENV_XRAY_API_TOKEN: &str = "XRAY_API_TOKEN";
pub const ENV_XRAY_USERNAME: &str = "XRAY_USERNAME";
pub const ENV_XRAY_PASSWORD: &str = "XRAY_PASSWORD";
pub const ENV_JIRA_API_URL: &str = "JIRA_API_URL";
pub const ENV_XRAY_API_URL: &str = "XRAY_API_URL";
pub const ENV_JIRA_PROJECT_KEY: &str = "JIRA_PROJECT_KEY";
pub const ENV_JIRA_TEST_EXECUTION_ISSUE_KEY: &str = "JIRA_TEST_EXECUTION_ISSUE_KEY";
pub const ENV_JIRA_TEST_EXECUTION_ISSUE_SUMMARY: &str = "JIRA_TEST_EXECUTION_ISSUE_SUMMARY";
pub const ENV_JIRA_TEST_EXECUTION_ISSUE_DESCRIPTION: &str = "JIRA_TEST_EXECUTION_ISSUE_DESCRIPTION";
pub const ENV_JIRA_TEST_PLAN_ISSUE_KEY: &str = "JIRA_TEST_PLAN_ISSUE_KEY";
pub const ENV_XRAY_TEST_ENVIRONMENTS: &str = "XRAY_TEST_ENVIRONMENTS";
pub const ENV_XRAY_UPLOAD_RESULTS: &str = "XRAY_UPLOAD_RESULTS";
pub const ENV_XRAY_UPLOAD_SCREENSHOTS: &str = "XRAY_UPLOAD_SCREENSHOTS";
pub const ENV_XRAY_STATUS_PASSED: &str = "XRAY_STATUS_PASSED";
pub const ENV_XRAY_STATUS_FAILED: &str = "XRAY_STATUS_FAILED";
pub const ENV_XRAY_STATUS_PENDING: &str = "XRAY_STATUS_PENDING";
pub const ENV_XRAY_STATUS_SKIPPED: &str = "XRAY_STATUS_SKIPPED";
pub const ENV_PLUGIN_LOG_DIRECTORY: &str = "PLUGIN_LOG_DIRECTORY";
pub const ENV_PLUGIN_NORMALIZE_SCREENSHOT_NAMES: &str = "PLUGIN_NORMALIZE_SCREENSHOT_NAMES";
pub const ENV_XRAY_TIMEOUT_SECONDS: &str = "XRAY_TIMEOUT_SECONDS";
pub const ENV_XRAY_HEARTBEAT_SECONDS: &str = "XRAY_HEARTBEAT_SECONDS";

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub jira: JiraOptions,
    pub xray: XrayOptions,
    pub plugin: PluginOptions,
}

#[derive(Clone, Debug, Default)]
pub struct JiraOptions {
    pub project_key: Option<String>,
    /// Base URL of a Jira server instance.
    pub url: Option<Url>,
    pub test_execution_issue_key: Option<String>,
    pub test_execution_issue_summary: Option<String>,
    pub test_execution_issue_description: Option<String>,
    pub test_plan_issue_key: Option<String>,
}

#[derive(Clone, Debug)]
pub struct XrayOptions {
    pub upload_results: bool,
    pub upload_screenshots: bool,
    pub test_environments: Option<Vec<String>>,
    pub status: StatusOverrides,
}

impl Default for XrayOptions {
    fn default() -> XrayOptions {
        XrayOptions {
            upload_results: true,
            upload_screenshots: true,
            test_environments: None,
            status: StatusOverrides::default(),
        }
    }
}

/// Custom Xray status names, for instances with translated statuses.
#[derive(Clone, Debug, Default)]
pub struct StatusOverrides {
    pub passed: Option<String>,
    pub failed: Option<String>,
    pub pending: Option<String>,
    pub skipped: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PluginOptions {
    /// Where diagnostics artifacts of failed requests are written.
    pub log_directory: PathBuf,
    pub normalize_screenshot_names: bool,
    pub timeout: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for PluginOptions {
    fn default() -> PluginOptions {
        PluginOptions {
            log_directory: PathBuf::from("logs"),
            normalize_screenshot_names: false,
            timeout: Duration::from_secs(60),
            heartbeat_interval: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn from_env(env: &Env) -> Result<Config> {
        let defaults = Config::default();
        let jira = JiraOptions {
            project_key: parse(env, ENV_JIRA_PROJECT_KEY, as_string)?,
            url: jira_url(env)?,
            test_execution_issue_key: parse(env, ENV_JIRA_TEST_EXECUTION_ISSUE_KEY, as_string)?,
            test_execution_issue_summary: parse(
                env,
                ENV_JIRA_TEST_EXECUTION_ISSUE_SUMMARY,
                as_string,
            )?,
            test_execution_issue_description: parse(
                env,
                ENV_JIRA_TEST_EXECUTION_ISSUE_DESCRIPTION,
                as_string,
            )?,
            test_plan_issue_key: parse(env, ENV_JIRA_TEST_PLAN_ISSUE_KEY, as_string)?,
        };
        let xray = XrayOptions {
            upload_results: parse(env, ENV_XRAY_UPLOAD_RESULTS, as_boolean)?
                .unwrap_or(defaults.xray.upload_results),
            upload_screenshots: parse(env, ENV_XRAY_UPLOAD_SCREENSHOTS, as_boolean)?
                .unwrap_or(defaults.xray.upload_screenshots),
            test_environments: parse(env, ENV_XRAY_TEST_ENVIRONMENTS, as_array_of_strings)?,
            status: StatusOverrides {
                passed: parse(env, ENV_XRAY_STATUS_PASSED, as_string)?,
                failed: parse(env, ENV_XRAY_STATUS_FAILED, as_string)?,
                pending: parse(env, ENV_XRAY_STATUS_PENDING, as_string)?,
                skipped: parse(env, ENV_XRAY_STATUS_SKIPPED, as_string)?,
            },
        };
        let plugin = PluginOptions {
            log_directory: parse(env, ENV_PLUGIN_LOG_DIRECTORY, as_string)?
                .map(PathBuf::from)
                .unwrap_or(defaults.plugin.log_directory),
            normalize_screenshot_names: parse(env, ENV_PLUGIN_NORMALIZE_SCREENSHOT_NAMES, as_boolean)?
                .unwrap_or(defaults.plugin.normalize_screenshot_names),
            timeout: parse(env, ENV_XRAY_TIMEOUT_SECONDS, as_seconds)?
                .unwrap_or(defaults.plugin.timeout),
            heartbeat_interval: parse(env, ENV_XRAY_HEARTBEAT_SECONDS, as_seconds)?
                .unwrap_or(defaults.plugin.heartbeat_interval),
        };
        Ok(Config { jira, xray, plugin })
    }
}

/// `JIRA_API_URL`, or the older `XRAY_API_URL` spelling.
pub fn api_url(env: &Env) -> Option<&str> {
    [ENV_JIRA_API_URL, ENV_XRAY_API_URL]
        .iter()
        .filter_map(|key| env.get(*key))
        .map(|x| x.trim())
        .find(|x| !x.is_empty())
}

fn jira_url(env: &Env) -> Result<Option<Url>> {
    api_url(env)
        .map(|url| {
            Url::parse(url).map_err(|e| Error::Configuration(format!("invalid Jira URL {:?}: {}", url, e)))
        })
        .transpose()
}

/// Parse an environment variable, treating empty values as absent.
pub fn parse<T>(env: &Env, key: &str, parser: fn(&str) -> Option<T>) -> Result<Option<T>> {
    match env.get(key).map(|x| x.trim()).filter(|x| !x.is_empty()) {
        None => Ok(None),
        Some(value) => parser(value).map(Some).ok_or_else(|| {
            Error::Configuration(format!("failed to parse {}: {:?}", key, value))
        }),
    }
}

pub fn as_string(value: &str) -> Option<String> {
    Some(value.to_owned())
}

pub fn as_boolean(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "1" | "on" => Some(true),
        "n" | "no" | "false" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn as_seconds(value: &str) -> Option<Duration> {
    value
        .parse::<f64>()
        .ok()
        .filter(|x| *x > 0.0)
        .and_then(|x| Duration::try_from_secs_f64(x).ok())
}

/// Accepts a JSON array of primitives or a comma-separated list, with at
/// least one element. Repeated entries are kept once, in first-seen order.
pub fn as_array_of_strings(value: &str) -> Option<Vec<String>> {
    let items = if value.starts_with('[') {
        let parsed: Vec<serde_json::Value> = serde_json::from_str(value).ok()?;
        parsed
            .into_iter()
            .map(|x| match x {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Number(n) => Some(n.to_string()),
                serde_json::Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
            .collect::<Option<Vec<String>>>()?
    } else {
        value
            .split(',')
            .map(|x| x.trim())
            .filter(|x| !x.is_empty())
            .map(|x| x.to_owned())
            .collect()
    };
    let mut unique: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    if unique.is_empty() {
        None
    } else {
        Some(unique)
    }
}
