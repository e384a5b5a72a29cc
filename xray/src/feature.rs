use crate::error::{Error, Result};
use regex::Regex;
use std::collections::BTreeMap;

/// Scenario names mapped to their Gherkin tags, as produced by a feature
/// file parser.
pub type ScenarioTags = BTreeMap<String, Vec<String>>;

pub fn parse_scenario_tags(json: &str) -> Result<ScenarioTags> {
    Ok(serde_json::from_str(json)?)
}

/// Finds the test issue a Cypress test or Cucumber scenario belongs to.
#[derive(Debug)]
pub struct IssueLinker<'a> {
    key: Regex,
    scenarios: &'a ScenarioTags,
}

impl<'a> IssueLinker<'a> {
    pub fn new(project_key: &str, scenarios: &'a ScenarioTags) -> Result<IssueLinker<'a>> {
        let key = Regex::new(&format!(r"\b({}-\d+)\b", regex::escape(project_key)))
            .map_err(|e| Error::Configuration(format!("project key {:?}: {}", project_key, e)))?;
        Ok(IssueLinker { key, scenarios })
    }

    /// Scenario tags take precedence over keys embedded in the title.
    pub fn issue_key(&self, title: &[String]) -> Option<String> {
        if let Some(tags) = title.last().and_then(|name| self.scenarios.get(name)) {
            if let Some(key) = tags.iter().find_map(|tag| self.find(tag)) {
                return Some(key);
            }
        }
        title.iter().rev().find_map(|part| self.find(part))
    }

    fn find(&self, text: &str) -> Option<String> {
        self.key
            .captures(text)
            .and_then(|captures| captures.get(1))
            .map(|x| x.as_str().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn finds_key_in_title() {
        let scenarios = ScenarioTags::new();
        let linker = IssueLinker::new("CYP", &scenarios).unwrap();
        assert_eq!(
            linker.issue_key(&title(&["demo", "CYP-123 does things"])),
            Some("CYP-123".into())
        );
        assert_eq!(linker.issue_key(&title(&["demo", "does things"])), None);
    }

    #[test]
    fn ignores_other_projects() {
        let scenarios = ScenarioTags::new();
        let linker = IssueLinker::new("CYP", &scenarios).unwrap();
        assert_eq!(linker.issue_key(&title(&["XCYP-1 and ABC-2"])), None);
    }

    #[test]
    fn prefers_scenario_tags() {
        let scenarios = parse_scenario_tags(
            r#"{"A user logs in": ["@smoke", "@TestName:CYP-7"]}"#,
        )
        .unwrap();
        let linker = IssueLinker::new("CYP", &scenarios).unwrap();
        assert_eq!(
            linker.issue_key(&title(&["Login CYP-1", "A user logs in"])),
            Some("CYP-7".into())
        );
    }

    #[test]
    fn falls_back_to_title_without_matching_tag() {
        let scenarios = parse_scenario_tags(r#"{"A user logs in": ["@smoke"]}"#).unwrap();
        let linker = IssueLinker::new("CYP", &scenarios).unwrap();
        assert_eq!(
            linker.issue_key(&title(&["Login CYP-1", "A user logs in"])),
            Some("CYP-1".into())
        );
    }
}
