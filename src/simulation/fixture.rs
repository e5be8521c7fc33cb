//! Case fixtures: the hand-authored tables behind each simulated patient.
//!
//! A case maps question patterns to canned patient answers. Patterns are
//! regexes matched case-insensitively against the student's text; the first
//! matching rule wins and unmatched text gets the case's fallback answer.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tracing::info;

use crate::config::ConfigError;
use crate::simulation::cases::builtin_fixtures;

const DEFAULT_SCORE_INCREMENT: u32 = 2;

fn default_score_increment() -> u32 {
    DEFAULT_SCORE_INCREMENT
}

/// One row of a case's rule table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRule {
    /// Stable key recorded in a session's asked prompts.
    pub key: String,
    pub pattern: String,
    pub response: String,
    /// Answer given when the same rule fires again in one session.
    #[serde(default)]
    pub repeat_response: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseFixture {
    pub case_type: String,
    pub title: String,
    pub summary: String,
    pub initial_prompt: String,
    pub expected_diagnosis: String,
    #[serde(default)]
    pub accepted_aliases: Vec<String>,
    #[serde(default = "default_score_increment")]
    pub score_increment: u32,
    pub rules: Vec<ResponseRule>,
    pub fallback_response: String,
}

/// Public listing of a case. Leaves out the answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseInfo {
    pub case_type: String,
    pub title: String,
    pub summary: String,
}

/// Canned answer picked for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply<'a> {
    pub text: &'a str,
    pub rule_key: Option<&'a str>,
}

/// A fixture with its patterns compiled.
#[derive(Debug)]
pub struct Case {
    fixture: CaseFixture,
    patterns: Vec<Regex>,
}

impl Case {
    fn compile(fixture: CaseFixture) -> Result<Self, ConfigError> {
        if fixture.case_type.trim().is_empty() {
            return Err(ConfigError::Validation("case fixture with empty caseType".into()));
        }
        if fixture.expected_diagnosis.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "case '{}' has no expectedDiagnosis",
                fixture.case_type
            )));
        }

        let mut keys = HashSet::new();
        for rule in &fixture.rules {
            if !keys.insert(rule.key.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "case '{}' has duplicate rule key '{}'",
                    fixture.case_type, rule.key
                )));
            }
        }

        let patterns = fixture
            .rules
            .iter()
            .map(|rule| {
                RegexBuilder::new(&rule.pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ConfigError::InvalidRegex { pattern: rule.pattern.clone(), source: e })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { fixture, patterns })
    }

    pub fn fixture(&self) -> &CaseFixture {
        &self.fixture
    }

    pub fn info(&self) -> CaseInfo {
        CaseInfo {
            case_type: self.fixture.case_type.clone(),
            title: self.fixture.title.clone(),
            summary: self.fixture.summary.clone(),
        }
    }

    /// First rule whose pattern matches `text`, in table order.
    pub fn matching_rule(&self, text: &str) -> Option<&ResponseRule> {
        self.patterns
            .iter()
            .position(|pattern| pattern.is_match(text))
            .map(|idx| &self.fixture.rules[idx])
    }

    /// Pick the canned answer for `text` given the rules already asked.
    pub fn reply(&self, text: &str, asked: &BTreeSet<String>) -> Reply<'_> {
        match self.matching_rule(text) {
            Some(rule) => {
                let text = match &rule.repeat_response {
                    Some(repeat) if asked.contains(&rule.key) => repeat.as_str(),
                    _ => rule.response.as_str(),
                };
                Reply { text, rule_key: Some(rule.key.as_str()) }
            }
            None => Reply { text: &self.fixture.fallback_response, rule_key: None },
        }
    }

    /// Case-insensitive substring check of the expected answer (or an alias)
    /// inside the submission.
    pub fn is_correct(&self, submission: &str) -> bool {
        let submission = submission.trim().to_lowercase();
        if submission.is_empty() {
            return false;
        }
        std::iter::once(&self.fixture.expected_diagnosis)
            .chain(&self.fixture.accepted_aliases)
            .map(|answer| answer.trim().to_lowercase())
            .any(|answer| !answer.is_empty() && submission.contains(&answer))
    }
}

/// All cases the service can run, keyed by case type.
#[derive(Debug)]
pub struct CaseCatalog {
    cases: Vec<Case>,
}

impl CaseCatalog {
    pub fn from_fixtures(fixtures: Vec<CaseFixture>) -> Result<Self, ConfigError> {
        if fixtures.is_empty() {
            return Err(ConfigError::Validation("at least one case fixture is required".into()));
        }

        let mut seen = HashSet::new();
        let mut cases = Vec::with_capacity(fixtures.len());
        for fixture in fixtures {
            if !seen.insert(fixture.case_type.to_lowercase()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate caseType '{}'",
                    fixture.case_type
                )));
            }
            cases.push(Case::compile(fixture)?);
        }

        Ok(Self { cases })
    }

    /// Load fixtures from a JSON array file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile { path: path.to_path_buf(), source: e })?;
        let fixtures: Vec<CaseFixture> = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: path.to_path_buf(), source: e })?;
        let catalog = Self::from_fixtures(fixtures)?;
        info!("Loaded {} case fixture(s) from {:?}", catalog.cases.len(), path);
        Ok(catalog)
    }

    pub fn builtin() -> Self {
        Self::from_fixtures(builtin_fixtures()).expect("built-in case fixtures are valid")
    }

    /// Case-insensitive lookup by case type.
    pub fn get(&self, case_type: &str) -> Option<&Case> {
        let case_type = case_type.trim();
        self.cases
            .iter()
            .find(|case| case.fixture.case_type.eq_ignore_ascii_case(case_type))
    }

    pub fn list(&self) -> Vec<CaseInfo> {
        self.cases.iter().map(Case::info).collect()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

impl Default for CaseCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
