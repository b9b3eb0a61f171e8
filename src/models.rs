// Core data models for bruno-runner
// Value objects built fresh per call and handed to the formatters.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::cache::{CacheStats, RunMetrics};

/// Supported HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    OPTIONS,
    HEAD,
}

impl Default for Method {
    fn default() -> Self {
        Method::GET
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::GET => write!(f, "GET"),
            Method::POST => write!(f, "POST"),
            Method::PUT => write!(f, "PUT"),
            Method::DELETE => write!(f, "DELETE"),
            Method::PATCH => write!(f, "PATCH"),
            Method::OPTIONS => write!(f, "OPTIONS"),
            Method::HEAD => write!(f, "HEAD"),
        }
    }
}

impl FromStr for Method {
    type Err = String;

    /// Parses a method name case-insensitively (`get`, `Post`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "DELETE" => Ok(Method::DELETE),
            "PATCH" => Ok(Method::PATCH),
            "OPTIONS" => Ok(Method::OPTIONS),
            "HEAD" => Ok(Method::HEAD),
            other => Err(format!("unsupported method: {}", other)),
        }
    }
}

/// Cheap header information read during discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicInfo {
    pub name: Option<String>,
    pub method: Option<Method>,
    pub url: Option<String>,
}

/// One request file found under a collection root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<Method>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Directory relative to the collection root, absent at the root itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    pub file_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BodyDetails {
    #[serde(rename = "type")]
    pub body_type: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestMetadata {
    #[serde(rename = "type")]
    pub request_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u32>,
}

impl Default for RequestMetadata {
    fn default() -> Self {
        Self {
            request_type: "http".to_string(),
            seq: None,
        }
    }
}

/// Full introspection result for a single request file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    pub name: String,
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub query_params: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyDetails>,
    pub auth: String,
    pub tests: Vec<String>,
    pub metadata: RequestMetadata,
}

impl Default for RequestDetails {
    fn default() -> Self {
        Self {
            name: String::new(),
            method: Method::GET,
            url: String::new(),
            headers: BTreeMap::new(),
            query_params: BTreeMap::new(),
            body: None,
            auth: "none".to_string(),
            tests: Vec::new(),
            metadata: RequestMetadata::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    pub name: String,
    pub path: PathBuf,
    /// Absent when the file could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnvironmentValidation {
    pub valid: bool,
    pub exists: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, String>>,
}

/// Options for a runner invocation. Absent fields use the runner's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    pub environment: Option<String>,
    #[serde(default)]
    pub env_variables: BTreeMap<String, String>,
    pub folder_path: Option<String>,
    pub recursive: Option<bool>,
    pub tests_only: Option<bool>,
    pub bail: Option<bool>,
    pub reporter_json: Option<PathBuf>,
    pub reporter_junit: Option<PathBuf>,
    pub reporter_html: Option<PathBuf>,
}

impl RunOptions {
    pub fn has_custom_reporters(&self) -> bool {
        self.reporter_json.is_some() || self.reporter_junit.is_some() || self.reporter_html.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_requests: u64,
    pub passed_requests: u64,
    pub failed_requests: u64,
    /// Milliseconds.
    pub total_duration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionOutcome {
    pub name: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeRequest {
    pub method: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeResponse {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    pub response_time: u64,
}

/// Normalized outcome of one request inside a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestOutcome {
    pub name: String,
    pub passed: bool,
    pub status: u16,
    /// Milliseconds.
    pub duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<OutcomeRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<OutcomeResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertions: Option<Vec<AssertionOutcome>>,
}

/// Result of a runner invocation. `summary` and `results` are only present
/// when the runner's output could be parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<RequestOutcome>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    #[serde(rename = "hasBrunoJson")]
    pub has_manifest: bool,
    pub total_requests: usize,
    pub valid_requests: usize,
    pub invalid_requests: usize,
    pub environments: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub summary: CollectionSummary,
}

/// Runner availability plus the effective configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub checked_at: String,
    pub program: String,
    pub runner_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner_error: Option<String>,
    pub request_timeout_ms: u64,
    pub collection_timeout_ms: u64,
    pub mask_secrets: bool,
    pub allowed_paths: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<RunMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("get".parse::<Method>(), Ok(Method::GET));
        assert_eq!("Options".parse::<Method>(), Ok(Method::OPTIONS));
        assert!("trace".parse::<Method>().is_err());
    }

    #[test]
    fn request_details_defaults() {
        let details = RequestDetails::default();
        assert_eq!(details.method, Method::GET);
        assert_eq!(details.auth, "none");
        assert!(details.tests.is_empty());
        assert_eq!(details.metadata.request_type, "http");
    }

    #[test]
    fn run_options_deserialize_from_camel_case() {
        let options: RunOptions = serde_json::from_str(
            r#"{"environment":"local","envVariables":{"A":"1"},"testsOnly":true}"#,
        )
        .unwrap();
        assert_eq!(options.environment.as_deref(), Some("local"));
        assert_eq!(options.env_variables.get("A").map(String::as_str), Some("1"));
        assert_eq!(options.tests_only, Some(true));
        assert!(!options.has_custom_reporters());
    }

    #[test]
    fn collection_summary_uses_manifest_key() {
        let json = serde_json::to_value(CollectionSummary::default()).unwrap();
        assert_eq!(json["hasBrunoJson"], Value::Bool(false));
        assert!(json.get("totalRequests").is_some());
    }
}
