// Structural validation of a whole collection
// Every problem lands in the report; nothing here returns an error.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::discovery::{CollectionDiscoverer, MANIFEST_FILE};
use crate::environments::EnvironmentResolver;
use crate::models::{CollectionSummary, CollectionValidationResult};
use crate::parsers::bruno::BruFileParser;

pub struct CollectionValidator {
    discoverer: Arc<CollectionDiscoverer>,
    environments: Arc<EnvironmentResolver>,
    parser: BruFileParser,
}

impl CollectionValidator {
    pub fn new(discoverer: Arc<CollectionDiscoverer>, environments: Arc<EnvironmentResolver>) -> Self {
        Self {
            discoverer,
            environments,
            parser: BruFileParser,
        }
    }

    pub fn validate_collection(&self, root: &Path) -> CollectionValidationResult {
        let mut report = CollectionValidationResult::default();

        if !root.is_dir() {
            report
                .errors
                .push(format!("Collection directory does not exist: {}", root.display()));
            return report;
        }

        let manifest = root.join(MANIFEST_FILE);
        if !manifest.is_file() {
            report
                .errors
                .push(format!("{} not found in collection root", MANIFEST_FILE));
            return report;
        }
        report.summary.has_manifest = true;
        self.check_manifest(&manifest, &mut report);

        match self.discoverer.list_requests(root) {
            Ok(requests) => {
                report.summary.total_requests = requests.len();
                if requests.is_empty() {
                    report.warnings.push("No requests found in collection".to_string());
                }
                for request in &requests {
                    match self.parser.parse_request_file(&request.file_path) {
                        Ok(_) => report.summary.valid_requests += 1,
                        Err(e) => {
                            report.summary.invalid_requests += 1;
                            report
                                .errors
                                .push(format!("Invalid request '{}': {}", request.name, e));
                        }
                    }
                }
            }
            Err(e) => report.errors.push(format!("Failed to list requests: {}", e)),
        }

        self.check_environments(root, &mut report.summary, &mut report.warnings);

        report.valid = report.errors.is_empty();
        info!(
            collection = %root.display(),
            valid = report.valid,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "validated collection"
        );
        report
    }

    fn check_manifest(&self, manifest: &Path, report: &mut CollectionValidationResult) {
        let text = match std::fs::read_to_string(manifest) {
            Ok(text) => text,
            Err(e) => {
                report.errors.push(format!("Failed to read {}: {}", MANIFEST_FILE, e));
                return;
            }
        };
        let json: Value = match serde_json::from_str(&text) {
            Ok(json) => json,
            Err(e) => {
                report.errors.push(format!("Invalid JSON in {}: {}", MANIFEST_FILE, e));
                return;
            }
        };

        if json.get("version").is_none() {
            report
                .warnings
                .push(format!("{} is missing the 'version' field", MANIFEST_FILE));
        }
        if json.get("name").is_none() {
            report
                .warnings
                .push(format!("{} is missing the 'name' field", MANIFEST_FILE));
        }
        match json.get("type").and_then(Value::as_str) {
            Some("collection") => {}
            Some(other) => report.errors.push(format!(
                "{} has type '{}', expected 'collection'",
                MANIFEST_FILE, other
            )),
            None => report
                .errors
                .push(format!("{} is missing the 'type' field", MANIFEST_FILE)),
        }
    }

    /// Environment problems are warnings at collection level.
    fn check_environments(&self, root: &Path, summary: &mut CollectionSummary, warnings: &mut Vec<String>) {
        let environments = match self.environments.list_environments(root) {
            Ok(environments) => environments,
            Err(e) => {
                warnings.push(format!("Could not read environments: {}", e));
                return;
            }
        };

        summary.environments = environments.len();
        if environments.is_empty() {
            warnings.push("No environments defined".to_string());
            return;
        }
        for env in &environments {
            let result = self.environments.validate_environment(root, &env.name);
            for problem in result.errors.iter().chain(result.warnings.iter()) {
                warnings.push(format!("Environment '{}': {}", env.name, problem));
            }
        }
    }
}
