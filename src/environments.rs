// Environment files for bruno-runner
// Lists <collection>/environments/*.bru and flags hardcoded secrets.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::discovery::{ENVIRONMENTS_DIR, REQUEST_EXTENSION};
use crate::error::{BrunoError, Result};
use crate::models::{Environment, EnvironmentValidation};
use crate::parsers::bruno::{file_stem, BruFileParser};

const SENSITIVE_KEYS: &[&str] = &["password", "secret", "token", "api_key", "apikey", "api-key"];

pub struct EnvironmentResolver {
    parser: BruFileParser,
}

impl Default for EnvironmentResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentResolver {
    pub fn new() -> Self {
        Self {
            parser: BruFileParser,
        }
    }

    pub fn environment_path(root: &Path, name: &str) -> PathBuf {
        root.join(ENVIRONMENTS_DIR)
            .join(format!("{}.{}", name, REQUEST_EXTENSION))
    }

    /// Environments sorted by name. A missing `environments/` directory is an empty list.
    pub fn list_environments(&self, root: &Path) -> Result<Vec<Environment>> {
        let dir = root.join(ENVIRONMENTS_DIR);
        if !dir.is_dir() {
            debug!(collection = %root.display(), "no environments directory");
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&dir).map_err(|e| BrunoError::io(&dir, e))?;
        let mut environments = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            let is_env_file = path.is_file()
                && path.extension().map_or(false, |ext| ext == REQUEST_EXTENSION);
            if !is_env_file {
                continue;
            }
            let variables = match std::fs::read_to_string(&path) {
                Ok(text) => Some(self.parser.parse_environment_variables(&text)),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "could not read environment file");
                    None
                }
            };
            environments.push(Environment {
                name: file_stem(&path),
                path,
                variables,
            });
        }
        environments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(environments)
    }

    /// Structural checks for one environment; every applicable warning is reported.
    pub fn validate_environment(&self, root: &Path, name: &str) -> EnvironmentValidation {
        let path = Self::environment_path(root, name);
        if !path.is_file() {
            return EnvironmentValidation {
                valid: false,
                exists: false,
                errors: vec![format!("Environment file not found: {}", path.display())],
                warnings: Vec::new(),
                variables: None,
            };
        }

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                return EnvironmentValidation {
                    valid: false,
                    exists: true,
                    errors: vec![format!("Failed to read environment file: {}", e)],
                    warnings: Vec::new(),
                    variables: None,
                };
            }
        };

        let variables = self.parser.parse_environment_variables(&text);
        let mut warnings = Vec::new();

        if !self.parser.has_vars_block(&text) {
            warnings.push("No vars block found in environment file".to_string());
        }
        if variables.is_empty() {
            warnings.push("Environment has no variables defined".to_string());
        }
        for (key, value) in &variables {
            if is_sensitive_key(key) && !is_template_reference(value) {
                warnings.push(format!(
                    "Variable '{}' may contain a hardcoded secret; consider a {{{{variable}}}} reference or a secret variable",
                    key
                ));
            }
        }

        EnvironmentValidation {
            valid: true,
            exists: true,
            errors: Vec::new(),
            warnings,
            variables: Some(variables),
        }
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_lowercase();
    SENSITIVE_KEYS.iter().any(|s| key.contains(s))
}

/// `{{name}}` templates and `$VAR` / `${VAR}` shell expansions.
fn is_template_reference(value: &str) -> bool {
    value.starts_with("{{") || value.starts_with('$')
}
