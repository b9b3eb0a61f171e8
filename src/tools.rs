// Tool surface for bruno-runner
//
// BrunoTools wires the services together and exposes the nine operations a
// transport calls. Every operation checks its paths against the allow-list,
// returns formatted text, and masks secrets in anything it surfaces.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::cache::{PerformanceManager, RunKind};
use crate::config::Config;
use crate::discovery::CollectionDiscoverer;
use crate::environments::EnvironmentResolver;
use crate::error::{BrunoError, Result};
use crate::executor::{normalize_environment_name, RequestExecutor};
use crate::models::{HealthReport, RunOptions, RunResult};
use crate::parsers::bruno::BruFileParser;
use crate::reporting;
use crate::security::{ensure_path_allowed, mask_secrets};
use crate::validator::CollectionValidator;

const DEFAULT_DISCOVERY_DEPTH: usize = 5;
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequestParams {
    pub collection_path: PathBuf,
    pub request_name: String,
    #[serde(flatten)]
    pub options: RunOptions,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCollectionParams {
    pub collection_path: PathBuf,
    #[serde(flatten)]
    pub options: RunOptions,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionParams {
    pub collection_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverParams {
    pub search_path: PathBuf,
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentParams {
    pub collection_path: PathBuf,
    pub environment_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParams {
    pub collection_path: PathBuf,
    pub request_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthParams {
    #[serde(default)]
    pub include_metrics: bool,
    #[serde(default)]
    pub include_cache_stats: bool,
}

pub struct BrunoTools {
    config: Config,
    performance: Arc<PerformanceManager>,
    discoverer: Arc<CollectionDiscoverer>,
    environments: Arc<EnvironmentResolver>,
    executor: RequestExecutor,
    validator: CollectionValidator,
    parser: BruFileParser,
}

impl BrunoTools {
    pub fn new(config: Config) -> Self {
        let performance = Arc::new(PerformanceManager::new(
            config.cache_enabled,
            config.cache_ttl(),
        ));
        let discoverer = Arc::new(CollectionDiscoverer::new(performance.clone()));
        let environments = Arc::new(EnvironmentResolver::new());
        let executor = RequestExecutor::new(&config, discoverer.clone());
        let validator = CollectionValidator::new(discoverer.clone(), environments.clone());
        Self {
            config,
            performance,
            discoverer,
            environments,
            executor,
            validator,
            parser: BruFileParser,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn performance(&self) -> &PerformanceManager {
        &self.performance
    }

    /// Error text safe to show to a caller.
    pub fn describe_error(&self, error: &BrunoError) -> String {
        self.surface(error.to_string())
    }

    pub async fn run_request(&self, params: RunRequestParams) -> Result<String> {
        let root = params.collection_path.as_path();
        self.check_path(root)?;
        if params.dry_run {
            return self.dry_run_request(root, &params.request_name, &params.options);
        }

        let started = Instant::now();
        let outcome = self
            .executor
            .run_request(root, &params.request_name, &params.options)
            .await;
        self.record(RunKind::Request, started, &outcome);
        let result = outcome?;
        let title = format!("Request: {}", params.request_name);
        Ok(self.surface(reporting::format_run_result(&title, &result)))
    }

    pub async fn run_collection(&self, params: RunCollectionParams) -> Result<String> {
        let root = params.collection_path.as_path();
        self.check_path(root)?;
        if params.dry_run {
            return self.dry_run_collection(root, &params.options);
        }

        let started = Instant::now();
        let outcome = self.executor.run_collection(root, &params.options).await;
        self.record(RunKind::Collection, started, &outcome);
        let result = outcome?;
        let title = match params.options.folder_path.as_deref() {
            Some(folder) if !folder.trim().is_empty() => format!("Collection folder: {}", folder),
            _ => format!("Collection: {}", root.display()),
        };
        Ok(self.surface(reporting::format_run_result(&title, &result)))
    }

    pub fn list_requests(&self, params: CollectionParams) -> Result<String> {
        let root = params.collection_path.as_path();
        self.check_path(root)?;
        let requests = self.discoverer.list_requests(root)?;
        Ok(self.surface(reporting::format_request_list(root, &requests)))
    }

    pub fn discover_collections(&self, params: DiscoverParams) -> Result<String> {
        let search_root = params.search_path.as_path();
        self.check_path(search_root)?;
        let depth = params.max_depth.unwrap_or(DEFAULT_DISCOVERY_DEPTH);
        let roots = self.discoverer.discover_collections(search_root, depth)?;
        Ok(reporting::format_collections(search_root, &roots))
    }

    pub fn list_environments(&self, params: CollectionParams) -> Result<String> {
        let root = params.collection_path.as_path();
        self.check_path(root)?;
        require_dir(root)?;
        let environments = self.environments.list_environments(root)?;
        Ok(self.surface(reporting::format_environments(root, &environments)))
    }

    pub fn validate_environment(&self, params: EnvironmentParams) -> Result<String> {
        let root = params.collection_path.as_path();
        self.check_path(root)?;
        require_dir(root)?;
        let name = normalize_environment_name(&params.environment_name);
        let validation = self.environments.validate_environment(root, &name);
        Ok(self.surface(reporting::format_environment_validation(&name, &validation)))
    }

    pub fn get_request_details(&self, params: RequestParams) -> Result<String> {
        let root = params.collection_path.as_path();
        self.check_path(root)?;
        let file = self.locate_request(root, &params.request_name)?;
        let details = self.parser.parse_request_file(&file)?;
        Ok(self.surface(reporting::format_request_details(&details)))
    }

    pub fn validate_collection(&self, params: CollectionParams) -> Result<String> {
        let root = params.collection_path.as_path();
        self.check_path(root)?;
        let result = self.validator.validate_collection(root);
        Ok(self.surface(reporting::format_collection_validation(root, &result)))
    }

    pub async fn health_check(&self, params: HealthParams) -> Result<String> {
        let mut report = HealthReport {
            checked_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            program: self.config.bruno_cli_path.clone(),
            request_timeout_ms: self.config.request_timeout_ms,
            collection_timeout_ms: self.config.collection_timeout_ms,
            mask_secrets: self.config.mask_secrets,
            allowed_paths: self.config.allowed_paths.clone(),
            ..Default::default()
        };

        match self.runner_version().await {
            Ok(version) => {
                report.runner_available = true;
                report.runner_version = Some(version);
            }
            Err(error) => report.runner_error = Some(error.to_string()),
        }
        if params.include_metrics {
            report.metrics = Some(self.performance.metrics());
        }
        if params.include_cache_stats {
            report.cache = Some(self.performance.get_cache_stats());
        }

        info!(available = report.runner_available, "health check");
        Ok(self.surface(reporting::format_health(&report)))
    }

    async fn runner_version(&self) -> Result<String> {
        let mut command = Command::new(&self.config.bruno_cli_path);
        command
            .args(&self.config.bruno_cli_args)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match timeout(VERSION_CHECK_TIMEOUT, command.output()).await {
            Err(_) => {
                return Err(BrunoError::ExecutionTimeout {
                    timeout_ms: VERSION_CHECK_TIMEOUT.as_millis() as u64,
                })
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BrunoError::RunnerNotFound {
                    program: self.config.bruno_cli_path.clone(),
                })
            }
            Ok(Err(e)) => {
                return Err(BrunoError::UnknownExecutionError {
                    message: e.to_string(),
                })
            }
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BrunoError::RunnerError {
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("unknown")
            .to_string())
    }

    fn dry_run_request(&self, root: &Path, name: &str, options: &RunOptions) -> Result<String> {
        let file = self.locate_request(root, name)?;
        let details = self.parser.parse_request_file(&file)?;

        let mut out = String::from("=== DRY RUN: request validated, not executed ===\n");
        out.push_str(&format!("File: {}\n", file.display()));
        push_run_options(&mut out, options);
        out.push('\n');
        out.push_str(&reporting::format_request_details(&details));
        debug!(request = %name, "dry run for request");
        Ok(self.surface(out))
    }

    fn dry_run_collection(&self, root: &Path, options: &RunOptions) -> Result<String> {
        let mut requests = self.discoverer.list_requests(root)?;
        if let Some(folder) = options.folder_path.as_deref().filter(|f| !f.trim().is_empty()) {
            let folder = folder.trim_matches('/');
            requests.retain(|r| {
                r.folder.as_deref().map_or(false, |f| {
                    f == folder || f.starts_with(&format!("{}/", folder))
                })
            });
        }

        let mut out = String::from("=== DRY RUN: collection validated, not executed ===\n");
        push_run_options(&mut out, options);
        out.push('\n');
        out.push_str(&reporting::format_request_list(root, &requests));
        debug!(collection = %root.display(), count = requests.len(), "dry run for collection");
        Ok(self.surface(out))
    }

    fn locate_request(&self, root: &Path, name: &str) -> Result<PathBuf> {
        self.discoverer
            .find_request_file(root, name)?
            .ok_or_else(|| BrunoError::RequestNotFound {
                name: name.to_string(),
                collection: root.to_path_buf(),
            })
    }

    fn check_path(&self, path: &Path) -> Result<()> {
        ensure_path_allowed(path, &self.config.allowed_paths).map_err(|e| {
            warn!(path = %path.display(), "rejected path outside allowed roots");
            e
        })
    }

    /// A run counts as successful when the runner finished with exit code 0.
    fn record(&self, kind: RunKind, started: Instant, outcome: &Result<RunResult>) {
        let success = matches!(outcome, Ok(result) if result.exit_code == 0);
        self.performance.record_run(kind, started.elapsed(), success);
    }

    fn surface(&self, text: String) -> String {
        if self.config.mask_secrets {
            mask_secrets(&text)
        } else {
            text
        }
    }
}

fn require_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(BrunoError::NotFound {
            path: path.to_path_buf(),
        })
    }
}

fn push_run_options(out: &mut String, options: &RunOptions) {
    if let Some(env) = options.environment.as_deref() {
        out.push_str(&format!("Environment: {}\n", normalize_environment_name(env)));
    }
    if !options.env_variables.is_empty() {
        out.push_str("Environment overrides:\n");
        for key in options.env_variables.keys() {
            out.push_str(&format!("  {}=***\n", key));
        }
    }
    let flags: [(&str, Option<bool>); 3] = [
        ("recursive", options.recursive),
        ("tests only", options.tests_only),
        ("bail", options.bail),
    ];
    for (label, value) in flags {
        if let Some(value) = value {
            out.push_str(&format!("Option {}: {}\n", label, value));
        }
    }
}
