// Runner invocation for bruno-runner
//
// Builds `bru run` arguments, runs the CLI from the collection root with a
// timeout, and recovers a structured result from the JSON output file or
// from stdout. A non-zero exit code means failing tests, not a failed run,
// so output parsing always proceeds.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempPath;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::discovery::{CollectionDiscoverer, REQUEST_EXTENSION};
use crate::error::{BrunoError, Result};
use crate::models::{RunOptions, RunResult};
use crate::normalize::{extract_json, normalize, parse_runner_json, NormalizedRun};
use crate::security::mask_secrets;

const NOT_AT_ROOT_MARKER: &str = "root of a collection";

pub struct RequestExecutor {
    program: String,
    program_args: Vec<String>,
    request_timeout: Duration,
    collection_timeout: Duration,
    discoverer: Arc<CollectionDiscoverer>,
}

impl RequestExecutor {
    pub fn new(config: &Config, discoverer: Arc<CollectionDiscoverer>) -> Self {
        Self {
            program: config.bruno_cli_path.clone(),
            program_args: config.bruno_cli_args.clone(),
            request_timeout: config.request_timeout(),
            collection_timeout: config.collection_timeout(),
            discoverer,
        }
    }

    /// Runs one request, located by name inside the collection.
    pub async fn run_request(
        &self,
        root: &Path,
        request_name: &str,
        options: &RunOptions,
    ) -> Result<RunResult> {
        let file = self
            .discoverer
            .find_request_file(root, request_name)?
            .ok_or_else(|| BrunoError::RequestNotFound {
                name: request_name.to_string(),
                collection: root.to_path_buf(),
            })?;
        let target = relative_target(root, &file);
        self.execute(root, &target, false, options, self.request_timeout)
            .await
    }

    /// Runs the whole collection, or `options.folder_path` inside it.
    pub async fn run_collection(&self, root: &Path, options: &RunOptions) -> Result<RunResult> {
        if !root.is_dir() {
            return Err(BrunoError::NotFound {
                path: root.to_path_buf(),
            });
        }
        let target = options
            .folder_path
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(".")
            .to_string();
        let recursive = options.recursive.unwrap_or(true);
        self.execute(root, &target, recursive, options, self.collection_timeout)
            .await
    }

    async fn execute(
        &self,
        root: &Path,
        target: &str,
        recursive: bool,
        options: &RunOptions,
        limit: Duration,
    ) -> Result<RunResult> {
        let output_file = temp_output_path()?;
        let args = build_args(target, recursive, &output_file, options);

        info!(
            program = %self.program,
            args = %mask_secrets(&redacted_args(&args).join(" ")),
            cwd = %root.display(),
            "invoking bruno cli"
        );

        let mut command = Command::new(&self.program);
        command
            .args(&self.program_args)
            .args(&args)
            .current_dir(root)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match timeout(limit, command.output()).await {
            Err(_) => {
                warn!(timeout_ms = limit.as_millis() as u64, "bruno cli timed out");
                return Err(BrunoError::ExecutionTimeout {
                    timeout_ms: limit.as_millis() as u64,
                });
            }
            Ok(Err(e)) => return Err(self.spawn_failure(e)),
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_code = output.status.code();
        debug!(?exit_code, "bruno cli finished");

        let from_file = if options.has_custom_reporters() {
            None
        } else {
            read_output_file(&output_file)
        };
        if let Err(e) = output_file.close() {
            warn!(error = %e, "failed to remove temporary output file");
        }

        let parsed = from_file.or_else(|| {
            let run = extract_json(&stdout).and_then(|value| normalize(&value));
            if run.is_some() {
                debug!("parsed runner output from stdout");
            }
            run
        });

        match (exit_code, parsed) {
            (code, Some(run)) => Ok(structured_result(stdout, stderr, code.unwrap_or(-1), run)),
            (Some(code), None) => {
                if code != 0 {
                    if let Some(err) = classify_failure(root, &self.program, code, &stdout, &stderr) {
                        return Err(err);
                    }
                }
                debug!("runner output was not JSON, returning raw output");
                Ok(RunResult {
                    stdout,
                    stderr,
                    exit_code: code,
                    summary: None,
                    results: None,
                })
            }
            (None, None) => {
                // Terminated by a signal.
                if stderr.trim().is_empty() {
                    Err(BrunoError::UnknownExecutionError {
                        message: "Bruno CLI was terminated without an exit code".to_string(),
                    })
                } else {
                    Err(BrunoError::RunnerError {
                        stderr: stderr.trim().to_string(),
                    })
                }
            }
        }
    }

    fn spawn_failure(&self, error: std::io::Error) -> BrunoError {
        if error.kind() == std::io::ErrorKind::NotFound {
            BrunoError::RunnerNotFound {
                program: self.program.clone(),
            }
        } else {
            BrunoError::UnknownExecutionError {
                message: error.to_string(),
            }
        }
    }
}

fn temp_output_path() -> Result<TempPath> {
    tempfile::Builder::new()
        .prefix("bruno-result-")
        .suffix(".json")
        .tempfile()
        .map(|file| file.into_temp_path())
        .map_err(|e| BrunoError::UnknownExecutionError {
            message: format!("failed to create temporary output file: {}", e),
        })
}

fn read_output_file(path: &Path) -> Option<NormalizedRun> {
    match std::fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => {
            let run = parse_runner_json(&text);
            if run.is_none() {
                debug!(file = %path.display(), "output file did not hold runner JSON");
            }
            run
        }
        Ok(_) => None,
        Err(e) => {
            debug!(file = %path.display(), error = %e, "output file not readable");
            None
        }
    }
}

fn structured_result(stdout: String, stderr: String, exit_code: i32, run: NormalizedRun) -> RunResult {
    RunResult {
        stdout,
        stderr,
        exit_code,
        summary: Some(run.summary),
        results: Some(run.results),
    }
}

/// Maps a non-zero exit without parseable output to an execution error.
/// `None` means the run completed and its raw output should be returned.
fn classify_failure(
    root: &Path,
    program: &str,
    code: i32,
    stdout: &str,
    stderr: &str,
) -> Option<BrunoError> {
    let lowered = format!("{}\n{}", stdout, stderr).to_lowercase();
    if lowered.contains(NOT_AT_ROOT_MARKER) {
        return Some(BrunoError::NotACollectionRoot {
            path: root.to_path_buf(),
        });
    }
    if code == 127 || lowered.contains("command not found") {
        return Some(BrunoError::RunnerNotFound {
            program: program.to_string(),
        });
    }
    if stdout.trim().is_empty() && !stderr.trim().is_empty() {
        return Some(BrunoError::RunnerError {
            stderr: stderr.trim().to_string(),
        });
    }
    None
}

/// Request path relative to the collection root, with `/` separators.
fn relative_target(root: &Path, file: &Path) -> String {
    file.strip_prefix(root)
        .unwrap_or(file)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Arguments for `bru run`, in the order the CLI documents them.
pub fn build_args(target: &str, recursive: bool, output: &Path, options: &RunOptions) -> Vec<String> {
    let mut args = vec!["run".to_string(), target.to_string()];
    if recursive {
        args.push("-r".to_string());
    }
    if let Some(env) = options.environment.as_deref().filter(|e| !e.trim().is_empty()) {
        args.push("--env".to_string());
        args.push(normalize_environment_name(env));
    }
    for (key, value) in &options.env_variables {
        args.push("--env-var".to_string());
        args.push(format!("{}={}", key, value));
    }
    args.push("--format".to_string());
    args.push("json".to_string());
    args.push("--output".to_string());
    args.push(output.display().to_string());
    if options.tests_only == Some(true) {
        args.push("--tests-only".to_string());
    }
    if options.bail == Some(true) {
        args.push("--bail".to_string());
    }
    let reporters: [(&str, &Option<PathBuf>); 3] = [
        ("--reporter-json", &options.reporter_json),
        ("--reporter-junit", &options.reporter_junit),
        ("--reporter-html", &options.reporter_html),
    ];
    for (flag, path) in reporters {
        if let Some(path) = path {
            args.push(flag.to_string());
            args.push(path.display().to_string());
        }
    }
    args
}

/// Arguments safe to log: every `--env-var` override value is replaced.
pub fn redacted_args(args: &[String]) -> Vec<String> {
    let mut redacted = Vec::with_capacity(args.len());
    let mut after_env_var = false;
    for arg in args {
        if after_env_var {
            redacted.push(redact_override(arg));
        } else {
            redacted.push(arg.clone());
        }
        after_env_var = arg == "--env-var";
    }
    redacted
}

/// `KEY=VALUE` becomes `KEY=***`.
fn redact_override(pair: &str) -> String {
    match pair.split_once('=') {
        Some((key, _)) => format!("{}=***", key),
        None => "***".to_string(),
    }
}

/// The CLI wants a bare environment name: paths are reduced to the file
/// stem and a trailing `.bru` is dropped.
pub fn normalize_environment_name(env: &str) -> String {
    let is_path = Path::new(env).is_absolute() || env.contains('/') || env.contains('\\');
    if is_path {
        let base = env.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(env);
        return match base.rfind('.') {
            Some(dot) if dot > 0 => base[..dot].to_string(),
            _ => base.to_string(),
        };
    }
    env.strip_suffix(&format!(".{}", REQUEST_EXTENSION))
        .unwrap_or(env)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn environment_names_are_bare() {
        assert_eq!(normalize_environment_name("local"), "local");
        assert_eq!(normalize_environment_name("local.bru"), "local");
        assert_eq!(normalize_environment_name("/abs/environments/prod.bru"), "prod");
        assert_eq!(normalize_environment_name("environments/staging.bru"), "staging");
        assert_eq!(normalize_environment_name("environments\\dev.bru"), "dev");
        assert_eq!(normalize_environment_name("my.env"), "my.env");
    }

    #[test]
    fn collection_args_include_every_option() {
        let mut env_variables = BTreeMap::new();
        env_variables.insert("HOST".to_string(), "localhost".to_string());
        env_variables.insert("PORT".to_string(), "8080".to_string());
        let options = RunOptions {
            environment: Some("environments/local.bru".to_string()),
            env_variables,
            tests_only: Some(true),
            bail: Some(true),
            reporter_junit: Some(PathBuf::from("/tmp/junit.xml")),
            ..Default::default()
        };
        let args = build_args("users", true, Path::new("/tmp/out.json"), &options);
        assert_eq!(
            args,
            vec![
                "run", "users", "-r", "--env", "local", "--env-var", "HOST=localhost",
                "--env-var", "PORT=8080", "--format", "json", "--output", "/tmp/out.json",
                "--tests-only", "--bail", "--reporter-junit", "/tmp/junit.xml",
            ]
        );
    }

    #[test]
    fn request_args_are_minimal() {
        let args = build_args("Get Users.bru", false, Path::new("/tmp/o.json"), &RunOptions::default());
        assert_eq!(
            args,
            vec!["run", "Get Users.bru", "--format", "json", "--output", "/tmp/o.json"]
        );
    }

    #[test]
    fn logged_args_hide_override_values() {
        let mut env_variables = BTreeMap::new();
        env_variables.insert("DB_URL".to_string(), "postgres://admin:hunter2@db".to_string());
        env_variables.insert("AUTH".to_string(), "Basic c2VjcmV0".to_string());
        let options = RunOptions {
            env_variables,
            ..Default::default()
        };
        let args = build_args(".", true, Path::new("/tmp/o.json"), &options);
        let line = mask_secrets(&redacted_args(&args).join(" "));

        assert!(!line.contains("hunter2"));
        assert!(!line.contains("c2VjcmV0"));
        assert!(line.contains("--env-var AUTH=*** --env-var DB_URL=***"));
        assert!(line.contains("--output /tmp/o.json"));
        assert_eq!(args[4], "AUTH=Basic c2VjcmV0");
    }

    #[test]
    fn failure_classification() {
        let root = Path::new("/c");
        assert!(matches!(
            classify_failure(root, "bru", 1, "", "You can run only at the root of a collection"),
            Some(BrunoError::NotACollectionRoot { .. })
        ));
        assert!(matches!(
            classify_failure(root, "bru", 127, "", "sh: bru: command not found"),
            Some(BrunoError::RunnerNotFound { .. })
        ));
        assert!(matches!(
            classify_failure(root, "bru", 1, "", "boom"),
            Some(BrunoError::RunnerError { .. })
        ));
        assert!(classify_failure(root, "bru", 1, "2 tests failed", "").is_none());
    }

    #[test]
    fn targets_are_relative_to_root() {
        assert_eq!(
            relative_target(Path::new("/c"), Path::new("/c/users/Get.bru")),
            "users/Get.bru"
        );
    }
}
