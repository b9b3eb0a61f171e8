#![cfg(unix)]
/// Integration tests for runner invocation
/// A generated shell script stands in for the Bruno CLI; it records the
/// arguments it was given next to itself so tests can inspect them.
use bruno_runner::cache::PerformanceManager;
use bruno_runner::config::Config;
use bruno_runner::discovery::CollectionDiscoverer;
use bruno_runner::error::BrunoError;
use bruno_runner::executor::RequestExecutor;
use bruno_runner::models::RunOptions;
use bruno_runner::tools::{BrunoTools, HealthParams, RunCollectionParams, RunRequestParams};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const FAILED_RUN_JSON: &str = r#"{
  "summary": {"totalRequests": 2, "passedRequests": 1, "failedRequests": 1, "totalDuration": 40},
  "results": [
    {"test": {"filename": "Get Users.bru"}, "response": {"status": 200, "responseTime": 15},
     "testResults": [{"description": "status is 200", "status": "pass"}]},
    {"test": {"filename": "users/Create User.bru"}, "response": {"status": 500, "responseTime": 25},
     "error": "Internal Server Error",
     "testResults": [{"description": "status is 201", "status": "fail", "error": "expected 500 to equal 201"}]}
  ]
}"#;

/// Script body that records its arguments and the `--output` path.
const RECORD_ARGS: &str = r#"dir=$(dirname "$0")
printf '%s\n' "$@" > "$dir/args.txt"
out=""
prev=""
for a in "$@"; do
  if [ "$prev" = "--output" ]; then out="$a"; fi
  prev="$a"
done
printf '%s' "$out" > "$dir/output_path.txt"
"#;

struct Fixture {
    collection: TempDir,
    scripts: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let collection = tempfile::tempdir().unwrap();
        let root = collection.path();
        fs::write(
            root.join("bruno.json"),
            r#"{"version":"1","name":"api","type":"collection"}"#,
        )
        .unwrap();
        fs::write(root.join("Get Users.bru"), "get {\n  url: /users\n}\n").unwrap();
        fs::create_dir_all(root.join("users")).unwrap();
        fs::write(
            root.join("users/Create User.bru"),
            "meta {\n  name: Create User\n}\n\npost {\n  url: /users\n}\n",
        )
        .unwrap();
        Self {
            collection,
            scripts: tempfile::tempdir().unwrap(),
        }
    }

    fn root(&self) -> &Path {
        self.collection.path()
    }

    /// Writes a runner script and returns a config that invokes it through `sh`.
    fn config(&self, body: &str) -> Config {
        let script = self.scripts.path().join("bru.sh");
        fs::write(&script, format!("{}{}", RECORD_ARGS, body)).unwrap();
        Config {
            bruno_cli_path: "sh".to_string(),
            bruno_cli_args: vec![script.display().to_string()],
            mask_secrets: true,
            ..Config::default()
        }
    }

    fn recorded_args(&self) -> Vec<String> {
        fs::read_to_string(self.scripts.path().join("args.txt"))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn recorded_output_path(&self) -> PathBuf {
        PathBuf::from(fs::read_to_string(self.scripts.path().join("output_path.txt")).unwrap())
    }
}

fn executor(config: &Config) -> RequestExecutor {
    let cache = Arc::new(PerformanceManager::new(false, Duration::from_secs(1)));
    RequestExecutor::new(config, Arc::new(CollectionDiscoverer::new(cache)))
}

fn failing_run_script() -> String {
    format!("cat > \"$out\" <<'JSON'\n{}\nJSON\nexit 1\n", FAILED_RUN_JSON)
}

#[tokio::test]
async fn test_failing_tests_still_produce_structured_result() {
    let fixture = Fixture::new();
    let config = fixture.config(&failing_run_script());

    let result = executor(&config)
        .run_collection(fixture.root(), &RunOptions::default())
        .await
        .unwrap();

    assert_eq!(result.exit_code, 1);
    let summary = result.summary.expect("summary");
    assert_eq!(summary.total_requests, 2);
    assert_eq!(summary.failed_requests, 1);

    let results = result.results.expect("results");
    assert_eq!(results[1].name, "users/Create User.bru");
    assert!(!results[1].passed);
    assert_eq!(results[1].status, 500);
    assert_eq!(results[1].error.as_deref(), Some("Internal Server Error"));

    let output = fixture.recorded_output_path();
    assert!(!output.as_os_str().is_empty());
    assert!(!output.exists(), "temp output file was not removed");
}

#[tokio::test]
async fn test_collection_run_arguments() {
    let fixture = Fixture::new();
    let config = fixture.config("exit 0\n");
    let mut options = RunOptions {
        environment: Some("local.bru".to_string()),
        folder_path: Some("users".to_string()),
        bail: Some(true),
        ..Default::default()
    };
    options
        .env_variables
        .insert("HOST".to_string(), "localhost".to_string());

    executor(&config)
        .run_collection(fixture.root(), &options)
        .await
        .unwrap();

    let args = fixture.recorded_args();
    assert_eq!(&args[..3], &["run", "users", "-r"]);
    assert!(args.windows(2).any(|w| w == ["--env", "local"]));
    assert!(args.windows(2).any(|w| w == ["--env-var", "HOST=localhost"]));
    assert!(args.windows(2).any(|w| w == ["--format", "json"]));
    assert!(args.contains(&"--bail".to_string()));
    assert!(!args.contains(&"--tests-only".to_string()));
}

#[tokio::test]
async fn test_request_run_targets_relative_file() {
    let fixture = Fixture::new();
    let config = fixture.config("exit 0\n");

    executor(&config)
        .run_request(fixture.root(), "create user", &RunOptions::default())
        .await
        .unwrap();

    let args = fixture.recorded_args();
    assert_eq!(&args[..2], &["run", "users/Create User.bru"]);
    assert!(!args.contains(&"-r".to_string()));
}

#[tokio::test]
async fn test_unknown_request_is_not_run() {
    let fixture = Fixture::new();
    let config = fixture.config("exit 0\n");

    let err = executor(&config)
        .run_request(fixture.root(), "Delete Everything", &RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, BrunoError::RequestNotFound { .. }));
    assert!(!fixture.scripts.path().join("args.txt").exists());
}

#[tokio::test]
async fn test_json_on_stdout_is_used_when_file_is_empty() {
    let fixture = Fixture::new();
    let config = fixture.config(
        "echo 'Running collection...'\necho '[{\"name\":\"Ping\",\"status\":204,\"duration\":3}]'\nexit 0\n",
    );

    let result = executor(&config)
        .run_collection(fixture.root(), &RunOptions::default())
        .await
        .unwrap();

    let summary = result.summary.expect("summary from stdout");
    assert_eq!(summary.total_requests, 1);
    let results = result.results.expect("results");
    assert_eq!(results[0].name, "Ping");
    assert_eq!(results[0].status, 204);
}

#[tokio::test]
async fn test_plain_output_is_returned_raw() {
    let fixture = Fixture::new();
    let config = fixture.config("echo 'all done'\nexit 0\n");

    let result = executor(&config)
        .run_collection(fixture.root(), &RunOptions::default())
        .await
        .unwrap();
    assert_eq!(result.exit_code, 0);
    assert!(result.summary.is_none());
    assert_eq!(result.stdout.trim(), "all done");
}

#[tokio::test]
async fn test_slow_runner_times_out() {
    let fixture = Fixture::new();
    let mut config = fixture.config("sleep 5\n");
    config.collection_timeout_ms = 200;

    let err = executor(&config)
        .run_collection(fixture.root(), &RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, BrunoError::ExecutionTimeout { timeout_ms: 200 }));

    let output = fixture.recorded_output_path();
    assert!(!output.as_os_str().is_empty());
    assert!(!output.exists(), "temp output file survived the timeout");
}

#[tokio::test]
async fn test_custom_reporter_reads_stdout_and_cleans_up() {
    let fixture = Fixture::new();
    let config = fixture.config(
        "echo '{not json' > \"$out\"\necho '{\"summary\":{\"total\":3,\"passed\":2,\"failed\":1}}'\nexit 1\n",
    );
    let options = RunOptions {
        reporter_junit: Some(fixture.scripts.path().join("junit.xml")),
        ..Default::default()
    };

    let result = executor(&config)
        .run_collection(fixture.root(), &options)
        .await
        .unwrap();

    let summary = result.summary.expect("summary from stdout");
    assert_eq!(summary.total_requests, 3);
    assert_eq!(summary.failed_requests, 1);
    assert!(fixture
        .recorded_args()
        .windows(2)
        .any(|w| w[0] == "--reporter-junit" && w[1].ends_with("junit.xml")));

    let output = fixture.recorded_output_path();
    assert!(!output.as_os_str().is_empty());
    assert!(!output.exists(), "temp output file was not removed");
}

#[tokio::test]
async fn test_missing_runner_binary() {
    let fixture = Fixture::new();
    let config = Config {
        bruno_cli_path: fixture
            .scripts
            .path()
            .join("no-such-bru")
            .display()
            .to_string(),
        ..Config::default()
    };

    let err = executor(&config)
        .run_collection(fixture.root(), &RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, BrunoError::RunnerNotFound { .. }));
}

#[tokio::test]
async fn test_runner_refusing_non_root_directory() {
    let fixture = Fixture::new();
    let config = fixture.config(
        "echo 'You can run only at the root of a collection' >&2\nexit 4\n",
    );

    let err = executor(&config)
        .run_collection(fixture.root(), &RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, BrunoError::NotACollectionRoot { .. }));
}

#[tokio::test]
async fn test_stderr_only_failure_is_runner_error() {
    let fixture = Fixture::new();
    let config = fixture.config("echo 'Environment file not found' >&2\nexit 1\n");

    let err = executor(&config)
        .run_collection(fixture.root(), &RunOptions::default())
        .await
        .unwrap_err();
    match err {
        BrunoError::RunnerError { stderr } => assert_eq!(stderr, "Environment file not found"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_tools_mask_secrets_in_output() {
    let fixture = Fixture::new();
    let tools = BrunoTools::new(fixture.config("echo 'API_TOKEN=abc123'\nexit 0\n"));

    let text = tools
        .run_collection(RunCollectionParams {
            collection_path: fixture.root().to_path_buf(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(text.contains("API_TOKEN=***"));
    assert!(!text.contains("abc123"));
}

#[tokio::test]
async fn test_tools_record_run_metrics() {
    let fixture = Fixture::new();
    let tools = BrunoTools::new(fixture.config(&failing_run_script()));

    let text = tools
        .run_request(RunRequestParams {
            collection_path: fixture.root().to_path_buf(),
            request_name: "Get Users".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(text.contains("Failed: 1"));

    let metrics = tools.performance().metrics();
    assert_eq!(metrics.total_runs, 1);
    assert_eq!(metrics.request_runs, 1);
    assert_eq!(metrics.failed_runs, 1);
}

#[tokio::test]
async fn test_dry_run_never_starts_runner() {
    let fixture = Fixture::new();
    let tools = BrunoTools::new(fixture.config("exit 0\n"));

    let text = tools
        .run_collection(RunCollectionParams {
            collection_path: fixture.root().to_path_buf(),
            options: RunOptions {
                folder_path: Some("users".to_string()),
                ..Default::default()
            },
            dry_run: true,
        })
        .await
        .unwrap();
    assert!(text.contains("DRY RUN"));
    assert!(text.contains("Create User"));
    assert!(!text.contains("Get Users"));
    assert!(!fixture.scripts.path().join("args.txt").exists());
    assert_eq!(tools.performance().metrics().total_runs, 0);
}

#[tokio::test]
async fn test_health_check_reports_version() {
    let fixture = Fixture::new();
    let tools = BrunoTools::new(fixture.config("echo '1.20.0'\nexit 0\n"));

    let text = tools
        .health_check(HealthParams {
            include_metrics: true,
            include_cache_stats: true,
        })
        .await
        .unwrap();
    assert!(text.contains("Bruno CLI available"));
    assert!(text.contains("1.20.0"));
    assert!(text.contains("Run Metrics"));
    assert!(text.contains("Cache Statistics"));
    assert_eq!(fixture.recorded_args(), vec!["--version"]);
}

#[tokio::test]
async fn test_health_check_without_runner() {
    let tools = BrunoTools::new(Config {
        bruno_cli_path: "/nonexistent/bruno-cli-for-tests".to_string(),
        ..Config::default()
    });

    let text = tools.health_check(HealthParams::default()).await.unwrap();
    assert!(text.contains("Bruno CLI unavailable"));
    assert!(!text.contains("Run Metrics"));
}
