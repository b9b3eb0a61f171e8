// Main CLI entry point for bruno-runner
// Uses clap for argument parsing; each tool is a subcommand.

use clap::{Arg, ArgAction, ArgMatches, Command};
use bruno_runner::config::Config;
use bruno_runner::models::RunOptions;
use bruno_runner::tools::{
    BrunoTools, CollectionParams, DiscoverParams, EnvironmentParams, HealthParams, RequestParams,
    RunCollectionParams, RunRequestParams,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn collection_arg() -> Arg {
    Arg::new("collection")
        .short('c')
        .long("collection")
        .required(true)
        .num_args(1)
        .value_parser(clap::value_parser!(PathBuf))
        .help("Path to the collection root (directory containing bruno.json)")
}

fn request_arg() -> Arg {
    Arg::new("request")
        .short('n')
        .long("name")
        .required(true)
        .num_args(1)
        .help("Request name or file stem")
}

fn env_arg(required: bool) -> Arg {
    Arg::new("env")
        .short('e')
        .long("env")
        .required(required)
        .num_args(1)
        .help("Environment name (or path to an environment file)")
}

fn env_var_arg() -> Arg {
    Arg::new("env_var")
        .long("env-var")
        .num_args(1)
        .action(ArgAction::Append)
        .value_parser(parse_key_value)
        .help("Override an environment variable, as KEY=VALUE (repeatable)")
}

fn reporter_args() -> [Arg; 3] {
    [
        Arg::new("reporter_json")
            .long("reporter-json")
            .num_args(1)
            .value_parser(clap::value_parser!(PathBuf))
            .help("Also write a JSON report to this path"),
        Arg::new("reporter_junit")
            .long("reporter-junit")
            .num_args(1)
            .value_parser(clap::value_parser!(PathBuf))
            .help("Also write a JUnit XML report to this path"),
        Arg::new("reporter_html")
            .long("reporter-html")
            .num_args(1)
            .value_parser(clap::value_parser!(PathBuf))
            .help("Also write an HTML report to this path"),
    ]
}

fn flag(id: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(long).action(ArgAction::SetTrue).help(help)
}

fn cli() -> Command {
    Command::new("bruno-runner")
        .version(clap::crate_version!())
        .about("List, run and validate Bruno API collections through the bru CLI")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .after_help("EXAMPLES:\n  bruno-runner list-requests -c ./api\n  bruno-runner run-request -c ./api -n \"Get Users\" -e local\n  bruno-runner run-collection -c ./api --folder users --env-var HOST=localhost --bail\n  bruno-runner health-check --metrics")
        .arg(Arg::new("bruno_cli")
            .long("bruno-cli")
            .global(true)
            .num_args(1)
            .help("Bruno CLI program (overrides BRUNO_CLI_PATH)"))
        .arg(Arg::new("allow_path")
            .long("allow-path")
            .global(true)
            .num_args(1)
            .action(ArgAction::Append)
            .value_parser(clap::value_parser!(PathBuf))
            .help("Restrict access to paths under this root (repeatable, overrides BRUNO_ALLOWED_PATHS)"))
        .subcommand(Command::new("run-request")
            .about("Run a single request from a collection")
            .arg(collection_arg())
            .arg(request_arg())
            .arg(env_arg(false))
            .arg(env_var_arg())
            .args(reporter_args())
            .arg(flag("dry_run", "dry-run", "Validate the request without running it")))
        .subcommand(Command::new("run-collection")
            .about("Run a whole collection or one folder of it")
            .arg(collection_arg())
            .arg(env_arg(false))
            .arg(Arg::new("folder")
                .long("folder")
                .num_args(1)
                .help("Folder inside the collection to run"))
            .arg(env_var_arg())
            .arg(flag("no_recursive", "no-recursive", "Do not descend into sub-folders"))
            .arg(flag("tests_only", "tests-only", "Only run requests that have tests"))
            .arg(flag("bail", "bail", "Stop at the first failure"))
            .args(reporter_args())
            .arg(flag("dry_run", "dry-run", "List the requests that would run without running them")))
        .subcommand(Command::new("list-requests")
            .about("List every request in a collection")
            .arg(collection_arg()))
        .subcommand(Command::new("discover-collections")
            .about("Find Bruno collections under a directory")
            .arg(Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .num_args(1)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Directory to search"))
            .arg(Arg::new("max_depth")
                .long("max-depth")
                .num_args(1)
                .value_parser(clap::value_parser!(usize))
                .help("Maximum search depth (default 5, capped at 10)")))
        .subcommand(Command::new("list-environments")
            .about("List the environments of a collection")
            .arg(collection_arg()))
        .subcommand(Command::new("validate-environment")
            .about("Check one environment file")
            .arg(collection_arg())
            .arg(env_arg(true)))
        .subcommand(Command::new("get-request-details")
            .about("Show the parsed contents of a request")
            .arg(collection_arg())
            .arg(request_arg()))
        .subcommand(Command::new("validate-collection")
            .about("Check the structure of a collection")
            .arg(collection_arg()))
        .subcommand(Command::new("health-check")
            .about("Check the Bruno CLI and show the active configuration")
            .arg(flag("metrics", "metrics", "Include run metrics"))
            .arg(flag("cache_stats", "cache-stats", "Include cache statistics")))
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

fn path(m: &ArgMatches, id: &str) -> PathBuf {
    m.get_one::<PathBuf>(id).cloned().unwrap_or_default()
}

fn text(m: &ArgMatches, id: &str) -> Option<String> {
    m.get_one::<String>(id).cloned()
}

fn run_options(m: &ArgMatches) -> RunOptions {
    let env_variables: BTreeMap<String, String> = m
        .get_many::<(String, String)>("env_var")
        .map(|pairs| pairs.cloned().collect())
        .unwrap_or_default();
    let has = |id: &str| m.try_contains_id(id).unwrap_or(false);
    let set = |id: &str| if has(id) && m.get_flag(id) { Some(true) } else { None };

    RunOptions {
        environment: text(m, "env"),
        env_variables,
        folder_path: if has("folder") { text(m, "folder") } else { None },
        recursive: if has("no_recursive") && m.get_flag("no_recursive") {
            Some(false)
        } else {
            None
        },
        tests_only: set("tests_only"),
        bail: set("bail"),
        reporter_json: m.get_one::<PathBuf>("reporter_json").cloned(),
        reporter_junit: m.get_one::<PathBuf>("reporter_junit").cloned(),
        reporter_html: m.get_one::<PathBuf>("reporter_html").cloned(),
    }
}

async fn dispatch(tools: &BrunoTools, matches: &ArgMatches) -> bruno_runner::Result<String> {
    match matches.subcommand() {
        Some(("run-request", m)) => {
            tools
                .run_request(RunRequestParams {
                    collection_path: path(m, "collection"),
                    request_name: text(m, "request").unwrap_or_default(),
                    options: run_options(m),
                    dry_run: m.get_flag("dry_run"),
                })
                .await
        }
        Some(("run-collection", m)) => {
            tools
                .run_collection(RunCollectionParams {
                    collection_path: path(m, "collection"),
                    options: run_options(m),
                    dry_run: m.get_flag("dry_run"),
                })
                .await
        }
        Some(("list-requests", m)) => tools.list_requests(CollectionParams {
            collection_path: path(m, "collection"),
        }),
        Some(("discover-collections", m)) => tools.discover_collections(DiscoverParams {
            search_path: path(m, "path"),
            max_depth: m.get_one::<usize>("max_depth").copied(),
        }),
        Some(("list-environments", m)) => tools.list_environments(CollectionParams {
            collection_path: path(m, "collection"),
        }),
        Some(("validate-environment", m)) => tools.validate_environment(EnvironmentParams {
            collection_path: path(m, "collection"),
            environment_name: text(m, "env").unwrap_or_default(),
        }),
        Some(("get-request-details", m)) => tools.get_request_details(RequestParams {
            collection_path: path(m, "collection"),
            request_name: text(m, "request").unwrap_or_default(),
        }),
        Some(("validate-collection", m)) => tools.validate_collection(CollectionParams {
            collection_path: path(m, "collection"),
        }),
        Some(("health-check", m)) => {
            tools
                .health_check(HealthParams {
                    include_metrics: m.get_flag("metrics"),
                    include_cache_stats: m.get_flag("cache_stats"),
                })
                .await
        }
        _ => Ok(cli().render_help().to_string()),
    }
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout carries only tool output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(program) = matches.get_one::<String>("bruno_cli") {
        config.bruno_cli_path = program.clone();
    }
    if let Some(paths) = matches.get_many::<PathBuf>("allow_path") {
        config.allowed_paths = paths.cloned().collect();
    }

    let tools = BrunoTools::new(config);
    match dispatch(&tools, &matches).await {
        Ok(output) => print!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", tools.describe_error(&e));
            std::process::exit(1);
        }
    }
}
