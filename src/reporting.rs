// Text formatting for tool responses
// One formatter per tool; callers mask secrets in the returned text.

use chrono::Local;
use std::fmt::{self, Write};
use std::path::{Path, PathBuf};

use crate::cache::{format_cache_stats, format_metrics};
use crate::models::{
    CollectionValidationResult, Environment, EnvironmentValidation, HealthReport, RequestDetails,
    RequestRecord, RunResult,
};

const PASS: &str = "✓";
const FAIL: &str = "✗";

pub fn format_run_result(title: &str, result: &RunResult) -> String {
    render(|out| write_run_result(out, title, result))
}

pub fn format_request_list(root: &Path, requests: &[RequestRecord]) -> String {
    render(|out| write_request_list(out, root, requests))
}

pub fn format_collections(search_root: &Path, roots: &[PathBuf]) -> String {
    render(|out| write_collections(out, search_root, roots))
}

pub fn format_environments(root: &Path, environments: &[Environment]) -> String {
    render(|out| write_environments(out, root, environments))
}

pub fn format_environment_validation(name: &str, validation: &EnvironmentValidation) -> String {
    render(|out| write_environment_validation(out, name, validation))
}

pub fn format_request_details(details: &RequestDetails) -> String {
    render(|out| write_request_details(out, details))
}

pub fn format_collection_validation(root: &Path, result: &CollectionValidationResult) -> String {
    render(|out| write_collection_validation(out, root, result))
}

pub fn format_health(report: &HealthReport) -> String {
    render(|out| write_health(out, report))
}

/// Writing into a `String` only fails if a `Display` impl does.
fn render<F>(build: F) -> String
where
    F: FnOnce(&mut String) -> fmt::Result,
{
    let mut out = String::new();
    match build(&mut out) {
        Ok(()) => out,
        Err(_) => String::from("(report could not be formatted)"),
    }
}

fn write_run_result(out: &mut String, title: &str, result: &RunResult) -> fmt::Result {
    writeln!(out, "=== {} ===", title)?;
    writeln!(out, "Finished: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "Exit code: {}", result.exit_code)?;

    if let Some(summary) = &result.summary {
        writeln!(out, "\nSummary:")?;
        writeln!(out, "  Total requests: {}", summary.total_requests)?;
        writeln!(out, "  Passed: {}", summary.passed_requests)?;
        writeln!(out, "  Failed: {}", summary.failed_requests)?;
        writeln!(out, "  Duration: {}ms", summary.total_duration)?;
    }

    match &result.results {
        Some(results) if !results.is_empty() => {
            writeln!(out, "\nResults:")?;
            for outcome in results {
                let mark = if outcome.passed { PASS } else { FAIL };
                writeln!(
                    out,
                    "  {} {} ({} in {}ms)",
                    mark, outcome.name, outcome.status, outcome.duration
                )?;
                if let Some(error) = &outcome.error {
                    writeln!(out, "      Error: {}", error)?;
                }
                for assertion in outcome.assertions.iter().flatten() {
                    let mark = if assertion.passed { PASS } else { FAIL };
                    writeln!(out, "      {} {}", mark, assertion.name)?;
                    if let (false, Some(error)) = (assertion.passed, &assertion.error) {
                        writeln!(out, "          {}", error)?;
                    }
                }
            }
        }
        Some(_) => {}
        None => {
            // Output could not be parsed; show it as-is.
            if !result.stdout.trim().is_empty() {
                writeln!(out, "\nOutput:\n{}", result.stdout.trim_end())?;
            }
        }
    }

    if !result.stderr.trim().is_empty() {
        writeln!(out, "\nErrors:\n{}", result.stderr.trim_end())?;
    }
    Ok(())
}

fn write_request_list(out: &mut String, root: &Path, requests: &[RequestRecord]) -> fmt::Result {
    writeln!(out, "Requests in {} ({}):", root.display(), requests.len())?;
    if requests.is_empty() {
        writeln!(out, "  (none)")?;
        return Ok(());
    }
    for request in requests {
        let method = request
            .method
            .map(|m| m.to_string())
            .unwrap_or_else(|| "?".to_string());
        write!(out, "  [{}] {}", method, request.name)?;
        if let Some(url) = &request.url {
            write!(out, " - {}", url)?;
        }
        if let Some(folder) = &request.folder {
            write!(out, " (folder: {})", folder)?;
        }
        out.push('\n');
    }
    Ok(())
}

fn write_collections(out: &mut String, search_root: &Path, roots: &[PathBuf]) -> fmt::Result {
    if roots.is_empty() {
        writeln!(out, "No Bruno collections found under {}", search_root.display())?;
        return Ok(());
    }
    writeln!(
        out,
        "Found {} collection(s) under {}:",
        roots.len(),
        search_root.display()
    )?;
    for root in roots {
        writeln!(out, "  - {}", root.display())?;
    }
    Ok(())
}

fn write_environments(out: &mut String, root: &Path, environments: &[Environment]) -> fmt::Result {
    if environments.is_empty() {
        writeln!(out, "No environments found in {}", root.display())?;
        return Ok(());
    }
    writeln!(out, "Environments ({}):", environments.len())?;
    for env in environments {
        match &env.variables {
            Some(vars) => {
                writeln!(out, "  {} ({} variables)", env.name, vars.len())?;
                for (key, value) in vars {
                    writeln!(out, "    {}: {}", key, value)?;
                }
            }
            None => {
                writeln!(out, "  {} (could not be read)", env.name)?;
            }
        }
    }
    Ok(())
}

fn write_environment_validation(out: &mut String, name: &str, validation: &EnvironmentValidation) -> fmt::Result {
    let status = if validation.valid { "valid" } else { "invalid" };
    writeln!(out, "Environment '{}' is {}", name, status)?;
    if !validation.exists {
        for error in &validation.errors {
            writeln!(out, "  {} {}", FAIL, error)?;
        }
        return Ok(());
    }
    if let Some(vars) = &validation.variables {
        writeln!(out, "Variables: {}", vars.len())?;
    }
    push_list(out, "Errors", &validation.errors)?;
    push_list(out, "Warnings", &validation.warnings)?;
    Ok(())
}

fn write_request_details(out: &mut String, details: &RequestDetails) -> fmt::Result {
    writeln!(out, "Request: {}", details.name)?;
    writeln!(out, "Method: {}", details.method)?;
    writeln!(out, "URL: {}", details.url)?;
    writeln!(out, "Auth: {}", details.auth)?;
    write!(out, "Type: {}", details.metadata.request_type)?;
    if let Some(seq) = details.metadata.seq {
        write!(out, " (seq {})", seq)?;
    }
    out.push('\n');

    if !details.headers.is_empty() {
        writeln!(out, "\nHeaders:")?;
        for (key, value) in &details.headers {
            writeln!(out, "  {}: {}", key, value)?;
        }
    }
    if !details.query_params.is_empty() {
        writeln!(out, "\nQuery Params:")?;
        for (key, value) in &details.query_params {
            writeln!(out, "  {}: {}", key, value)?;
        }
    }
    if let Some(body) = &details.body {
        writeln!(out, "\nBody ({}):\n{}", body.body_type, body.content)?;
    }
    if !details.tests.is_empty() {
        writeln!(out, "\nTests:")?;
        for test in &details.tests {
            writeln!(out, "  - {}", test)?;
        }
    }
    Ok(())
}

fn write_collection_validation(out: &mut String, root: &Path, result: &CollectionValidationResult) -> fmt::Result {
    let mark = if result.valid { PASS } else { FAIL };
    writeln!(
        out,
        "{} Collection {} is {}",
        mark,
        root.display(),
        if result.valid { "valid" } else { "invalid" }
    )?;
    let summary = &result.summary;
    writeln!(out, "\nSummary:")?;
    writeln!(
        out,
        "  bruno.json: {}",
        if summary.has_manifest { "present" } else { "missing" }
    )?;
    writeln!(out, "  Requests: {}", summary.total_requests)?;
    writeln!(out, "  Valid requests: {}", summary.valid_requests)?;
    writeln!(out, "  Invalid requests: {}", summary.invalid_requests)?;
    writeln!(out, "  Environments: {}", summary.environments)?;
    push_list(out, "Errors", &result.errors)?;
    push_list(out, "Warnings", &result.warnings)?;
    Ok(())
}

fn write_health(out: &mut String, report: &HealthReport) -> fmt::Result {
    writeln!(out, "=== Bruno Runner Health ===")?;
    writeln!(out, "Checked: {}", report.checked_at)?;
    if report.runner_available {
        writeln!(
            out,
            "{} Bruno CLI available ({}): {}",
            PASS,
            report.program,
            report.runner_version.as_deref().unwrap_or("unknown version")
        )?;
    } else {
        writeln!(out, "{} Bruno CLI unavailable ({})", FAIL, report.program)?;
        if let Some(error) = &report.runner_error {
            writeln!(out, "  {}", error)?;
        }
    }

    writeln!(out, "\nConfiguration:")?;
    writeln!(out, "  Request timeout: {}ms", report.request_timeout_ms)?;
    writeln!(out, "  Collection timeout: {}ms", report.collection_timeout_ms)?;
    writeln!(
        out,
        "  Secret masking: {}",
        if report.mask_secrets { "on" } else { "off" }
    )?;
    if report.allowed_paths.is_empty() {
        writeln!(out, "  Allowed paths: (unrestricted)")?;
    } else {
        writeln!(out, "  Allowed paths:")?;
        for path in &report.allowed_paths {
            writeln!(out, "    - {}", path.display())?;
        }
    }

    if let Some(metrics) = &report.metrics {
        write!(out, "\n{}", format_metrics(metrics))?;
    }
    if let Some(cache) = &report.cache {
        write!(out, "\n{}", format_cache_stats(cache))?;
    }
    Ok(())
}

fn push_list(out: &mut String, heading: &str, items: &[String]) -> fmt::Result {
    if items.is_empty() {
        return Ok(());
    }
    writeln!(out, "\n{}:", heading)?;
    for item in items {
        writeln!(out, "  - {}", item)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssertionOutcome, Method, RequestOutcome, RunSummary};

    #[test]
    fn run_result_lists_outcomes() {
        let result = RunResult {
            exit_code: 1,
            summary: Some(RunSummary {
                total_requests: 1,
                passed_requests: 0,
                failed_requests: 1,
                total_duration: 12,
            }),
            results: Some(vec![RequestOutcome {
                name: "Get Users.bru".to_string(),
                passed: false,
                status: 500,
                duration: 12,
                error: Some("boom".to_string()),
                request: None,
                response: None,
                assertions: Some(vec![AssertionOutcome {
                    name: "status is 200".to_string(),
                    passed: false,
                    error: Some("expected 200".to_string()),
                }]),
            }]),
            ..Default::default()
        };
        let text = format_run_result("Run: Get Users", &result);
        assert!(text.contains("Failed: 1"));
        assert!(text.contains("✗ Get Users.bru (500 in 12ms)"));
        assert!(text.contains("Error: boom"));
        assert!(text.contains("✗ status is 200"));
    }

    #[test]
    fn raw_output_is_shown_without_summary() {
        let result = RunResult {
            stdout: "plain text output".to_string(),
            ..Default::default()
        };
        let text = format_run_result("Run", &result);
        assert!(text.contains("Output:\nplain text output"));
        assert!(!text.contains("Summary:"));
    }

    #[test]
    fn request_list_shows_folder() {
        let records = vec![RequestRecord {
            name: "List".to_string(),
            method: Some(Method::GET),
            url: Some("/users".to_string()),
            folder: Some("users".to_string()),
            file_path: PathBuf::from("/c/users/List.bru"),
        }];
        let text = format_request_list(Path::new("/c"), &records);
        assert!(text.contains("[GET] List - /users (folder: users)"));
    }

    #[test]
    fn health_reports_missing_runner() {
        let report = HealthReport {
            checked_at: "2024-01-01 00:00:00".to_string(),
            program: "bru".to_string(),
            runner_error: Some("not on PATH".to_string()),
            ..Default::default()
        };
        let text = format_health(&report);
        assert!(text.contains("✗ Bruno CLI unavailable (bru)"));
        assert!(text.contains("not on PATH"));
        assert!(text.contains("(unrestricted)"));
        assert!(!text.contains("Run Metrics"));
    }
}
