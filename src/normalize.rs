// Runner output normalization
//
// The runner's JSON comes in several shapes depending on version and
// reporter: an object with `summary`/`results`, an array wrapping that
// object, or a bare array of per-request results. Field names vary too.
// Everything is decoded into serde_json::Value first and then resolved
// field by field through the precedence lists below.
//
//   summary.totalRequests   <- totalRequests | total        | results.len()
//   summary.passedRequests  <- passedRequests | passed      | count(passed)
//   summary.failedRequests  <- failedRequests | failed      | count(!passed)
//   summary.totalDuration   <- totalDuration | duration     | sum(duration)
//   result.name             <- test.filename | name | requestName | suitename | request.url
//   result.status           <- response.status | status
//   result.duration         <- response.responseTime | duration | runtime (seconds)
//   result.assertions       <- testResults | tests | assertions, then assertionResults

use serde_json::{Map, Value};

use crate::models::{
    AssertionOutcome, OutcomeRequest, OutcomeResponse, RequestOutcome, RunSummary,
};

/// Summary and per-request results recovered from runner output.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRun {
    pub summary: RunSummary,
    pub results: Vec<RequestOutcome>,
}

/// Parses raw JSON text and normalizes it; `None` when it is not runner output.
pub fn parse_runner_json(text: &str) -> Option<NormalizedRun> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    normalize(&value)
}

/// Finds runner JSON embedded in stdout: the whole trimmed text first, then
/// the first balanced `{...}` or `[...]` span that parses.
pub fn extract_json(stdout: &str) -> Option<Value> {
    let trimmed = stdout.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() || value.is_array() {
            return Some(value);
        }
    }

    let bytes = trimmed.as_bytes();
    for (start, &b) in bytes.iter().enumerate() {
        if b != b'{' && b != b'[' {
            continue;
        }
        if let Some(end) = balanced_end(bytes, start) {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                return Some(value);
            }
        }
    }
    None
}

/// Index of the bracket closing the one at `start`, skipping string contents.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Normalizes any recognized runner shape.
pub fn normalize(value: &Value) -> Option<NormalizedRun> {
    match unwrap_single(value) {
        Value::Object(obj) => normalize_report(obj).or_else(|| match value {
            Value::Array(items) => normalize_items(items),
            _ => None,
        }),
        Value::Array(items) => normalize_items(items),
        _ => None,
    }
}

/// A list of iteration reports, or a bare list of per-request results.
fn normalize_items(items: &[Value]) -> Option<NormalizedRun> {
    let objects: Vec<&Map<String, Value>> = items.iter().filter_map(Value::as_object).collect();
    if objects.is_empty() || objects.len() != items.len() {
        return None;
    }
    if objects.iter().all(|o| o.contains_key("results")) {
        return merge_iterations(&objects);
    }
    if !objects.iter().all(|o| looks_like_result(o)) {
        return None;
    }
    let results: Vec<RequestOutcome> = objects
        .iter()
        .enumerate()
        .map(|(i, o)| normalize_result(o, i))
        .collect();
    Some(NormalizedRun {
        summary: summary_from(None, &results),
        results,
    })
}

fn looks_like_result(obj: &Map<String, Value>) -> bool {
    ["name", "test", "request", "response", "status", "error"]
        .iter()
        .any(|k| obj.contains_key(*k))
}

/// `[ {...} ]` is treated as the object itself.
fn unwrap_single(value: &Value) -> &Value {
    match value {
        Value::Array(items) if items.len() == 1 && items[0].is_object() => &items[0],
        other => other,
    }
}

fn normalize_report(obj: &Map<String, Value>) -> Option<NormalizedRun> {
    let summary = obj.get("summary").and_then(Value::as_object);
    let items = obj.get("results").and_then(Value::as_array);
    if summary.is_none() && items.is_none() {
        return None;
    }
    let results: Vec<RequestOutcome> = items
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .enumerate()
                .map(|(i, o)| normalize_result(o, i))
                .collect()
        })
        .unwrap_or_default();
    Some(NormalizedRun {
        summary: summary_from(summary, &results),
        results,
    })
}

/// Several iteration reports (one per data row) folded into one run.
fn merge_iterations(reports: &[&Map<String, Value>]) -> Option<NormalizedRun> {
    let mut merged = NormalizedRun {
        summary: RunSummary::default(),
        results: Vec::new(),
    };
    for report in reports {
        let run = normalize_report(report)?;
        merged.summary.total_requests += run.summary.total_requests;
        merged.summary.passed_requests += run.summary.passed_requests;
        merged.summary.failed_requests += run.summary.failed_requests;
        merged.summary.total_duration += run.summary.total_duration;
        merged.results.extend(run.results);
    }
    Some(merged)
}

fn summary_from(summary: Option<&Map<String, Value>>, results: &[RequestOutcome]) -> RunSummary {
    let field = |keys: &[&str]| summary.and_then(|s| first_u64(s, keys));
    let passed = results.iter().filter(|r| r.passed).count() as u64;

    RunSummary {
        total_requests: field(&["totalRequests", "total"]).unwrap_or(results.len() as u64),
        passed_requests: field(&["passedRequests", "passed"]).unwrap_or(passed),
        failed_requests: field(&["failedRequests", "failed"])
            .unwrap_or(results.len() as u64 - passed),
        total_duration: field(&["totalDuration", "duration"])
            .unwrap_or_else(|| results.iter().map(|r| r.duration).sum()),
    }
}

fn normalize_result(item: &Map<String, Value>, index: usize) -> RequestOutcome {
    let request = item.get("request").and_then(Value::as_object);
    let response = item.get("response").and_then(Value::as_object);

    let name = item
        .get("test")
        .and_then(|t| t.get("filename"))
        .and_then(Value::as_str)
        .or_else(|| first_str(item, &["name", "requestName", "suitename"]))
        .or_else(|| request.and_then(|r| first_str(r, &["url"])))
        .map(str::to_string)
        .unwrap_or_else(|| format!("Request {}", index + 1));

    let error = match item.get("error") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(
            other
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string()),
        ),
    };

    // Out-of-range codes read as 0 rather than wrapping.
    let status = response
        .and_then(|r| first_u64(r, &["status"]))
        .or_else(|| first_u64(item, &["status"]))
        .and_then(|code| u16::try_from(code).ok())
        .unwrap_or(0);

    let duration = response
        .and_then(|r| first_u64(r, &["responseTime"]))
        .or_else(|| first_u64(item, &["duration"]))
        .or_else(|| {
            item.get("runtime")
                .and_then(Value::as_f64)
                .map(|secs| (secs * 1000.0).round() as u64)
        })
        .unwrap_or(0);

    let assertions = assertions_from(item);

    RequestOutcome {
        name,
        passed: error.is_none(),
        status,
        duration,
        error,
        request: request.map(|r| OutcomeRequest {
            method: first_str(r, &["method"]).unwrap_or("GET").to_string(),
            url: first_str(r, &["url"]).unwrap_or_default().to_string(),
            headers: r.get("headers").cloned(),
            body: r.get("data").or_else(|| r.get("body")).cloned(),
        }),
        response: response.map(|r| OutcomeResponse {
            status,
            status_text: first_str(r, &["statusText"]).map(str::to_string),
            headers: r.get("headers").cloned(),
            body: r.get("data").or_else(|| r.get("body")).cloned(),
            response_time: first_u64(r, &["responseTime"]).unwrap_or(duration),
        }),
        assertions: (!assertions.is_empty()).then_some(assertions),
    }
}

fn assertions_from(item: &Map<String, Value>) -> Vec<AssertionOutcome> {
    let mut assertions = Vec::new();

    let tests = ["testResults", "tests", "assertions"]
        .iter()
        .find_map(|k| item.get(*k).and_then(Value::as_array));
    for test in tests.into_iter().flatten().filter_map(Value::as_object) {
        let name = first_str(test, &["description", "name", "title"])
            .unwrap_or("Test")
            .to_string();
        assertions.push(assertion(test, name));
    }

    let checks = item.get("assertionResults").and_then(Value::as_array);
    for check in checks.into_iter().flatten().filter_map(Value::as_object) {
        let name = match (first_str(check, &["lhsExpr"]), first_str(check, &["rhsExpr"])) {
            (Some(lhs), Some(rhs)) => {
                let operator = first_str(check, &["operator"]).unwrap_or("");
                if operator.is_empty() || rhs.starts_with(operator) {
                    format!("{}: {}", lhs, rhs)
                } else {
                    format!("{}: {} {}", lhs, operator, rhs)
                }
            }
            _ => first_str(check, &["description", "name"])
                .unwrap_or("Assertion")
                .to_string(),
        };
        assertions.push(assertion(check, name));
    }

    assertions
}

/// Passed only with an explicit `status: "pass"` or `passed: true`.
fn assertion(entry: &Map<String, Value>, name: String) -> AssertionOutcome {
    let passed = entry.get("status").and_then(Value::as_str) == Some("pass")
        || entry.get("passed").and_then(Value::as_bool) == Some(true);
    AssertionOutcome {
        name,
        passed,
        error: first_str(entry, &["error", "message"]).map(str::to_string),
    }
}

fn first_str<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_str))
}

/// First key holding a non-negative number (floats are rounded).
fn first_u64(obj: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| {
        let value = obj.get(*k)?;
        value
            .as_u64()
            .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
    })
}
