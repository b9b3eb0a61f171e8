// Bruno .bru file parser for bruno-runner
// Uses regex to locate named blocks and reads `key: value` lines inside them.
// Grammar problems never fail a parse; missing pieces keep their defaults.
// Only I/O surfaces as an error.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{BrunoError, Result};
use crate::models::{BasicInfo, BodyDetails, Method, RequestDetails, RequestMetadata};

lazy_static! {
    static ref META_BLOCK: Regex = Regex::new(r"(?m)^[ \t]*meta[ \t]*\{").unwrap();
    static ref METHOD_BLOCK: Regex =
        Regex::new(r"(?m)^[ \t]*(get|post|put|patch|delete|head|options)[ \t]*\{").unwrap();
    static ref HEADERS_BLOCK: Regex = Regex::new(r"(?m)^[ \t]*headers[ \t]*\{").unwrap();
    static ref QUERY_BLOCK: Regex = Regex::new(r"(?m)^[ \t]*params:query[ \t]*\{").unwrap();
    static ref BODY_BLOCK: Regex = Regex::new(
        r"(?m)^[ \t]*body:(json|text|xml|form-urlencoded|formUrlEncoded|multipart-form|multipartForm|graphql|sparql)[ \t]*\{"
    )
    .unwrap();
    static ref TESTS_BLOCK: Regex = Regex::new(r"(?m)^[ \t]*tests[ \t]*\{").unwrap();
    static ref VARS_BLOCK: Regex = Regex::new(r"(?m)^[ \t]*vars[ \t]*\{").unwrap();

    // A block ends at the first `}` in column zero.
    static ref BLOCK_END: Regex = Regex::new(r"(?m)^\}").unwrap();

    static ref TEST_CALL: Regex = Regex::new(r#"test\(\s*["'`]([^"'`]*)["'`]"#).unwrap();
}

pub struct BruFileParser;

impl BruFileParser {
    /// Cheap pass used during discovery: name, method and url only.
    pub fn parse_basic_info(&self, text: &str) -> BasicInfo {
        let name = block_body(text, &META_BLOCK)
            .and_then(|meta| field(meta, "name"));
        let (method, url) = match method_block(text) {
            Some((method, body)) => (Some(method), field(body, "url")),
            None => (None, None),
        };
        BasicInfo { name, method, url }
    }

    /// Full parse of a request file. `name` is empty when the file has no
    /// `meta.name`; `parse_request_file` fills it from the file name.
    pub fn parse_request(&self, text: &str) -> RequestDetails {
        let mut details = RequestDetails::default();

        if let Some(meta) = block_body(text, &META_BLOCK) {
            if let Some(name) = field(meta, "name") {
                details.name = name;
            }
            details.metadata = RequestMetadata {
                request_type: field(meta, "type").unwrap_or_else(|| "http".to_string()),
                seq: field(meta, "seq").and_then(|s| s.parse::<u32>().ok()),
            };
        }

        let mut declared_body = None;
        if let Some((method, body)) = method_block(text) {
            details.method = method;
            if let Some(url) = field(body, "url") {
                details.url = url;
            }
            if let Some(auth) = field(body, "auth") {
                details.auth = auth;
            }
            declared_body = field(body, "body");
        }

        if let Some(headers) = block_body(text, &HEADERS_BLOCK) {
            details.headers = pairs(headers);
        }
        if let Some(query) = block_body(text, &QUERY_BLOCK) {
            details.query_params = pairs(query);
        }

        details.body = body_block(text, declared_body.as_deref());

        if let Some(tests) = block_body(text, &TESTS_BLOCK) {
            details.tests = TEST_CALL
                .captures_iter(tests)
                .filter_map(|cap| cap.get(1))
                .map(|m| m.as_str().to_string())
                .collect();
        }

        details
    }

    /// Reads and parses a request file; the file stem stands in for a missing name.
    pub fn parse_request_file(&self, path: &Path) -> Result<RequestDetails> {
        let text = std::fs::read_to_string(path).map_err(|e| BrunoError::io(path, e))?;
        let mut details = self.parse_request(&text);
        if details.name.is_empty() {
            details.name = file_stem(path);
        }
        Ok(details)
    }

    /// Variables from the `vars {}` block of an environment (or request) file.
    pub fn parse_environment_variables(&self, text: &str) -> BTreeMap<String, String> {
        block_body(text, &VARS_BLOCK).map(pairs).unwrap_or_default()
    }

    pub fn has_vars_block(&self, text: &str) -> bool {
        VARS_BLOCK.is_match(text)
    }
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Text between a block opener and its closing line.
fn block_body<'a>(text: &'a str, opener: &Regex) -> Option<&'a str> {
    let start = opener.find(text)?.end();
    Some(body_from(text, start))
}

fn body_from(text: &str, start: usize) -> &str {
    let rest = &text[start..];
    // `meta {}` style one-liners have no body
    if rest.lines().next().map_or(false, |l| l.trim_start().starts_with('}')) {
        return "";
    }
    match BLOCK_END.find(rest) {
        Some(end) => &rest[..end.start()],
        None => rest,
    }
}

/// First HTTP method block in the file; later ones are ignored.
fn method_block(text: &str) -> Option<(Method, &str)> {
    let cap = METHOD_BLOCK.captures(text)?;
    let whole = cap.get(0)?;
    let method = cap.get(1)?.as_str().parse().ok()?;
    Some((method, body_from(text, whole.end())))
}

fn body_block(text: &str, declared: Option<&str>) -> Option<BodyDetails> {
    let mut first = None;
    for cap in BODY_BLOCK.captures_iter(text) {
        let (whole, raw_type) = match (cap.get(0), cap.get(1)) {
            (Some(w), Some(t)) => (w, t.as_str()),
            _ => continue,
        };
        let body_type = canonical_body_type(raw_type);
        let details = BodyDetails {
            content: dedent(body_from(text, whole.end())),
            body_type: body_type.to_string(),
        };
        if declared == Some(body_type) {
            return Some(details);
        }
        if first.is_none() {
            first = Some(details);
        }
    }
    first
}

fn canonical_body_type(raw: &str) -> &str {
    match raw {
        "form-urlencoded" => "formUrlEncoded",
        "multipart-form" => "multipartForm",
        other => other,
    }
}

/// Value of the first `key: value` line inside a block.
fn field(body: &str, key: &str) -> Option<String> {
    body.lines().find_map(|line| {
        let (k, v) = line.trim().split_once(':')?;
        if k.trim() == key {
            let v = v.trim();
            (!v.is_empty()).then(|| v.to_string())
        } else {
            None
        }
    })
}

/// All `key: value` lines of a block. `~`-prefixed entries are disabled.
fn pairs(body: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('~') {
            continue;
        }
        if let Some((k, v)) = line.split_once(':') {
            let k = k.trim();
            if !k.is_empty() {
                map.insert(k.to_string(), v.trim().to_string());
            }
        }
    }
    map
}

/// Strips the two-space block indentation from body content.
fn dedent(body: &str) -> String {
    body.lines()
        .map(|line| line.strip_prefix("  ").unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
