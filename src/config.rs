// Runtime configuration for bruno-runner
// Resolved from BRUNO_* environment variables, overridable from the CLI.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    /// Runner program, looked up on PATH when not absolute.
    pub bruno_cli_path: String,
    /// Leading arguments placed before `run`, e.g. `@usebruno/cli` when the program is `npx`.
    pub bruno_cli_args: Vec<String>,
    pub request_timeout_ms: u64,
    pub collection_timeout_ms: u64,
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    /// Roots every touched path must live under. Empty allows everything.
    pub allowed_paths: Vec<PathBuf>,
    pub mask_secrets: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bruno_cli_path: "bru".to_string(),
            bruno_cli_args: Vec::new(),
            request_timeout_ms: 30_000,
            collection_timeout_ms: 120_000,
            cache_enabled: true,
            cache_ttl_secs: 300,
            allowed_paths: Vec::new(),
            mask_secrets: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let allowed_paths = get("BRUNO_ALLOWED_PATHS")
            .map(|raw| std::env::split_paths(&raw).collect())
            .unwrap_or_default();

        Ok(Self {
            bruno_cli_path: get("BRUNO_CLI_PATH").unwrap_or(defaults.bruno_cli_path),
            bruno_cli_args: get("BRUNO_CLI_ARGS")
                .map(|raw| raw.split_whitespace().map(str::to_string).collect())
                .unwrap_or(defaults.bruno_cli_args),
            request_timeout_ms: parse_or(
                "BRUNO_REQUEST_TIMEOUT_MS",
                get("BRUNO_REQUEST_TIMEOUT_MS"),
                defaults.request_timeout_ms,
            )?,
            collection_timeout_ms: parse_or(
                "BRUNO_COLLECTION_TIMEOUT_MS",
                get("BRUNO_COLLECTION_TIMEOUT_MS"),
                defaults.collection_timeout_ms,
            )?,
            cache_enabled: parse_or(
                "BRUNO_CACHE_ENABLED",
                get("BRUNO_CACHE_ENABLED"),
                defaults.cache_enabled,
            )?,
            cache_ttl_secs: parse_or(
                "BRUNO_CACHE_TTL_SECS",
                get("BRUNO_CACHE_TTL_SECS"),
                defaults.cache_ttl_secs,
            )?,
            allowed_paths,
            mask_secrets: parse_or(
                "BRUNO_MASK_SECRETS",
                get("BRUNO_MASK_SECRETS"),
                defaults.mask_secrets,
            )?,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }

    pub fn collection_timeout(&self) -> Duration {
        Duration::from_millis(self.collection_timeout_ms.max(1))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{}': {}", value, e),
            }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bruno_cli_path, "bru");
        assert_eq!(config.request_timeout_ms, 30_000);
        assert_eq!(config.collection_timeout_ms, 120_000);
        assert!(config.cache_enabled);
        assert!(config.allowed_paths.is_empty());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("BRUNO_CLI_PATH", "npx"),
            ("BRUNO_CLI_ARGS", "@usebruno/cli"),
            ("BRUNO_REQUEST_TIMEOUT_MS", "1500"),
            ("BRUNO_CACHE_ENABLED", "false"),
            ("BRUNO_ALLOWED_PATHS", "/srv/api"),
        ]))
        .unwrap();
        assert_eq!(config.bruno_cli_path, "npx");
        assert_eq!(config.bruno_cli_args, vec!["@usebruno/cli"]);
        assert_eq!(config.request_timeout(), Duration::from_millis(1500));
        assert!(!config.cache_enabled);
        assert_eq!(config.allowed_paths, vec![PathBuf::from("/srv/api")]);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = Config::from_lookup(lookup(&[("BRUNO_CACHE_TTL_SECS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("BRUNO_CACHE_TTL_SECS"));
    }
}
