// Path allow-list and secret masking
// Callers check paths before any collection operation touches the
// filesystem, and mask captured runner text before surfacing it.

use lazy_static::lazy_static;
use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{BrunoError, Result};

lazy_static! {
    static ref BEARER: Regex = Regex::new(r"(?i)\b(bearer)\s+[A-Za-z0-9\-._~+/]+=*").unwrap();
    static ref SECRET_PAIR: Regex = Regex::new(
        r#"(?i)\b([A-Za-z0-9_\-]*(?:password|passwd|secret|token|api[_\-]?key)[A-Za-z0-9_\-]*"?)(\s*[:=]\s*)("?)([^\s"',;&]+)"#
    )
    .unwrap();
}

/// Fails with `PathNotAllowed` unless `path` lies under one of `allowed`.
/// An empty allow-list permits every path.
pub fn ensure_path_allowed(path: &Path, allowed: &[PathBuf]) -> Result<()> {
    if allowed.is_empty() {
        return Ok(());
    }
    let target = canonicalize_best_effort(path).map_err(|e| BrunoError::io(path, e))?;
    let permitted = allowed.iter().any(|root| {
        canonicalize_best_effort(root)
            .map(|root| target.starts_with(&root))
            .unwrap_or(false)
    });
    if permitted {
        Ok(())
    } else {
        Err(BrunoError::PathNotAllowed {
            path: path.to_path_buf(),
        })
    }
}

/// Canonicalizes the nearest existing ancestor and re-appends the rest.
fn canonicalize_best_effort(path: &Path) -> std::io::Result<PathBuf> {
    if path.exists() {
        return std::fs::canonicalize(path);
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut missing: Vec<OsString> = Vec::new();
    let mut cursor = absolute.as_path();
    while !cursor.exists() {
        if let Some(name) = cursor.file_name() {
            missing.push(name.to_os_string());
        }
        cursor = match cursor.parent() {
            Some(parent) => parent,
            None => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no existing ancestor for path",
                ))
            }
        };
    }

    let mut canonical = std::fs::canonicalize(cursor)?;
    for component in missing.iter().rev() {
        canonical.push(component);
    }
    Ok(canonical)
}

/// Masks bearer credentials and values of secret-looking keys.
pub fn mask_secrets(text: &str) -> String {
    let masked = BEARER.replace_all(text, "${1} ***");
    SECRET_PAIR
        .replace_all(&masked, "${1}${2}${3}***")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_key_value_pairs() {
        assert_eq!(mask_secrets("API_TOKEN=abc123"), "API_TOKEN=***");
        assert_eq!(mask_secrets("password: hunter2"), "password: ***");
        assert_eq!(
            mask_secrets(r#"{"client_secret": "xyz"}"#),
            r#"{"client_secret": "***"}"#
        );
        assert_eq!(mask_secrets("baseUrl=http://localhost"), "baseUrl=http://localhost");
    }

    #[test]
    fn masks_bearer_tokens() {
        assert_eq!(
            mask_secrets("Authorization: Bearer eyJhbGciOi.abc.def"),
            "Authorization: Bearer ***"
        );
    }

    #[test]
    fn empty_allow_list_permits_everything() {
        assert!(ensure_path_allowed(Path::new("/definitely/not/here"), &[]).is_ok());
    }

    #[test]
    fn paths_outside_allowed_roots_are_rejected() {
        let allowed = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let roots = vec![allowed.path().to_path_buf()];

        assert!(ensure_path_allowed(&allowed.path().join("api/missing"), &roots).is_ok());
        let err = ensure_path_allowed(other.path(), &roots).unwrap_err();
        assert!(matches!(err, BrunoError::PathNotAllowed { .. }));
        assert!(ensure_path_allowed(&allowed.path().join("../"), &roots).is_err());
    }
}
