//! Environment variable interpolation for config files.
//!
//! Only braced references are expanded, so bare `$` characters in paths
//! (Windows admin shares, for example) survive untouched:
//! - `${VAR}` - substitute with env var value, error if missing
//! - `${VAR:-default}` - use default if VAR is unset or empty
//! - `$$` - escape sequence for literal `$`

use regex::{Captures, Regex};
use std::env;
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$|\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("Invalid regex pattern")
});

/// Result of environment variable interpolation.
#[derive(Debug)]
pub struct Interpolated {
    /// The interpolated text.
    pub text: String,
    /// Names of referenced variables that were unset and had no default.
    pub missing: Vec<String>,
}

impl Interpolated {
    /// Returns true if every reference was resolved.
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty()
    }

    /// One line per unresolved variable, for error reporting.
    pub fn error_message(&self) -> String {
        self.missing
            .iter()
            .map(|name| format!("environment variable '{name}' is not set"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Interpolate environment variables in the given text.
///
/// All missing variables are collected so they can be reported together.
pub fn interpolate(input: &str) -> Interpolated {
    let mut missing = Vec::new();

    let text = ENV_VAR_PATTERN
        .replace_all(input, |caps: &Captures| {
            let Some(name) = caps.get(1).map(|m| m.as_str()) else {
                return "$".to_string();
            };
            let default = caps.get(2).map(|m| m.as_str());

            match (env::var(name), default) {
                (Ok(value), Some(default)) if value.is_empty() => default.to_string(),
                (Ok(value), _) => value,
                (Err(_), Some(default)) => default.to_string(),
                (Err(_), None) => {
                    missing.push(name.to_string());
                    caps[0].to_string()
                }
            }
        })
        .into_owned();

    Interpolated { text, missing }
}
