//! Environment variable parsing with warn-level logging for invalid values.

use crate::error::ConfigError;

/// Parse an environment variable with a default fallback.
///
/// - If the variable is not set: returns `default` silently (expected case).
/// - If the variable is set but cannot be parsed: logs a warning and returns `default`.
pub fn env_parse_with_default<T: std::str::FromStr + std::fmt::Display>(
    var: &str,
    default: T,
) -> T {
    match std::env::var(var) {
        Ok(v) => match v.trim().parse() {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!(
                    var,
                    value = %v,
                    default = %default,
                    "invalid env var value, using default"
                );
                default
            },
        },
        Err(_) => default,
    }
}

/// Parse an optional numeric/typed variable. Unset or empty means `None`;
/// unparseable values are logged and treated as unset.
pub fn env_parse_optional<T: std::str::FromStr>(var: &str) -> Option<T> {
    let raw = env_non_empty(var)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var, value = %raw, "invalid env var value, ignoring");
            None
        },
    }
}

/// Returns the trimmed value of a variable, treating empty strings as unset.
pub fn env_non_empty(var: &str) -> Option<String> {
    std::env::var(var).ok().map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

/// Reads a variable that the process cannot start without.
///
/// # Errors
/// Returns [`ConfigError::Missing`] when the variable is unset or empty.
pub fn env_required(var: &'static str) -> Result<String, ConfigError> {
    env_non_empty(var).ok_or(ConfigError::Missing(var))
}

/// Splits a comma-separated variable into trimmed, non-empty items.
pub fn env_list(var: &str) -> Vec<String> {
    env_non_empty(var).map(|v| split_list(&v, ',')).unwrap_or_default()
}

pub(crate) fn split_list(raw: &str, sep: char) -> Vec<String> {
    raw.split(sep).map(str::trim).filter(|s| !s.is_empty()).map(ToOwned::to_owned).collect()
}
