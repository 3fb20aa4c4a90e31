//! Environment lookups used by configuration loading and tests.
//!
//! Set-but-blank variables are treated as unset; values are trimmed.

use thiserror::Error;

/// A required environment variable is unset or blank.
#[derive(Debug, Error)]
#[error("environment variable {0} is not set")]
pub struct MissingEnvVarError(pub String);

/// Value of `name`, trimmed, if it is set to something non-blank.
pub fn optional_env_var(name: &str) -> Option<String> {
    let raw = std::env::var(name).ok()?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Value of `name`, or [`MissingEnvVarError`] naming the variable.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    optional_env_var(name).ok_or_else(|| MissingEnvVarError(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_var_reports_its_name() {
        let err = get_env_var("SHARED_UTILS_DEFINITELY_UNSET_VAR").unwrap_err();
        assert_eq!(
            err.to_string(),
            "environment variable SHARED_UTILS_DEFINITELY_UNSET_VAR is not set"
        );
        assert!(optional_env_var("SHARED_UTILS_DEFINITELY_UNSET_VAR").is_none());
    }

    #[test]
    fn path_is_visible() {
        // PATH is set in every environment the tests run in.
        assert!(optional_env_var("PATH").is_some());
    }
}
