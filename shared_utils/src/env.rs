use thiserror::Error;

/// An environment variable required by the application is not set.
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// Reads an environment variable, returning a structured error if it's missing.
///
/// Blank values count as missing: a `.env` template line such as
/// `KITE_API_KEY=` must not produce an empty credential.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    get_optional_env_var(name).ok_or_else(|| MissingEnvVarError(name.to_string()))
}

/// Reads an optional environment variable. Unset and blank values both yield `None`.
pub fn get_optional_env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn missing_variable_is_reported_by_name() {
        // SAFETY: serialized with every other test touching the environment.
        unsafe { std::env::remove_var("SHARED_UTILS_TEST_MISSING") };
        let err = get_env_var("SHARED_UTILS_TEST_MISSING").unwrap_err();
        assert_eq!(err.to_string(), "Missing environment variable: SHARED_UTILS_TEST_MISSING");
    }

    #[test]
    #[serial]
    fn blank_variable_counts_as_missing() {
        unsafe { std::env::set_var("SHARED_UTILS_TEST_BLANK", "   ") };
        assert!(get_env_var("SHARED_UTILS_TEST_BLANK").is_err());
        assert_eq!(get_optional_env_var("SHARED_UTILS_TEST_BLANK"), None);
        unsafe { std::env::remove_var("SHARED_UTILS_TEST_BLANK") };
    }

    #[test]
    #[serial]
    fn present_variable_is_trimmed() {
        unsafe { std::env::set_var("SHARED_UTILS_TEST_PRESENT", " abc ") };
        assert_eq!(get_env_var("SHARED_UTILS_TEST_PRESENT").unwrap(), "abc");
        unsafe { std::env::remove_var("SHARED_UTILS_TEST_PRESENT") };
    }
}
