//! OS-specific path resolution for configuration files

use desk_types::{AppError, AppResult};
use std::path::PathBuf;

/// Get the configuration directory
///
/// Priority:
/// 1. Runtime override via `DESKCLI_ENV` environment variable: `~/.deskcli-{env}/`
/// 2. Development mode (debug builds): `~/.deskcli-dev/`
/// 3. Production mode (release builds): `~/.deskcli/`
pub fn config_dir() -> AppResult<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AppError::Config("Could not determine home directory".to_string()))?;

    // Runtime override via environment variable (for testing)
    if let Ok(env_suffix) = std::env::var("DESKCLI_ENV") {
        return Ok(home.join(format!(".deskcli-{}", env_suffix)));
    }

    // Use separate directory for development/debug builds
    #[cfg(debug_assertions)]
    let dir = home.join(".deskcli-dev");

    #[cfg(not(debug_assertions))]
    let dir = home.join(".deskcli");

    Ok(dir)
}

/// Get the settings file path
pub fn settings_file() -> AppResult<PathBuf> {
    Ok(config_dir()?.join("settings.yaml"))
}

/// Get the directory holding in-flight manual authorization records
///
/// All platforms: `<config>/auth_state/`
pub fn auth_state_dir() -> AppResult<PathBuf> {
    Ok(config_dir()?.join("auth_state"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir_exists(path: &PathBuf) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| {
            AppError::Config(format!(
                "Failed to create directory {}: {}",
                path.display(),
                e
            ))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_config_dir() {
        env::remove_var("DESKCLI_ENV");

        let dir = config_dir().unwrap();
        assert!(!dir.as_os_str().is_empty());

        // In debug builds, uses .deskcli-dev; in release, uses .deskcli
        #[cfg(debug_assertions)]
        assert!(dir.to_string_lossy().ends_with(".deskcli-dev"));

        #[cfg(not(debug_assertions))]
        assert!(dir.to_string_lossy().ends_with(".deskcli"));
    }

    #[test]
    #[serial]
    fn test_config_dir_with_env_override() {
        env::set_var("DESKCLI_ENV", "test");

        let dir = config_dir().unwrap();
        assert!(
            dir.to_string_lossy().ends_with(".deskcli-test"),
            "Expected path to end with .deskcli-test, got: {}",
            dir.display()
        );

        env::remove_var("DESKCLI_ENV");
    }

    #[test]
    #[serial]
    fn test_settings_file() {
        env::remove_var("DESKCLI_ENV");

        let file = settings_file().unwrap();
        assert!(file.to_string_lossy().ends_with("settings.yaml"));
    }

    #[test]
    #[serial]
    fn test_auth_state_dir() {
        env::remove_var("DESKCLI_ENV");

        let dir = auth_state_dir().unwrap();
        assert!(dir.to_string_lossy().ends_with("auth_state"));
    }

    #[test]
    fn test_ensure_dir_exists() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");

        ensure_dir_exists(&nested).unwrap();
        assert!(nested.is_dir());

        // Idempotent
        ensure_dir_exists(&nested).unwrap();
    }
}
