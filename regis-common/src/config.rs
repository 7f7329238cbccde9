//! Configuration loading and database location resolution

use crate::Result;
use std::path::PathBuf;

/// Environment variable consulted for the database path.
pub const DATABASE_ENV_VAR: &str = "REGIS_DATABASE";

/// Resolve the database file path, in priority order:
/// 1. Explicit argument from the caller (highest priority)
/// 2. `REGIS_DATABASE` environment variable
/// 3. `database_path` key in the TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_database_path(explicit: Option<&str>) -> Result<PathBuf> {
    // Priority 1: explicit argument
    if let Some(path) = explicit {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: environment variable
    if let Ok(path) = std::env::var(DATABASE_ENV_VAR) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    // Priority 3: TOML config file
    if let Some(config_path) = config_file_path() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(path) = config.get("database_path").and_then(|v| v.as_str()) {
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }

    // Priority 4: OS-dependent default
    Ok(default_database_path())
}

/// Configuration file location for the platform
///
/// Linux: `~/.config/regis/config.toml`, falling back to
/// `/etc/regis/config.toml`. Other platforms use the user config dir.
fn config_file_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("regis").join("config.toml"));

    if let Some(path) = &user_config {
        if path.exists() {
            return user_config;
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/regis/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    user_config
}

/// Default database location when nothing else is configured
fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("regis")
        .join("regis.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn explicit_argument_wins() {
        std::env::set_var(DATABASE_ENV_VAR, "/tmp/from-env.db");
        let path = resolve_database_path(Some("/tmp/explicit.db")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/explicit.db"));
        std::env::remove_var(DATABASE_ENV_VAR);
    }

    #[test]
    #[serial]
    fn env_var_beats_default() {
        std::env::set_var(DATABASE_ENV_VAR, "/tmp/from-env.db");
        let path = resolve_database_path(None).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/from-env.db"));
        std::env::remove_var(DATABASE_ENV_VAR);
    }

    #[test]
    #[serial]
    fn falls_back_to_platform_default() {
        std::env::remove_var(DATABASE_ENV_VAR);
        let path = resolve_database_path(None).unwrap();
        assert!(path.to_string_lossy().ends_with("regis.db"));
    }
}
