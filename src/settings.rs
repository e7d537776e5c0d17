//! Tool settings loading with env-var overrides.
//!
//! Reads `ampl.toml` relative to the current working directory (or the file
//! named by `AMPL_CONFIG`), then applies `AMPL_STORE_PATH` and
//! `AMPL_LOG_LEVEL` env overrides.  Every section is optional.
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [store]
//! backend = "sqlite"          # or "memory"
//! path = "~/.ampl/config.db"
//!
//! [aliases]
//! "Legacy.Key" = "Module.Sub.Setting"
//! ```

use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::appconfig::AliasConfiguration;
use crate::display::DisplayName;
use crate::error::AppError;
use crate::logger;

const DEFAULT_SETTINGS_FILE: &str = "ampl.toml";

/// Which [`ConfigStore`](crate::appconfig::ConfigStore) the tool opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

crate::display_names!(StoreBackend {
    Memory => "memory",
    Sqlite => "sqlite",
});

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Database file for the sqlite backend (already expanded, no `~`).
    pub path: PathBuf,
}

/// Fully-resolved settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub log_level: String,
    pub store: StoreSettings,
    /// alias key -> canonical key (from `[aliases]`).
    pub aliases: HashMap<String, String>,
}

impl Settings {
    /// Alias configuration for [`AppConfig`](crate::appconfig::AppConfig).
    pub fn alias_configuration(&self) -> AliasConfiguration {
        AliasConfiguration::new(self.aliases.clone())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            store: StoreSettings {
                backend: StoreBackend::Sqlite,
                path: expand_home(&default_store_path()),
            },
            aliases: HashMap::new(),
        }
    }
}

/// `ampl.toml` as written on disk; every field falls back to a default.
#[derive(Deserialize, Default)]
struct RawSettings {
    #[serde(default)]
    log: RawLog,
    #[serde(default)]
    store: RawStore,
    #[serde(default)]
    aliases: HashMap<String, String>,
}

#[derive(Deserialize)]
struct RawLog {
    #[serde(default = "default_log_level")]
    level: String,
}

impl Default for RawLog {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

#[derive(Deserialize)]
struct RawStore {
    #[serde(default = "default_backend")]
    backend: String,
    #[serde(default = "default_store_path")]
    path: String,
}

impl Default for RawStore {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_store_path(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_backend() -> String { "sqlite".to_string() }
fn default_store_path() -> String { "~/.ampl/config.db".to_string() }

/// Load settings from `AMPL_CONFIG` or `ampl.toml`, then apply env overrides.
///
/// A missing default file yields defaults; a missing file named explicitly
/// by `AMPL_CONFIG` is an error.
pub fn load() -> Result<Settings, AppError> {
    let explicit = env::var("AMPL_CONFIG").ok();
    let path = PathBuf::from(explicit.as_deref().unwrap_or(DEFAULT_SETTINGS_FILE));
    let store_path_override = env::var("AMPL_STORE_PATH").ok();
    let log_level_override = env::var("AMPL_LOG_LEVEL").ok();

    if explicit.is_none() && !path.exists() {
        return resolve(
            RawSettings::default(),
            store_path_override.as_deref(),
            log_level_override.as_deref(),
        );
    }
    load_from(
        &path,
        store_path_override.as_deref(),
        log_level_override.as_deref(),
    )
}

/// Load settings from an explicit file.  The overrides stand in for the
/// `AMPL_STORE_PATH` / `AMPL_LOG_LEVEL` env vars.
pub fn load_from(
    path: &Path,
    store_path_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Settings, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawSettings = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    resolve(parsed, store_path_override, log_level_override)
}

fn resolve(
    raw: RawSettings,
    store_path_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Settings, AppError> {
    let backend = StoreBackend::from_display_name(&raw.store.backend).ok_or_else(|| {
        AppError::Config(format!(
            "unknown store backend '{}' (expected one of: {})",
            raw.store.backend,
            StoreBackend::VARIANTS
                .iter()
                .map(|b| b.display_name())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })?;

    let path_str = store_path_override.unwrap_or(&raw.store.path);
    let log_level = log_level_override.unwrap_or(&raw.log.level).trim().to_string();
    logger::parse_level(&log_level)
        .map_err(|e| AppError::Config(format!("[log] level: {e}")))?;

    Ok(Settings {
        log_level,
        store: StoreSettings {
            backend,
            path: expand_home(path_str),
        },
        aliases: raw.aliases,
    })
}

/// `~` and `~/...` resolve against the home directory; every other path,
/// including `~user/...`, is taken literally.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path {
        "~" => Some(""),
        _ => path.strip_prefix("~/"),
    };
    match (rest, dirs::home_dir()) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL_TOML: &str = r#"
[log]
level = "debug"

[store]
backend = "memory"
path = "/var/lib/ampl/config.db"

[aliases]
"Legacy.Timeout" = "Net.Timeout"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_full_settings() {
        let f = write_toml(FULL_TOML);
        let s = load_from(f.path(), None, None).unwrap();
        assert_eq!(s.log_level, "debug");
        assert_eq!(s.store.backend, StoreBackend::Memory);
        assert_eq!(s.store.path, PathBuf::from("/var/lib/ampl/config.db"));
        assert_eq!(s.aliases.get("Legacy.Timeout").map(String::as_str), Some("Net.Timeout"));
    }

    #[test]
    fn empty_file_uses_defaults() {
        let f = write_toml("");
        let s = load_from(f.path(), None, None).unwrap();
        assert_eq!(s.log_level, "info");
        assert_eq!(s.store.backend, StoreBackend::Sqlite);
        assert!(s.store.path.ends_with(".ampl/config.db"));
        assert!(s.aliases.is_empty());
    }

    #[test]
    fn unknown_backend_errors() {
        let f = write_toml("[store]\nbackend = \"redis\"\n");
        let err = load_from(f.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("unknown store backend 'redis'"));
        assert!(err.to_string().contains("memory, sqlite"));
    }

    #[test]
    fn malformed_toml_errors() {
        let f = write_toml("[store\n");
        let err = load_from(f.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("parse error"));
    }

    #[test]
    fn missing_file_errors() {
        let err = load_from(Path::new("/nonexistent/ampl.toml"), None, None).unwrap_err();
        assert!(err.to_string().starts_with("config error: cannot read"));
    }

    #[test]
    fn bad_log_level_errors() {
        let f = write_toml("[log]\nlevel = \"loud\"\n");
        let err = load_from(f.path(), None, None).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("[log] level"));

        let f = write_toml(FULL_TOML);
        assert!(load_from(f.path(), None, Some("verbose")).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let f = write_toml(FULL_TOML);
        let s = load_from(f.path(), Some("/tmp/override.db"), Some("trace")).unwrap();
        assert_eq!(s.store.path, PathBuf::from("/tmp/override.db"));
        assert_eq!(s.log_level, "trace");
    }

    #[test]
    fn aliases_feed_alias_configuration() {
        use crate::appconfig::Configuration;
        let f = write_toml(FULL_TOML);
        let s = load_from(f.path(), None, None).unwrap();
        let cfg = s.alias_configuration();
        assert_eq!(cfg.resolve_default_key("Legacy.Timeout").as_deref(), Some("Net.Timeout"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let Some(home) = dirs::home_dir() else { return };
        assert_eq!(expand_home("~/.ampl/config.db"), home.join(".ampl/config.db"));
        assert_eq!(expand_home("~"), home);
    }

    #[test]
    fn other_users_home_is_literal() {
        assert_eq!(expand_home("~bob/x"), PathBuf::from("~bob/x"));
    }

    #[test]
    fn absolute_path_unchanged() {
        assert_eq!(expand_home("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn relative_path_unchanged() {
        assert_eq!(expand_home("relative/path"), PathBuf::from("relative/path"));
    }
}
