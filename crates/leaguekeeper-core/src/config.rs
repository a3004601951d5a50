// Configuration loading and parsing (leaguekeeper.toml, credentials.toml).

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::schedule::Pacing;
use crate::sync::RetryPolicy;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },

    #[error("no platform data directory available for the database")]
    NoDataDir,
}

// ---------------------------------------------------------------------------
// Assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub schedule: ScheduleConfig,
    pub sync: SyncConfig,
    pub credentials: CredentialsConfig,
}

/// Raw deserialization target for leaguekeeper.toml.
#[derive(Debug, Clone, Deserialize)]
struct SettingsFile {
    database: DatabaseConfig,
    #[serde(default)]
    schedule: ScheduleConfig,
    #[serde(default)]
    sync: SyncConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Empty means the platform data directory.
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    pub games_per_week: u32,
    #[serde(default)]
    pub spread_days: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            games_per_week: 2,
            spread_days: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Days ahead of today that each pass publishes.
    pub window_days: u32,
    pub interval_secs: u64,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            interval_secs: 300,
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub calendar: Option<CalendarCredentials>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarCredentials {
    pub base_url: String,
    pub api_token: Option<String>,
}

impl Config {
    /// The database file, falling back to the platform data directory when
    /// `database.path` is empty.
    pub fn db_path(&self) -> Result<PathBuf, ConfigError> {
        if !self.database.path.trim().is_empty() {
            return Ok(PathBuf::from(self.database.path.trim()));
        }
        let dirs = ProjectDirs::from("org", "leaguekeeper", "leaguekeeper").ok_or(ConfigError::NoDataDir)?;
        Ok(dirs.data_dir().join("leaguekeeper.db"))
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            games_per_week: self.schedule.games_per_week,
            spread_days: self.schedule.spread_days,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.sync.max_attempts,
            Duration::from_millis(self.sync.base_delay_ms),
        )
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/leaguekeeper.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    let settings_path = config_dir.join("leaguekeeper.toml");
    let settings_text = read_file(&settings_path)?;
    let settings: SettingsFile =
        toml::from_str(&settings_text).map_err(|e| ConfigError::ParseError {
            path: settings_path.clone(),
            source: e,
        })?;

    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        database: settings.database,
        schedule: settings.schedule,
        sync: settings.sync,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Settings seeded from `defaults/` on first run. Credentials are never
/// seeded: `defaults/credentials.toml.example` is a template filled in by hand.
const SEEDED_FILES: &[&str] = &["leaguekeeper.toml"];

/// Copy each seeded settings file from `defaults/` into `config/` unless it
/// is already there. Returns the files that were written.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");
    let copy_error = |message: String| ConfigError::DefaultsCopyError { message };

    let mut copied = Vec::new();
    for name in SEEDED_FILES {
        let target = config_dir.join(name);
        if target.exists() {
            continue;
        }
        let source = defaults_dir.join(name);
        if !source.is_file() {
            return Err(copy_error(format!(
                "{} is missing and there is no {} to seed it from",
                target.display(),
                source.display()
            )));
        }
        std::fs::create_dir_all(&config_dir)
            .map_err(|e| copy_error(format!("failed to create {}: {e}", config_dir.display())))?;
        std::fs::copy(&source, &target).map_err(|e| {
            copy_error(format!("failed to copy {} to {}: {e}", source.display(), target.display()))
        })?;
        info!("Seeded {} from defaults", target.display());
        copied.push(target);
    }

    Ok(copied)
}

/// Load config relative to the current working directory, copying default
/// files first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Longest look-ahead a sync pass may publish.
pub const MAX_WINDOW_DAYS: u32 = 366;

fn validate(config: &Config) -> Result<(), ConfigError> {
    if let Err(rejection) = config.pacing().validate() {
        return Err(ConfigError::ValidationError {
            field: "schedule".into(),
            message: rejection.to_string(),
        });
    }

    if config.sync.window_days > MAX_WINDOW_DAYS {
        return Err(ConfigError::ValidationError {
            field: "sync.window_days".into(),
            message: format!("must be at most {MAX_WINDOW_DAYS}, got {}", config.sync.window_days),
        });
    }

    let sync_fields: &[(&str, u64)] = &[
        ("sync.interval_secs", config.sync.interval_secs),
        ("sync.max_attempts", u64::from(config.sync.max_attempts)),
    ];
    for (name, val) in sync_fields {
        if *val == 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be > 0".into(),
            });
        }
    }

    if let Some(calendar) = &config.credentials.calendar {
        let url = calendar.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError {
                field: "calendar.base_url".into(),
                message: format!("must be an http(s) URL, got `{url}`"),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SETTINGS: &str = r#"
[database]
path = "league.db"

[schedule]
games_per_week = 2
spread_days = 0

[sync]
window_days = 7
interval_secs = 300
max_attempts = 3
base_delay_ms = 500
"#;

    /// Helper: a scratch directory with `config/leaguekeeper.toml` holding
    /// `settings`.
    fn scratch(name: &str, settings: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config/leaguekeeper.toml"), settings).unwrap();
        tmp
    }

    #[test]
    fn loads_settings_without_credentials() {
        let tmp = scratch("lk_config_no_creds", SETTINGS);
        let config = load_config_from(&tmp).expect("should load");

        assert_eq!(config.db_path().unwrap(), PathBuf::from("league.db"));
        assert_eq!(config.pacing(), Pacing::weekly(2));
        assert_eq!(config.sync.window_days, 7);
        assert_eq!(config.sync_interval(), Duration::from_secs(300));
        assert_eq!(config.retry_policy().max_attempts, 3);
        assert!(config.credentials.calendar.is_none());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn optional_sections_default() {
        let tmp = scratch("lk_config_defaults", "[database]\npath = \"x.db\"\n");
        let config = load_config_from(&tmp).expect("should load");
        assert_eq!(config.schedule.games_per_week, 2);
        assert_eq!(config.sync.interval_secs, 300);
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn calendar_credentials_loaded() {
        let tmp = scratch("lk_config_with_creds", SETTINGS);
        fs::write(
            tmp.join("config/credentials.toml"),
            "[calendar]\nbase_url = \"https://calendar.example.org/api\"\napi_token = \"secret\"\n",
        )
        .unwrap();

        let config = load_config_from(&tmp).expect("should load");
        let calendar = config.credentials.calendar.expect("calendar section");
        assert_eq!(calendar.base_url, "https://calendar.example.org/api");
        assert_eq!(calendar.api_token.as_deref(), Some("secret"));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_games_per_week() {
        let tmp = scratch(
            "lk_config_zero_games",
            &SETTINGS.replace("games_per_week = 2", "games_per_week = 0"),
        );
        match load_config_from(&tmp) {
            Err(ConfigError::ValidationError { field, .. }) => assert_eq!(field, "schedule"),
            other => panic!("expected validation error, got {other:?}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_interval() {
        let tmp = scratch(
            "lk_config_zero_interval",
            &SETTINGS.replace("interval_secs = 300", "interval_secs = 0"),
        );
        match load_config_from(&tmp) {
            Err(ConfigError::ValidationError { field, .. }) => {
                assert_eq!(field, "sync.interval_secs")
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_non_http_calendar_url() {
        let tmp = scratch("lk_config_bad_url", SETTINGS);
        fs::write(
            tmp.join("config/credentials.toml"),
            "[calendar]\nbase_url = \"calendar.local\"\n",
        )
        .unwrap();
        assert!(matches!(
            load_config_from(&tmp),
            Err(ConfigError::ValidationError { .. })
        ));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_settings_file() {
        let tmp = std::env::temp_dir().join("lk_config_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        assert!(matches!(
            load_config_from(&tmp),
            Err(ConfigError::FileNotFound { .. })
        ));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let tmp = scratch("lk_config_invalid", "[database\npath = ");
        assert!(matches!(
            load_config_from(&tmp),
            Err(ConfigError::ParseError { .. })
        ));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_missing_and_skips_examples() {
        let tmp = std::env::temp_dir().join("lk_config_ensure");
        let _ = fs::remove_dir_all(&tmp);
        let defaults_dir = tmp.join("defaults");
        fs::create_dir_all(&defaults_dir).unwrap();
        fs::write(defaults_dir.join("leaguekeeper.toml"), SETTINGS).unwrap();
        fs::write(
            defaults_dir.join("credentials.toml.example"),
            "[calendar]\nbase_url = \"https://...\"\n",
        )
        .unwrap();

        let copied = ensure_config_files(&tmp).expect("should succeed");
        assert_eq!(copied.len(), 1);
        assert!(tmp.join("config/leaguekeeper.toml").exists());
        assert!(!tmp.join("config/credentials.toml.example").exists());

        // A second run copies nothing and keeps local edits.
        fs::write(tmp.join("config/leaguekeeper.toml"), "# custom\n").unwrap();
        assert!(ensure_config_files(&tmp).unwrap().is_empty());
        assert_eq!(
            fs::read_to_string(tmp.join("config/leaguekeeper.toml")).unwrap(),
            "# custom\n"
        );

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_without_defaults() {
        let tmp = std::env::temp_dir().join("lk_config_no_defaults");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();
        assert!(matches!(
            ensure_config_files(&tmp),
            Err(ConfigError::DefaultsCopyError { .. })
        ));

        // An existing settings file needs no defaults.
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config/leaguekeeper.toml"), SETTINGS).unwrap();
        assert!(ensure_config_files(&tmp).unwrap().is_empty());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_oversized_sync_window() {
        let tmp = scratch(
            "lk_config_big_window",
            &SETTINGS.replace("window_days = 7", "window_days = 4000000000"),
        );
        match load_config_from(&tmp) {
            Err(ConfigError::ValidationError { field, .. }) => assert_eq!(field, "sync.window_days"),
            other => panic!("expected validation error, got {other:?}"),
        }
        let _ = fs::remove_dir_all(&tmp);

        let tmp = scratch(
            "lk_config_year_window",
            &SETTINGS.replace("window_days = 7", "window_days = 366"),
        );
        assert_eq!(load_config_from(&tmp).unwrap().sync.window_days, 366);
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn empty_db_path_uses_data_dir() {
        let tmp = scratch("lk_config_data_dir", "[database]\npath = \"\"\n");
        let config = load_config_from(&tmp).unwrap();
        if let Ok(path) = config.db_path() {
            assert!(path.ends_with("leaguekeeper.db"));
        }
        let _ = fs::remove_dir_all(&tmp);
    }
}
