//! Tracker configuration.
//!
//! Resolution order, lowest to highest precedence:
//! built-in defaults, `~/.session-tracker/config.toml`, environment, CLI flags.
//! The CLI layer is applied by the binary; everything else lives here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TrackerError};

pub const TRACKER_DIR: &str = ".session-tracker";
pub const CONFIG_FILE: &str = "config.toml";
pub const TOKEN_FILE: &str = "token.json";

pub const ENV_PROCESS: &str = "SESSION_TRACKER_PROCESS";
pub const ENV_POLL_SECS: &str = "SESSION_TRACKER_POLL_SECS";
pub const ENV_CALENDAR_ID: &str = "SESSION_TRACKER_CALENDAR_ID";
/// Key used by older `.env` based setups.
pub const ENV_LEGACY_CALENDAR_ID: &str = "CALENDAR_ID";

const DEFAULT_PROCESS_NAME: &str = "cs2.exe";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_SUMMARY: &str = "CS2 Session";
const DEFAULT_DESCRIPTION: &str = "Tracked automatically";
const DEFAULT_MIN_EVENT_SECS: u64 = 60;
/// Upper bounds accepted by `validate`.
pub const MAX_POLL_INTERVAL_SECS: u64 = 24 * 60 * 60;
pub const MAX_MIN_EVENT_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    pub process_name: String,
    pub poll_interval_secs: u64,
    pub calendar_id: String,
    pub summary: String,
    pub description: String,
    pub time_zone: Option<String>,
    pub min_event_secs: u64,
    pub flush_on_shutdown: bool,
    pub token_path: Option<PathBuf>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            process_name: DEFAULT_PROCESS_NAME.to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            calendar_id: String::new(),
            summary: DEFAULT_SUMMARY.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            time_zone: None,
            min_event_secs: DEFAULT_MIN_EVENT_SECS,
            flush_on_shutdown: true,
            token_path: None,
        }
    }
}

/// Returns the tracker's home directory (~/.session-tracker).
pub fn tracker_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(TrackerError::HomeDirNotFound)?;
    Ok(home.join(TRACKER_DIR))
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(tracker_dir()?.join(CONFIG_FILE))
}

impl TrackerConfig {
    /// Loads the TOML config. A missing file yields defaults; a present but
    /// unreadable or malformed one is an error.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path,
            None => default_config_path()?,
        };

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    fn load_from(path: &Path) -> Result<Self> {
        let content =
            fs_err::read_to_string(path).map_err(|source| TrackerError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;
        toml::from_str::<TrackerConfig>(&content).map_err(|err| TrackerError::ConfigMalformed {
            path: path.to_path_buf(),
            details: err.to_string(),
        })
    }

    /// Applies environment overrides through `lookup` (normally `std::env::var`).
    /// Unparseable numeric values are errors rather than silently ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(process) = non_empty(ENV_PROCESS) {
            self.process_name = process.trim().to_string();
        }

        if let Some(raw) = non_empty(ENV_POLL_SECS) {
            self.poll_interval_secs = raw.trim().parse().map_err(|_| {
                TrackerError::ConfigInvalid(format!(
                    "{} must be a whole number of seconds, got {:?}",
                    ENV_POLL_SECS, raw
                ))
            })?;
        }

        if let Some(calendar_id) =
            non_empty(ENV_CALENDAR_ID).or_else(|| non_empty(ENV_LEGACY_CALENDAR_ID))
        {
            self.calendar_id = calendar_id.trim().to_string();
        }

        Ok(())
    }

    /// Startup checks. Any failure here means the tracker must not start.
    pub fn validate(&self) -> Result<()> {
        if self.process_name.trim().is_empty() {
            return Err(TrackerError::ConfigInvalid(
                "process_name must not be empty".to_string(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(TrackerError::ConfigInvalid(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
            return Err(TrackerError::ConfigInvalid(format!(
                "poll_interval_secs must be at most {}",
                MAX_POLL_INTERVAL_SECS
            )));
        }
        if self.min_event_secs > MAX_MIN_EVENT_SECS {
            return Err(TrackerError::ConfigInvalid(format!(
                "min_event_secs must be at most {}",
                MAX_MIN_EVENT_SECS
            )));
        }
        if self.calendar_id.trim().is_empty() {
            return Err(TrackerError::ConfigInvalid(format!(
                "calendar_id is not set (config file, {} or {})",
                ENV_CALENDAR_ID, ENV_LEGACY_CALENDAR_ID
            )));
        }
        if let Some(zone) = &self.time_zone {
            if zone.trim().is_empty() {
                return Err(TrackerError::ConfigInvalid(
                    "time_zone must be omitted or non-empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Saturates at `MAX_MIN_EVENT_SECS`; `validate` rejects anything above it.
    pub fn min_event_duration(&self) -> chrono::Duration {
        let secs = self.min_event_secs.min(MAX_MIN_EVENT_SECS);
        i64::try_from(secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(chrono::Duration::zero)
    }

    pub fn resolved_token_path(&self) -> Result<PathBuf> {
        match &self.token_path {
            Some(path) => Ok(path.clone()),
            None => Ok(tracker_dir()?.join(TOKEN_FILE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn load_defaults_when_file_missing() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("missing.toml");
        let config = TrackerConfig::load(Some(path)).expect("load config");
        assert_eq!(config, TrackerConfig::default());
        assert_eq!(config.process_name, "cs2.exe");
        assert_eq!(config.poll_interval_secs, 10);
        assert!(config.flush_on_shutdown);
    }

    #[test]
    fn load_parses_partial_file() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("config.toml");
        fs_err::write(
            &path,
            r#"
process_name = "eldenring.exe"
poll_interval_secs = 30
calendar_id = "abc123@group.calendar.google.com"
time_zone = "Australia/Melbourne"
"#,
        )
        .expect("write config");

        let config = TrackerConfig::load(Some(path)).expect("load config");
        assert_eq!(config.process_name, "eldenring.exe");
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.calendar_id, "abc123@group.calendar.google.com");
        assert_eq!(config.time_zone.as_deref(), Some("Australia/Melbourne"));
        assert_eq!(config.summary, "CS2 Session");
        assert_eq!(config.min_event_duration(), chrono::Duration::seconds(60));
    }

    #[test]
    fn load_rejects_malformed_file() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("config.toml");
        fs_err::write(&path, "poll_interval_secs = \"soon\"").expect("write config");

        let err = TrackerConfig::load(Some(path)).expect_err("malformed config");
        assert!(matches!(err, TrackerError::ConfigMalformed { .. }));
    }

    #[test]
    fn load_rejects_unknown_keys() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("config.toml");
        fs_err::write(&path, "poll_intervall_secs = 5").expect("write config");

        assert!(TrackerConfig::load(Some(path)).is_err());
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut config = TrackerConfig {
            calendar_id: "from-file".to_string(),
            ..TrackerConfig::default()
        };
        config
            .apply_env_overrides(lookup_from(&[
                (ENV_PROCESS, "game.exe"),
                (ENV_POLL_SECS, " 5 "),
                (ENV_CALENDAR_ID, "from-env"),
                (ENV_LEGACY_CALENDAR_ID, "legacy"),
            ]))
            .expect("apply env");

        assert_eq!(config.process_name, "game.exe");
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.calendar_id, "from-env");
    }

    #[test]
    fn legacy_calendar_id_used_as_fallback() {
        let mut config = TrackerConfig::default();
        config
            .apply_env_overrides(lookup_from(&[(ENV_LEGACY_CALENDAR_ID, "legacy")]))
            .expect("apply env");
        assert_eq!(config.calendar_id, "legacy");
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = TrackerConfig::default();
        config
            .apply_env_overrides(lookup_from(&[(ENV_PROCESS, "  "), (ENV_CALENDAR_ID, "")]))
            .expect("apply env");
        assert_eq!(config.process_name, "cs2.exe");
        assert!(config.calendar_id.is_empty());
    }

    #[test]
    fn bad_poll_override_is_an_error() {
        let mut config = TrackerConfig::default();
        let err = config
            .apply_env_overrides(lookup_from(&[(ENV_POLL_SECS, "ten")]))
            .expect_err("bad poll value");
        assert!(matches!(err, TrackerError::ConfigInvalid(_)));
    }

    #[test]
    fn validate_requires_calendar_id() {
        let config = TrackerConfig::default();
        assert!(matches!(
            config.validate(),
            Err(TrackerError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let config = TrackerConfig {
            calendar_id: "primary".to_string(),
            poll_interval_secs: 0,
            ..TrackerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_huge_interval() {
        let config = TrackerConfig {
            calendar_id: "primary".to_string(),
            poll_interval_secs: u64::MAX,
            ..TrackerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TrackerError::ConfigInvalid(_))
        ));

        let one_day = TrackerConfig {
            poll_interval_secs: MAX_POLL_INTERVAL_SECS,
            ..config
        };
        assert!(one_day.validate().is_ok());
    }

    #[test]
    fn validate_rejects_huge_min_event_secs() {
        let config = TrackerConfig {
            calendar_id: "primary".to_string(),
            min_event_secs: u64::MAX / 2,
            ..TrackerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TrackerError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn min_event_duration_saturates_instead_of_panicking() {
        for secs in [u64::MAX, u64::MAX / 2, i64::MAX as u64 + 1] {
            let config = TrackerConfig {
                min_event_secs: secs,
                ..TrackerConfig::default()
            };
            assert_eq!(
                config.min_event_duration(),
                chrono::Duration::seconds(MAX_MIN_EVENT_SECS as i64)
            );
        }
    }

    #[test]
    fn validate_accepts_complete_config() {
        let config = TrackerConfig {
            calendar_id: "primary".to_string(),
            ..TrackerConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn explicit_token_path_wins() {
        let config = TrackerConfig {
            token_path: Some(PathBuf::from("/tmp/token.json")),
            ..TrackerConfig::default()
        };
        assert_eq!(
            config.resolved_token_path().expect("token path"),
            PathBuf::from("/tmp/token.json")
        );
    }
}
