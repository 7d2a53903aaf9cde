//! Monitor settings and the stores they are read from.
//!
//! The settings record is small and flat:
//! - `enabled`: whether monitoring runs at all
//! - `mode`: `overlay` (hard lock) or `submit` (auto-submit)
//! - `maxViolations`: escalation threshold for delay penalties
//! - `delayPenaltyEnabled` / `delayPenaltySeconds`: timed pause per violation
//!
//! Settings are read once per page load. On disk they live at
//! `~/.config/examlock/settings.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;

/// Penalty applied once a violation is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Block the page behind a lock overlay.
    #[default]
    Overlay,
    /// Submit the exam form.
    Submit,
}

impl std::str::FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overlay" => Ok(Mode::Overlay),
            "submit" => Ok(Mode::Submit),
            other => Err(ConfigError::InvalidValue {
                key: "mode".into(),
                message: format!("expected 'overlay' or 'submit', got '{other}'"),
            }),
        }
    }
}

/// Monitor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamLockConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub mode: Mode,
    /// Always at least 1 after [`ExamLockConfig::normalized`].
    #[serde(default = "default_max_violations")]
    pub max_violations: u32,
    #[serde(default = "default_true")]
    pub delay_penalty_enabled: bool,
    #[serde(default = "default_delay_penalty_seconds")]
    pub delay_penalty_seconds: u32,
}

fn default_true() -> bool {
    true
}
fn default_max_violations() -> u32 {
    3
}
fn default_delay_penalty_seconds() -> u32 {
    30
}

impl Default for ExamLockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: Mode::Overlay,
            max_violations: default_max_violations(),
            delay_penalty_enabled: true,
            delay_penalty_seconds: default_delay_penalty_seconds(),
        }
    }
}

impl ExamLockConfig {
    /// Build settings from a partially-known record.
    ///
    /// Each field is taken from `value` when present and well-typed and
    /// falls back to its default otherwise, so one bad field never discards
    /// the rest.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let defaults = Self::default();
        let field = |name: &str| value.get(name);

        let enabled = field("enabled")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(defaults.enabled);
        let mode = field("mode")
            .and_then(serde_json::Value::as_str)
            .and_then(|s| s.parse::<Mode>().ok())
            .unwrap_or(defaults.mode);
        let max_violations = field("maxViolations")
            .and_then(serde_json::Value::as_u64)
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
            .unwrap_or(defaults.max_violations);
        let delay_penalty_enabled = field("delayPenaltyEnabled")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(defaults.delay_penalty_enabled);
        let delay_penalty_seconds = field("delayPenaltySeconds")
            .and_then(serde_json::Value::as_u64)
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
            .unwrap_or(defaults.delay_penalty_seconds);

        Self {
            enabled,
            mode,
            max_violations,
            delay_penalty_enabled,
            delay_penalty_seconds,
        }
        .normalized()
    }

    /// Clamp out-of-range values.
    pub fn normalized(mut self) -> Self {
        if self.max_violations == 0 {
            tracing::warn!("maxViolations of 0 is not allowed, using 1");
            self.max_violations = 1;
        }
        self
    }

    /// Delay penalty length in milliseconds.
    pub fn delay_penalty_ms(&self) -> i64 {
        i64::from(self.delay_penalty_seconds) * 1000
    }

    /// Get a settings value as string by key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match json.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a settings value by key, parsing `value` according to the
    /// field's current type.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.into(),
            message: e.to_string(),
        })?;
        let obj = json
            .as_object_mut()
            .ok_or_else(|| ConfigError::UnknownKey(key.into()))?;
        let existing = obj
            .get(key)
            .ok_or_else(|| ConfigError::UnknownKey(key.into()))?;

        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.into(),
            message,
        };
        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|e| invalid(e.to_string()))?,
            ),
            serde_json::Value::Number(_) => {
                let n = value.parse::<u32>().map_err(|e| invalid(e.to_string()))?;
                serde_json::Value::Number(n.into())
            }
            _ => {
                if key == "mode" {
                    value.parse::<Mode>()?;
                }
                serde_json::Value::String(value.trim().to_ascii_lowercase())
            }
        };
        obj.insert(key.to_string(), new_value);

        *self = serde_json::from_value::<Self>(json)
            .map_err(|e| invalid(e.to_string()))?
            .normalized();
        Ok(())
    }
}

/// Where settings come from.
pub trait SettingsStore {
    /// `Ok(None)` means the store holds no settings yet.
    fn load(&self) -> Result<Option<ExamLockConfig>, ConfigError>;

    /// Load, falling back to defaults on any failure.
    /// This is a convenience method that never fails.
    fn load_or_default(&self) -> ExamLockConfig {
        match self.load() {
            Ok(Some(cfg)) => cfg,
            Ok(None) => ExamLockConfig::default(),
            Err(e) => {
                tracing::warn!(error = %e, "settings unavailable, using defaults");
                ExamLockConfig::default()
            }
        }
    }
}

/// Fixed settings, e.g. supplied by an embedding page.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings(pub Option<ExamLockConfig>);

impl SettingsStore for StaticSettings {
    fn load(&self) -> Result<Option<ExamLockConfig>, ConfigError> {
        Ok(self.0.clone())
    }
}

/// TOML settings file.
#[derive(Debug, Clone)]
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    /// Settings at `~/.config/examlock/settings.toml`.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn default_location() -> Result<Self, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/examlock"),
            message: e.to_string(),
        })?;
        Ok(Self::at(dir.join("settings.toml")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be serialized or written.
    pub fn save(&self, cfg: &ExamLockConfig) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: self.path.clone(),
            message,
        };
        let content = toml::to_string_pretty(cfg).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(&self.path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }
}

impl SettingsStore for FileSettings {
    fn load(&self) -> Result<Option<ExamLockConfig>, ConfigError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ConfigError::LoadFailed {
                    path: self.path.clone(),
                    message: e.to_string(),
                })
            }
        };
        let table: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        let json = serde_json::to_value(table).map_err(|e| ConfigError::LoadFailed {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        Ok(Some(ExamLockConfig::from_value(&json)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let cfg = ExamLockConfig::default();
        assert!(cfg.enabled);
        assert_eq!(cfg.mode, Mode::Overlay);
        assert_eq!(cfg.max_violations, 3);
        assert!(cfg.delay_penalty_enabled);
        assert_eq!(cfg.delay_penalty_seconds, 30);
        assert_eq!(cfg.delay_penalty_ms(), 30_000);
    }

    #[test]
    fn default_config_roundtrip() {
        let cfg = ExamLockConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        assert!(toml_str.contains("maxViolations = 3"));
        let parsed: ExamLockConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn from_value_defaults_missing_and_mistyped_fields() {
        let value = serde_json::json!({
            "mode": "submit",
            "maxViolations": "lots",
            "delayPenaltySeconds": 5,
        });
        let cfg = ExamLockConfig::from_value(&value);
        assert_eq!(cfg.mode, Mode::Submit);
        assert_eq!(cfg.max_violations, 3);
        assert_eq!(cfg.delay_penalty_seconds, 5);
        assert!(cfg.enabled);
    }

    #[test]
    fn zero_max_violations_is_clamped() {
        let cfg = ExamLockConfig::from_value(&serde_json::json!({ "maxViolations": 0 }));
        assert_eq!(cfg.max_violations, 1);
    }

    #[test]
    fn unknown_mode_falls_back_to_overlay() {
        let cfg = ExamLockConfig::from_value(&serde_json::json!({ "mode": "explode" }));
        assert_eq!(cfg.mode, Mode::Overlay);
    }

    #[test]
    fn get_returns_string_for_all_types() {
        let cfg = ExamLockConfig::default();
        assert_eq!(cfg.get("enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("maxViolations").as_deref(), Some("3"));
        assert_eq!(cfg.get("mode").as_deref(), Some("overlay"));
        assert!(cfg.get("missing").is_none());
    }

    #[test]
    fn set_parses_by_existing_type() {
        let mut cfg = ExamLockConfig::default();
        cfg.set("maxViolations", "5").unwrap();
        cfg.set("delayPenaltyEnabled", "false").unwrap();
        cfg.set("mode", "Submit").unwrap();
        assert_eq!(cfg.max_violations, 5);
        assert!(!cfg.delay_penalty_enabled);
        assert_eq!(cfg.mode, Mode::Submit);
    }

    #[test]
    fn set_rejects_unknown_key_and_bad_values() {
        let mut cfg = ExamLockConfig::default();
        assert!(matches!(
            cfg.set("theme", "dark"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(cfg.set("enabled", "maybe").is_err());
        assert!(cfg.set("mode", "lock").is_err());
        assert!(cfg.set("maxViolations", "-1").is_err());
        assert_eq!(cfg, ExamLockConfig::default());
    }

    #[test]
    fn file_settings_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettings::at(dir.path().join("settings.toml"));
        assert!(store.load().unwrap().is_none());
        assert_eq!(store.load_or_default(), ExamLockConfig::default());
    }

    #[test]
    fn file_settings_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettings::at(dir.path().join("settings.toml"));
        let cfg = ExamLockConfig {
            mode: Mode::Submit,
            max_violations: 2,
            ..ExamLockConfig::default()
        };
        store.save(&cfg).unwrap();
        assert_eq!(store.load().unwrap(), Some(cfg));
    }

    #[test]
    fn file_settings_unparseable_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();
        let store = FileSettings::at(&path);
        assert!(store.load().is_err());
        assert_eq!(store.load_or_default(), ExamLockConfig::default());
    }
}
