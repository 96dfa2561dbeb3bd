use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

use crate::motion::ControllerConfig;

pub const ENV_MARGIN: &str = "MOTION_RECORDER_MARGIN";
pub const ENV_THRESHOLD: &str = "MOTION_RECORDER_THRESHOLD";
pub const ENV_OUTPUT_DIR: &str = "MOTION_RECORDER_OUTPUT_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderSettings {
    /// Pre-roll length and cooldown, in frames.
    pub margin: usize,
    pub pixel_threshold: u8,
    /// Motion fires when more than `1 / area_divisor` of the pixels changed.
    pub area_divisor: u32,
    pub poll_interval_ms: u64,
    pub output_dir: PathBuf,
    pub extension: String,
    pub jpeg_quality: u8,
    /// Queue length above which the capture thread warns about a slow consumer.
    pub backlog_warn: usize,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            margin: 100,
            pixel_threshold: 10,
            area_divisor: 10,
            poll_interval_ms: 40,
            output_dir: PathBuf::from("recordings"),
            extension: "mjpeg".into(),
            jpeg_quality: 85,
            backlog_warn: 50,
        }
    }
}

impl RecorderSettings {
    pub fn validate(&self) -> Result<()> {
        if self.margin == 0 {
            bail!("margin must be at least one frame");
        }
        if self.area_divisor == 0 {
            bail!("areaDivisor must be at least 1");
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            bail!("jpegQuality must be within 1..=100, got {}", self.jpeg_quality);
        }
        if self.extension.is_empty() || self.extension.contains(['/', '\\', '.']) {
            bail!("extension {:?} is not a plain file extension", self.extension);
        }
        Ok(())
    }

    /// Applies `MOTION_RECORDER_*` variables on top of the loaded values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup(ENV_MARGIN) {
            self.margin = value
                .trim()
                .parse()
                .with_context(|| format!("{ENV_MARGIN}={value} is not a frame count"))?;
        }
        if let Some(value) = lookup(ENV_THRESHOLD) {
            self.pixel_threshold = value
                .trim()
                .parse()
                .with_context(|| format!("{ENV_THRESHOLD}={value} is not within 0..=255"))?;
        }
        if let Some(value) = lookup(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(value);
        }
        Ok(())
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            margin: self.margin,
            pixel_threshold: self.pixel_threshold,
            area_divisor: self.area_divisor,
            extension: self.extension.clone(),
        }
    }
}

/// JSON-backed settings file.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<RecorderSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring unreadable settings in {}: {err}; using defaults",
                    path.display()
                );
                RecorderSettings::default()
            })
        } else {
            RecorderSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> RecorderSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, settings: RecorderSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &RecorderSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.settings(), RecorderSettings::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "margin": 12, "outputDir": "/tmp/clips" }"#).unwrap();

        let settings = SettingsStore::new(path).unwrap().settings();
        assert_eq!(settings.margin, 12);
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/clips"));
        assert_eq!(settings.pixel_threshold, 10);
    }

    #[test]
    fn garbage_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();

        assert_eq!(SettingsStore::new(path).unwrap().settings(), RecorderSettings::default());
    }

    #[test]
    fn update_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut changed = store.settings();
        changed.margin = 7;
        store.update(changed.clone()).unwrap();

        assert_eq!(SettingsStore::new(path).unwrap().settings(), changed);
    }

    #[test]
    fn update_rejects_invalid_settings() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();

        let invalid = RecorderSettings {
            margin: 0,
            ..RecorderSettings::default()
        };
        assert!(store.update(invalid).is_err());
        assert_eq!(store.settings().margin, 100);
    }

    #[test]
    fn overrides_replace_loaded_values() {
        let vars: HashMap<&str, &str> = [
            (ENV_MARGIN, " 30 "),
            (ENV_THRESHOLD, "25"),
            (ENV_OUTPUT_DIR, "/var/clips"),
        ]
        .into();

        let mut settings = RecorderSettings::default();
        settings
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.margin, 30);
        assert_eq!(settings.pixel_threshold, 25);
        assert_eq!(settings.output_dir, PathBuf::from("/var/clips"));
    }

    #[test]
    fn bad_override_is_an_error() {
        let mut settings = RecorderSettings::default();
        let result = settings.apply_overrides(|key| (key == ENV_THRESHOLD).then(|| "300".into()));
        assert!(result.is_err());
    }

    #[test]
    fn validation_catches_bad_values() {
        let base = RecorderSettings::default();
        assert!(base.validate().is_ok());
        assert!(RecorderSettings { jpeg_quality: 0, ..base.clone() }.validate().is_err());
        assert!(RecorderSettings { area_divisor: 0, ..base.clone() }.validate().is_err());
        assert!(RecorderSettings { extension: "a/b".into(), ..base }.validate().is_err());
    }
}
