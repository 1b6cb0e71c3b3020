use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Result, TipError};
use crate::localization;
use crate::schedule::Frequency;

/// Project defaults, also written out as the user's config blueprint.
pub const DEFAULT_CONFIG: &str = include_str!("../tipday.toml");

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub enabled: bool,
    pub show_on_startup: bool,
    pub frequency: Frequency,
    pub startup_hour_local: Option<u32>,
    pub language: String,
    pub tips_dir: Option<String>,
    pub state_file: Option<String>,
}

impl Settings {
    /// Layers: built-in defaults, the user config (created from the defaults if
    /// missing), `./tipday.toml`, an explicit `--config` file, then `TIPDAY_*`.
    pub fn new(explicit: Option<&Path>) -> Result<Self> {
        let user_config_path = get_user_config_path();

        if let Some(path) = &user_config_path
            && !path.exists()
        {
            if let Err(e) = write_blueprint(path) {
                warn!(path = %path.display(), error = %e, "could not write user config");
            }
        }

        Self::load_from(user_config_path.as_deref(), Some(Path::new("tipday.toml")), explicit)
    }

    pub fn load_from(user: Option<&Path>, local: Option<&Path>, explicit: Option<&Path>) -> Result<Self> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));
        if let Some(user) = user {
            builder = builder.add_source(File::from(user.to_path_buf()).format(FileFormat::Toml).required(false));
        }
        if let Some(local) = local {
            builder = builder.add_source(File::from(local.to_path_buf()).format(FileFormat::Toml).required(false));
        }
        if let Some(explicit) = explicit {
            builder = builder.add_source(File::from(explicit.to_path_buf()).format(FileFormat::Toml).required(true));
        }
        let s = builder
            .add_source(Environment::with_prefix("TIPDAY").try_parsing(true))
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        settings.validate()
    }

    fn validate(mut self) -> Result<Self> {
        if let Some(hour) = self.startup_hour_local
            && hour > 23
        {
            return Err(TipError::Config {
                details: format!("startup_hour_local must be between 0 and 23, got {hour}"),
            });
        }
        self.language = localization::resolve(&self.language).map_err(|_| TipError::Config {
            details: format!("unsupported language '{}'", self.language),
        })?;
        debug!(settings = ?self, "settings loaded");
        Ok(self)
    }

    pub fn tips_path(&self) -> Option<PathBuf> {
        self.tips_dir.as_deref().map(expand)
    }

    pub fn state_path(&self) -> PathBuf {
        match &self.state_file {
            Some(path) => expand(path),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("tipday")
                .join("state.json"),
        }
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

fn write_blueprint(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, DEFAULT_CONFIG)
}

pub fn get_user_config_path() -> Option<PathBuf> {
    let mut path = dirs::home_dir()?;
    path.push(".config");
    path.push("tipday");
    path.push("tipday.toml");
    Some(path)
}

/// Rewrites a single key in a TOML config file, keeping the other keys.
pub fn save_setting(path: &Path, key: &str, value: toml::Value) -> Result<()> {
    let config_str = fs::read_to_string(path).unwrap_or_default();
    let mut doc = config_str.parse::<toml::Table>().map_err(|e| TipError::Config {
        details: format!("{}: {e}", path.display()),
    })?;

    doc.insert(key.to_string(), value);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| storage(path, e))?;
    }
    fs::write(path, doc.to_string()).map_err(|e| storage(path, e))?;
    Ok(())
}

fn storage(path: &Path, e: std::io::Error) -> TipError {
    TipError::Storage { path: path.to_path_buf(), details: e.to_string() }
}

pub fn save_user_setting(key: &str, value: toml::Value) -> Result<()> {
    let path = get_user_config_path().ok_or_else(|| TipError::Config {
        details: "no home directory to store settings in".to_string(),
    })?;
    save_setting(&path, key, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::load_from(None, None, None).unwrap();
        assert!(settings.enabled);
        assert!(settings.show_on_startup);
        assert_eq!(settings.frequency, Frequency::Daily);
        assert_eq!(settings.startup_hour_local, None);
        assert_eq!(settings.language, "en");
        assert_eq!(settings.tips_path(), None);
    }

    #[test]
    fn later_layers_win() {
        let dir = TempDir::new().unwrap();
        let user = dir.path().join("user.toml");
        let local = dir.path().join("local.toml");
        fs::write(&user, "frequency = \"weekly\"\nlanguage = \"es\"\n").unwrap();
        fs::write(&local, "frequency = \"calendar-day\"\nstartup_hour_local = 8\n").unwrap();

        let settings = Settings::load_from(Some(&user), Some(&local), None).unwrap();
        assert_eq!(settings.frequency, Frequency::CalendarDay);
        assert_eq!(settings.language, "es");
        assert_eq!(settings.startup_hour_local, Some(8));
    }

    #[test]
    fn rejects_bad_values_and_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let cases = [
            ("hour.toml", "startup_hour_local = 24\n"),
            ("lang.toml", "language = \"tlh\"\n"),
            ("freq.toml", "frequency = \"hourly\"\n"),
            ("key.toml", "colour = \"blue\"\n"),
        ];
        for (name, body) in cases {
            let path = dir.path().join(name);
            fs::write(&path, body).unwrap();
            let result = Settings::load_from(None, None, Some(&path));
            assert!(matches!(result, Err(TipError::Config { .. })), "{name} should be rejected");
        }
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Settings::load_from(None, None, Some(&missing)).is_err());
    }

    #[test]
    fn save_setting_keeps_other_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tipday.toml");
        fs::write(&path, "frequency = \"weekly\"\n").unwrap();
        save_setting(&path, "enabled", toml::Value::Boolean(false)).unwrap();

        let settings = Settings::load_from(Some(&path), None, None).unwrap();
        assert!(!settings.enabled);
        assert_eq!(settings.frequency, Frequency::Weekly);
    }

    #[test]
    fn paths_expand_home() {
        let mut settings = Settings::load_from(None, None, None).unwrap();
        settings.state_file = Some("~/tipday-state.json".to_string());
        settings.tips_dir = Some("/srv/tips".to_string());
        assert!(!settings.state_path().to_string_lossy().starts_with('~'));
        assert_eq!(settings.tips_path(), Some(PathBuf::from("/srv/tips")));
    }
}
