use crate::directive::{MAX_PAUSE_SECS, MIN_PAUSE_SECS};
use crate::engine::{DEFAULT_LANGUAGE, DEFAULT_START_DELAY, EngineConfig};
use crate::session::{DEFAULT_MAX_WPM, DEFAULT_MIN_WPM};
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Settings read from a TOML file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub typing: TypingConfig,
    #[serde(default)]
    pub pauses: PauseConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TypingConfig {
    #[serde(default = "default_min_wpm")]
    pub min_wpm: f64,
    #[serde(default = "default_max_wpm")]
    pub max_wpm: f64,
    #[serde(default = "default_language")]
    pub language: String,
    /// Skip spaces and tabs at the start of each line.
    #[serde(default)]
    pub ignore_leading_whitespace: bool,
    /// Pre-roll before typing starts or continues.
    #[serde(default = "default_start_delay")]
    pub start_delay_secs: f64,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            min_wpm: default_min_wpm(),
            max_wpm: default_max_wpm(),
            language: default_language(),
            ignore_leading_whitespace: false,
            start_delay_secs: default_start_delay(),
        }
    }
}

/// Bounds `{{PAUSE:n}}` durations are clamped to.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PauseConfig {
    #[serde(default = "default_min_pause")]
    pub min_secs: f64,
    #[serde(default = "default_max_pause")]
    pub max_secs: f64,
}

impl Default for PauseConfig {
    fn default() -> Self {
        Self {
            min_secs: default_min_pause(),
            max_secs: default_max_pause(),
        }
    }
}

fn default_min_wpm() -> f64 {
    DEFAULT_MIN_WPM
}

fn default_max_wpm() -> f64 {
    DEFAULT_MAX_WPM
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.into()
}

fn default_start_delay() -> f64 {
    DEFAULT_START_DELAY.as_secs_f64()
}

fn default_min_pause() -> f64 {
    MIN_PAUSE_SECS
}

fn default_max_pause() -> f64 {
    MAX_PAUSE_SECS
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        ensure!(
            config.typing.start_delay_secs.is_finite() && config.typing.start_delay_secs >= 0.0,
            "start_delay_secs must be a non-negative number, got {}",
            config.typing.start_delay_secs
        );
        Ok(config)
    }

    /// Load `path` if given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            start_delay: Duration::from_secs_f64(self.typing.start_delay_secs),
            min_pause_secs: self.pauses.min_secs,
            max_pause_secs: self.pauses.max_secs,
            language: self.typing.language.clone(),
            ignore_leading_whitespace: self.typing.ignore_leading_whitespace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.typing.min_wpm, 100.0);
        assert_eq!(config.typing.max_wpm, 250.0);
        assert_eq!(config.typing.language, "java");
        assert_eq!(config.pauses.max_secs, 60.0);
        assert_eq!(config.engine_config(), EngineConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let config = Config::parse(
            r#"
            [typing]
            max_wpm = 400
            language = "css"

            [pauses]
            max_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.typing.min_wpm, 100.0);
        assert_eq!(config.typing.max_wpm, 400.0);
        assert_eq!(config.pauses.min_secs, 0.0);

        let engine = config.engine_config();
        assert_eq!(engine.language, "css");
        assert_eq!(engine.max_pause_secs, 5.0);
        assert_eq!(engine.start_delay, Duration::from_secs(3));
    }

    #[test]
    fn test_rejects_unknown_keys_and_bad_delay() {
        assert!(Config::parse("[typing]\nspeed = 3\n").is_err());
        assert!(Config::parse("[typing]\nstart_delay_secs = -1.0\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[typing]\nignore_leading_whitespace = true\nstart_delay_secs = 0.5").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert!(config.typing.ignore_leading_whitespace);
        assert_eq!(config.engine_config().start_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = Config::load(Path::new("/nonexistent/keycadence.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/keycadence.toml"));
        assert!(Config::load_or_default(None).is_ok());
    }
}
