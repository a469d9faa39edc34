//! Global configuration parsing and validation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Executable names that identify the stages of a game launch.
///
/// Names are matched case-sensitively against the OS process name.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GameConfig {
    /// Early-stage launcher executable; the injection target.
    pub preclient_executable: String,
    /// Full game client executable, launched by the preclient.
    #[serde(default)]
    pub client_executable: Option<String>,
    /// In-game executable, launched once a match starts.
    #[serde(default)]
    pub game_executable: Option<String>,
}

impl GameConfig {
    /// Every configured launch-stage executable, preclient first.
    #[must_use]
    pub fn executables(&self) -> Vec<String> {
        let mut names = vec![self.preclient_executable.clone()];
        names.extend(self.client_executable.iter().cloned());
        names.extend(self.game_executable.iter().cloned());
        names
    }
}

/// Process source polling settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WatcherConfig {
    /// Interval between process table scans.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl WatcherConfig {
    /// Poll interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Runtime module injection settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct InjectionConfig {
    /// Runtime module injected into the preclient.
    pub module_path: PathBuf,
    /// Helper program that performs the actual injection.
    pub injector_program: String,
    /// Extra arguments passed to the injector before the generated ones.
    #[serde(default)]
    pub injector_args: Vec<String>,
    /// Maximum injection attempts per process.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Delay between injection attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Key/value properties forwarded to the injected module.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl InjectionConfig {
    /// Delay between injection attempts as a [`Duration`].
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_attempts() -> u32 {
    100
}

fn default_retry_delay_ms() -> u64 {
    200
}

/// Location of the loaded modifications.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ModificationsConfig {
    /// Directory whose sub-directories are individual modifications.
    pub directory: PathBuf,
}

/// One external command in a resolution or compilation chain.
///
/// `{modification}` and `{target}` in `args` are replaced with the
/// modification root path and the target type.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StepConfig {
    /// Program to run.
    pub program: String,
    /// Argument template.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Ordered chain of commands for one pipeline stage.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StageConfig {
    /// Steps run in order; each is a continuation of the previous one.
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// Resource streaming gate settings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StreamingConfig {
    /// File created while streaming is suspended and removed on resume.
    #[serde(default)]
    pub pause_file: Option<PathBuf>,
}

/// Global configuration parsed from `modweaver.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Launch-stage executable names.
    pub game: GameConfig,
    /// Process source settings.
    #[serde(default)]
    pub watcher: WatcherConfig,
    /// Injection settings.
    pub injection: InjectionConfig,
    /// Modification location.
    pub modifications: ModificationsConfig,
    /// Resolution chain commands.
    #[serde(default)]
    pub resolution: StageConfig,
    /// Compilation chain commands.
    #[serde(default)]
    pub compilation: StageConfig,
    /// Resource streaming gate.
    #[serde(default)]
    pub streaming: StreamingConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.game.preclient_executable.trim().is_empty() {
            return Err(AppError::Config(
                "game.preclient_executable must not be empty".into(),
            ));
        }

        if self.watcher.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "watcher.poll_interval_ms must be greater than zero".into(),
            ));
        }

        if self.injection.attempts == 0 {
            return Err(AppError::Config(
                "injection.attempts must be greater than zero".into(),
            ));
        }

        if self.injection.injector_program.trim().is_empty() {
            return Err(AppError::Config(
                "injection.injector_program must not be empty".into(),
            ));
        }

        if self.injection.module_path.as_os_str().is_empty() {
            return Err(AppError::Config(
                "injection.module_path must not be empty".into(),
            ));
        }

        for (stage, config) in [
            ("resolution", &self.resolution),
            ("compilation", &self.compilation),
        ] {
            if config.steps.iter().any(|s| s.program.trim().is_empty()) {
                return Err(AppError::Config(format!(
                    "{stage}.steps entries must name a program"
                )));
            }
        }

        Ok(())
    }
}
