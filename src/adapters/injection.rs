//! Preclient injection through an external injector program.
//!
//! [`CommandInjector`] performs a single attempt by running the configured
//! helper. [`RetryingInjectionService`] repeats attempts while the target
//! is still alive, since a freshly launched preclient often refuses the
//! first few attempts while it is still loading.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::InjectionConfig;
use crate::models::injection::InjectionConfiguration;
use crate::services::{ConfigurationFactory, InjectionService};
use crate::{AppError, Result};

/// A single injection attempt against a process.
pub trait Injector: Send + Sync {
    /// Try once to inject `configuration` into `process_id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Injection` if the attempt failed.
    fn inject(&self, process_id: u32, configuration: &InjectionConfiguration) -> Result<()>;

    /// Whether `process_id` still refers to a running process.
    fn is_process_alive(&self, process_id: u32) -> bool;
}

/// Runs the configured injector program once per attempt.
///
/// The program is invoked as
/// `<program> <args..> --pid <pid> --module <path> [key=value..]`.
#[derive(Debug, Clone)]
pub struct CommandInjector {
    program: String,
    args: Vec<String>,
}

impl CommandInjector {
    /// Create an injector for `program` with fixed leading `args`.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build the injector described by `[injection]`.
    #[must_use]
    pub fn from_config(config: &InjectionConfig) -> Self {
        Self::new(config.injector_program.clone(), config.injector_args.clone())
    }

    fn command(&self, process_id: u32, configuration: &InjectionConfiguration) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--pid")
            .arg(process_id.to_string())
            .arg("--module")
            .arg(&configuration.module_path)
            .args(
                configuration
                    .properties
                    .iter()
                    .map(|(key, value)| format!("{key}={value}")),
            )
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Injector for CommandInjector {
    fn inject(&self, process_id: u32, configuration: &InjectionConfiguration) -> Result<()> {
        if !self.is_process_alive(process_id) {
            return Err(AppError::Injection(format!("process {process_id} is not running")));
        }

        let output = self
            .command(process_id, configuration)
            .output()
            .map_err(|err| {
                AppError::Injection(format!("failed to run injector {}: {err}", self.program))
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(AppError::Injection(format!(
                "injector exited with {} for pid {process_id}: {}",
                output.status,
                stderr.trim()
            )))
        }
    }

    #[cfg(unix)]
    fn is_process_alive(&self, process_id: u32) -> bool {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(process_id) else {
            return false;
        };
        // Signal 0 only probes; EPERM means it exists under another user.
        match kill(Pid::from_raw(raw), None) {
            Ok(()) | Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    #[cfg(not(unix))]
    fn is_process_alive(&self, _process_id: u32) -> bool {
        true
    }
}

/// Injection service that retries a failed attempt while the target lives.
pub struct RetryingInjectionService {
    injector: Box<dyn Injector>,
    attempts: u32,
    retry_delay: Duration,
}

impl RetryingInjectionService {
    /// Wrap `injector`, trying up to `attempts` times with `retry_delay`
    /// between attempts. `attempts` is clamped to at least one.
    #[must_use]
    pub fn new(injector: Box<dyn Injector>, attempts: u32, retry_delay: Duration) -> Self {
        Self {
            injector,
            attempts: attempts.max(1),
            retry_delay,
        }
    }
}

impl InjectionService for RetryingInjectionService {
    fn inject_to_process(
        &self,
        process_id: u32,
        configuration: &InjectionConfiguration,
    ) -> Result<()> {
        let mut last_error = None;
        for attempt in 1..=self.attempts {
            match self.injector.inject(process_id, configuration) {
                Ok(()) => {
                    info!(pid = process_id, attempt, "injection succeeded");
                    return Ok(());
                }
                Err(err) => {
                    debug!(pid = process_id, attempt, %err, "injection attempt failed");
                    last_error = Some(err);
                }
            }

            if !self.injector.is_process_alive(process_id) {
                warn!(pid = process_id, attempt, "target exited; giving up on injection");
                break;
            }
            if attempt < self.attempts {
                std::thread::sleep(self.retry_delay);
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::Injection(format!("no injection attempt made for pid {process_id}"))
        }))
    }
}

/// Configuration factory backed by `[injection]`.
#[derive(Debug, Clone)]
pub struct ConfiguredPreclientFactory {
    module_path: PathBuf,
    properties: Vec<(String, String)>,
}

impl ConfiguredPreclientFactory {
    /// Capture the module path and properties from `config`.
    #[must_use]
    pub fn new(config: &InjectionConfig) -> Self {
        Self {
            module_path: config.module_path.clone(),
            properties: config
                .properties
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }
}

impl ConfigurationFactory for ConfiguredPreclientFactory {
    fn preclient_configuration(&self) -> InjectionConfiguration {
        self.properties.iter().fold(
            InjectionConfiguration::new(self.module_path.clone()),
            |configuration, (key, value)| configuration.with_property(key.clone(), value.clone()),
        )
    }
}
