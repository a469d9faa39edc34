//! Resource streaming gate.
//!
//! Tracks whether asset streaming is suspended. When a pause file is
//! configured it exists exactly while streaming is suspended, so the game
//! side can poll for it.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use crate::config::StreamingConfig;
use crate::services::ResourceStreaming;
use crate::{AppError, Result};

/// Suspend/resume flag, optionally mirrored to a file.
#[derive(Debug, Default)]
pub struct StreamingGate {
    suspended: AtomicBool,
    pause_file: Option<PathBuf>,
}

impl StreamingGate {
    /// Gate mirroring its state into `pause_file`, if any.
    #[must_use]
    pub fn new(pause_file: Option<PathBuf>) -> Self {
        Self {
            suspended: AtomicBool::new(false),
            pause_file,
        }
    }

    /// Gate described by `[streaming]`.
    #[must_use]
    pub fn from_config(config: &StreamingConfig) -> Self {
        Self::new(config.pause_file.clone())
    }

    /// Whether streaming is currently suspended.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }
}

impl ResourceStreaming for StreamingGate {
    fn suspend(&self) -> Result<()> {
        if let Some(path) = &self.pause_file {
            fs::write(path, b"suspended\n").map_err(|err| {
                AppError::Streaming(format!("cannot create pause file {}: {err}", path.display()))
            })?;
        }
        let was_suspended = self.suspended.swap(true, Ordering::SeqCst);
        if was_suspended {
            debug!("resource streaming already suspended");
        } else {
            info!("resource streaming suspended");
        }
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        if let Some(path) = &self.pause_file {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(AppError::Streaming(format!(
                        "cannot remove pause file {}: {err}",
                        path.display()
                    )));
                }
            }
        }
        if self.suspended.swap(false, Ordering::SeqCst) {
            info!("resource streaming resumed");
        } else {
            debug!("resource streaming was not suspended");
        }
        Ok(())
    }
}
