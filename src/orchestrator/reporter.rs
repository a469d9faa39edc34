//! Lifecycle event consumer: logs orchestrator outcomes.
//!
//! Reads [`LifecycleEvent`]s from the orchestrator's outcome channel and
//! reports each one. Runs until cancelled or until every sender is gone.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::lifecycle::LifecycleEvent;

/// Spawn a background task that reports lifecycle events.
///
/// Returns a `JoinHandle` so the caller can await clean shutdown.
#[must_use]
pub fn spawn_event_reporter(
    mut rx: mpsc::UnboundedReceiver<LifecycleEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("stopping lifecycle reports");
                    break;
                }
                event = rx.recv() => match event {
                    Some(event) => report(&event),
                    None => {
                        info!("orchestrator gone; no more lifecycle reports");
                        break;
                    }
                },
            }
        }
    })
}

fn report(event: &LifecycleEvent) {
    match event {
        LifecycleEvent::PreclientInjected { process_id } => {
            info!(pid = process_id, "preclient ready");
        }
        LifecycleEvent::InjectionFailed { process_id, error } => {
            warn!(pid = process_id, %error, "preclient left without runtime module");
        }
        LifecycleEvent::PipelineCompleted {
            session_id,
            modifications,
        } => {
            info!(session_id, modifications, "modifications ready for client");
        }
        LifecycleEvent::PipelineFailed { session_id, error } => {
            error!(session_id, %error, "modifications not applied this session");
        }
    }
}
