//! Lifecycle orchestrator wiring.
//!
//! The orchestrator subscribes to preclient launches (injection) and to
//! session creation. Injection attempts run on the runtime's blocking
//! pool so retries never hold up the watcher's delivery thread.
//!
//! Every session gets a worker task fed by an unbounded queue. The
//! session's phase handler only enqueues, so the pipeline joins never run
//! on the session's delivery context and transitions of one session are
//! handled one at a time. The worker exits once the session is dropped
//! and its queued transitions are handled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::models::phase::{Phase, PhaseChangedArgs};
use crate::models::process::ProcessDescriptor;
use crate::services::{
    CompilerService, ConfigurationFactory, GameSession, InjectionService, ModificationRepository,
    ResolutionService, ResourceStreaming, SessionService,
};
use crate::watcher::ProcessWatcherService;
use crate::{AppError, Result};

use super::pipeline::{self, PipelineStages};

/// Outcomes reported by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The preclient module was injected.
    PreclientInjected {
        /// Target process.
        process_id: u32,
    },
    /// Injection into a preclient failed.
    InjectionFailed {
        /// Target process.
        process_id: u32,
        /// Failure returned by the injection service.
        error: AppError,
    },
    /// Every modification was resolved and compiled for a session.
    PipelineCompleted {
        /// Session whose transition ran the pipeline.
        session_id: String,
        /// Modifications in the snapshot.
        modifications: usize,
    },
    /// The pipeline aborted.
    PipelineFailed {
        /// Session whose transition ran the pipeline.
        session_id: String,
        /// First failure observed.
        error: AppError,
    },
}

/// Collaborators injected into the orchestrator.
#[derive(Clone)]
pub struct OrchestratorDeps {
    /// Executable name of the preclient (injection target).
    pub preclient_executable: String,
    /// Process discovery.
    pub watcher: Arc<ProcessWatcherService>,
    /// Session creation events.
    pub sessions: Arc<dyn SessionService>,
    /// Module injection.
    pub injection: Arc<dyn InjectionService>,
    /// Preclient injection configuration lookup.
    pub configuration: Arc<dyn ConfigurationFactory>,
    /// Loaded modifications.
    pub repository: Arc<dyn ModificationRepository>,
    /// Resolution chains.
    pub resolution: Arc<dyn ResolutionService>,
    /// Compilation chains.
    pub compiler: Arc<dyn CompilerService>,
    /// Resource streaming control.
    pub streaming: Arc<dyn ResourceStreaming>,
}

/// Drives injection and the resolve/compile pipeline from discovery and
/// session events.
pub struct LifecycleOrchestrator {
    deps: OrchestratorDeps,
    events: Option<mpsc::UnboundedSender<LifecycleEvent>>,
    runtime: OnceLock<Handle>,
    initialized: AtomicBool,
}

impl LifecycleOrchestrator {
    /// Create an orchestrator. Outcomes are sent to `events` when given.
    #[must_use]
    pub fn new(
        deps: OrchestratorDeps,
        events: Option<mpsc::UnboundedSender<LifecycleEvent>>,
    ) -> Self {
        Self {
            deps,
            events,
            runtime: OnceLock::new(),
            initialized: AtomicBool::new(false),
        }
    }

    /// Subscribe to preclient launches and session creation.
    ///
    /// Must be called from within a tokio runtime; session workers are
    /// spawned onto it. Subsequent calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Session` outside a tokio runtime, or the
    /// watcher's subscription error.
    pub fn initialize(self: &Arc<Self>) -> Result<()> {
        let runtime = Handle::try_current()
            .map_err(|err| AppError::Session(format!("no tokio runtime for session workers: {err}")))?;

        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("lifecycle orchestrator already initialized");
            return Ok(());
        }
        let _ = self.runtime.set(runtime);

        let orchestrator: Weak<Self> = Arc::downgrade(self);
        self.deps.watcher.subscribe(
            [self.deps.preclient_executable.clone()],
            false,
            Arc::new(move |descriptor: &ProcessDescriptor| -> Result<()> {
                if let Some(orchestrator) = orchestrator.upgrade() {
                    orchestrator.spawn_preclient_injection(descriptor.process_id());
                }
                Ok(())
            }),
        )?;

        let orchestrator: Weak<Self> = Arc::downgrade(self);
        self.deps
            .sessions
            .subscribe_session_created(Arc::new(move |session: Arc<dyn GameSession>| {
                if let Some(orchestrator) = orchestrator.upgrade() {
                    let _worker = orchestrator.handle_session_created(&session);
                }
            }));

        info!(
            preclient = self.deps.preclient_executable,
            "lifecycle orchestrator initialized"
        );
        Ok(())
    }

    /// Run [`handle_preclient_process_launched`](Self::handle_preclient_process_launched)
    /// on the blocking pool. The outcome is reported as a [`LifecycleEvent`].
    pub fn spawn_preclient_injection(self: &Arc<Self>, process_id: u32) {
        let Some(runtime) = self.runtime.get() else {
            warn!(pid = process_id, "orchestrator not initialized; preclient ignored");
            return;
        };
        let orchestrator = Arc::clone(self);
        runtime.spawn_blocking(move || {
            // Outcome already logged and emitted.
            let _ = orchestrator.handle_preclient_process_launched(process_id);
        });
    }

    /// Inject the preclient module into `process_id`.
    ///
    /// Called once per launch; retries belong to the injection service,
    /// so this may block for as long as the service keeps retrying.
    ///
    /// # Errors
    ///
    /// Returns the injection service's failure unchanged.
    pub fn handle_preclient_process_launched(&self, process_id: u32) -> Result<()> {
        let _span = info_span!("preclient_injection", pid = process_id).entered();
        let configuration = self.deps.configuration.preclient_configuration();

        match self.deps.injection.inject_to_process(process_id, &configuration) {
            Ok(()) => {
                info!(module = %configuration.module_path.display(), "preclient module injected");
                self.emit(LifecycleEvent::PreclientInjected { process_id });
                Ok(())
            }
            Err(err) => {
                warn!(%err, "preclient injection failed");
                self.emit(LifecycleEvent::InjectionFailed {
                    process_id,
                    error: err.clone(),
                });
                Err(err)
            }
        }
    }

    /// Attach a phase handler and start the session's worker.
    ///
    /// Returns the worker's handle, or `None` before
    /// [`initialize`](Self::initialize).
    #[must_use]
    pub fn handle_session_created(
        self: &Arc<Self>,
        session: &Arc<dyn GameSession>,
    ) -> Option<JoinHandle<()>> {
        let session_id = session.id().to_owned();
        let Some(runtime) = self.runtime.get() else {
            warn!(session_id, "orchestrator not initialized; session ignored");
            return None;
        };

        // Each queued transition holds the session until it is handled.
        // The handler only keeps a weak reference, so the queue closes once
        // the session is dropped and drained.
        let (tx, mut rx) = mpsc::unbounded_channel::<(PhaseChangedArgs, Arc<dyn GameSession>)>();
        let queued_for = session_id.clone();
        let weak: Weak<dyn GameSession> = Arc::downgrade(session);
        session.subscribe_phase_changed(Arc::new(move |args: PhaseChangedArgs| {
            let Some(session) = weak.upgrade() else {
                return;
            };
            if tx.send((args, session)).is_err() {
                warn!(session_id = queued_for, "session worker gone; phase change dropped");
            }
        }));

        let orchestrator = Arc::clone(self);
        let span = info_span!("session_worker", session_id);
        let worker = runtime.spawn(
            async move {
                while let Some((args, session)) = rx.recv().await {
                    // Outcome already logged and emitted.
                    let _ = orchestrator.handle_phase_changed(session.as_ref(), args).await;
                }
                debug!("session retired; worker exiting");
            }
            .instrument(span),
        );
        debug!(session_id, "session worker started");
        Some(worker)
    }

    /// Dispatch one phase transition of `session`.
    ///
    /// # Errors
    ///
    /// Returns the pipeline failure for `Uninitialized -> Preclient`, or
    /// the streaming failure when resuming on the client phase.
    pub async fn handle_phase_changed(
        &self,
        session: &dyn GameSession,
        args: PhaseChangedArgs,
    ) -> Result<()> {
        match (args.old_phase, args.new_phase) {
            (Phase::Uninitialized, Phase::Preclient) => {
                let outcome = self
                    .handle_uninitialized_to_preclient_phase_transition(session, args)
                    .await;
                match &outcome {
                    Ok(modifications) => self.emit(LifecycleEvent::PipelineCompleted {
                        session_id: session.id().to_owned(),
                        modifications: *modifications,
                    }),
                    Err(err) => {
                        error!(session_id = session.id(), %err, "modification pipeline failed");
                        self.emit(LifecycleEvent::PipelineFailed {
                            session_id: session.id().to_owned(),
                            error: err.clone(),
                        });
                    }
                }
                outcome.map(|_| ())
            }
            (Phase::Preclient, Phase::Client | Phase::Game) => {
                let resumed = self.deps.streaming.resume();
                match &resumed {
                    Ok(()) => info!(session_id = session.id(), "resource streaming resumed"),
                    Err(err) => error!(session_id = session.id(), %err, "failed to resume resource streaming"),
                }
                resumed
            }
            (old, new) => {
                debug!(session_id = session.id(), %old, %new, "no action for phase transition");
                Ok(())
            }
        }
    }

    /// Resolve and compile every loaded modification for the client.
    ///
    /// Returns the number of modifications in the snapshot.
    ///
    /// # Errors
    ///
    /// Returns the first repository, streaming, resolution, or compilation
    /// failure. Streaming is resumed before a resolution or compilation
    /// failure is returned.
    pub async fn handle_uninitialized_to_preclient_phase_transition(
        &self,
        session: &dyn GameSession,
        args: PhaseChangedArgs,
    ) -> Result<usize> {
        let span = info_span!(
            "modification_pipeline",
            session_id = session.id(),
            old = %args.old_phase,
            new = %args.new_phase
        );

        let stages = PipelineStages {
            repository: self.deps.repository.as_ref(),
            resolution: self.deps.resolution.as_ref(),
            compiler: self.deps.compiler.as_ref(),
            streaming: self.deps.streaming.as_ref(),
        };
        pipeline::run(&stages).instrument(span).await
    }

    fn emit(&self, event: LifecycleEvent) {
        if let Some(events) = &self.events {
            if events.send(event).is_err() {
                debug!("lifecycle event receiver dropped");
            }
        }
    }
}
