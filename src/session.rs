//! Game sessions derived from launch-stage process discovery.
//!
//! A preclient launch opens a new session; the client and in-game
//! executables advance the session they descend from. Each session only
//! moves forward through [`Phase`]; stale or duplicate transitions are
//! ignored.
//!
//! A session is retired once it reaches [`Phase::Game`] or its preclient
//! has exited. Exited preclients are swept whenever a new one launches.

use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use chrono::{DateTime, Utc};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::models::phase::{Phase, PhaseChangedArgs};
use crate::models::process::ProcessDescriptor;
use crate::services::{GameSession, PhaseChangedHandler, SessionCreatedHandler, SessionService};
use crate::watcher::ProcessWatcherService;
use crate::Result;

/// A game session rooted at one preclient process.
pub struct ProcessSession {
    id: String,
    root_process_id: u32,
    created_at: DateTime<Utc>,
    phase: Mutex<Phase>,
    members: Mutex<Vec<u32>>,
    handlers: RwLock<Vec<PhaseChangedHandler>>,
}

impl std::fmt::Debug for ProcessSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSession")
            .field("id", &self.id)
            .field("root_process_id", &self.root_process_id)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl ProcessSession {
    /// Create a session in [`Phase::Uninitialized`] rooted at `root_process_id`.
    #[must_use]
    pub fn new(root_process_id: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            root_process_id,
            created_at: Utc::now(),
            phase: Mutex::new(Phase::Uninitialized),
            members: Mutex::new(vec![root_process_id]),
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Pid of the preclient that opened this session.
    #[must_use]
    pub fn root_process_id(&self) -> u32 {
        self.root_process_id
    }

    /// When the session was opened.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether `process_id` was launched as part of this session.
    #[must_use]
    pub fn owns_process(&self, process_id: u32) -> bool {
        self.members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&process_id)
    }

    /// Move to `next` and raise `PhaseChanged` to every handler in
    /// registration order. Returns `false` (and raises nothing) if `next`
    /// is not ahead of the current phase.
    pub fn transition_to(&self, next: Phase) -> bool {
        let args = {
            let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
            let current = *phase;
            if !current.can_transition_to(next) {
                debug!(session_id = self.id, %current, requested = %next, "ignoring phase transition");
                return false;
            }
            let args = PhaseChangedArgs::new(current, next);
            *phase = next;
            args
        };

        info!(session_id = self.id, old = %args.old_phase, new = %args.new_phase, "session phase changed");

        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for handler in handlers {
            handler(args);
        }
        true
    }

    fn adopt(&self, process_id: u32) {
        let mut members = self.members.lock().unwrap_or_else(PoisonError::into_inner);
        if !members.contains(&process_id) {
            members.push(process_id);
        }
    }
}

impl GameSession for ProcessSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn phase(&self) -> Phase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribe_phase_changed(&self, handler: PhaseChangedHandler) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }
}

/// Session service fed by the process watcher.
pub struct ProcessSessionService {
    watcher: Arc<ProcessWatcherService>,
    game: GameConfig,
    sessions: Mutex<Vec<Arc<ProcessSession>>>,
    created_handlers: RwLock<Vec<SessionCreatedHandler>>,
}

impl ProcessSessionService {
    /// Create a service for the executables named in `game`.
    #[must_use]
    pub fn new(watcher: Arc<ProcessWatcherService>, game: GameConfig) -> Self {
        Self {
            watcher,
            game,
            sessions: Mutex::new(Vec::new()),
            created_handlers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribe to launches of the configured executables.
    ///
    /// # Errors
    ///
    /// Propagates the watcher's subscription error.
    pub fn initialize(self: &Arc<Self>) -> Result<()> {
        let service: Weak<Self> = Arc::downgrade(self);
        self.watcher.subscribe(
            self.game.executables(),
            false,
            Arc::new(move |descriptor: &ProcessDescriptor| -> Result<()> {
                if let Some(service) = service.upgrade() {
                    service.handle_process_launched(descriptor);
                }
                Ok(())
            }),
        )?;

        info!(preclient = self.game.preclient_executable, "session service initialized");
        Ok(())
    }

    /// Sessions still in play, oldest first.
    #[must_use]
    pub fn sessions(&self) -> Vec<Arc<ProcessSession>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Route a launched process to session creation or advancement.
    pub fn handle_process_launched(&self, descriptor: &ProcessDescriptor) {
        let name = descriptor.name();
        if name == self.game.preclient_executable {
            self.open_session(descriptor);
        } else if self.game.client_executable.as_deref() == Some(name) {
            self.advance(descriptor, Phase::Client);
        } else if self.game.game_executable.as_deref() == Some(name) {
            self.advance(descriptor, Phase::Game);
        }
    }

    /// Open a session for a preclient launch and move it to `Preclient`.
    pub fn open_session(&self, descriptor: &ProcessDescriptor) -> Arc<ProcessSession> {
        let _retired = self.retire_exited();

        let session = Arc::new(ProcessSession::new(descriptor.process_id()));
        let _span = info_span!("open_session", session_id = session.id()).entered();

        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&session));
        info!(pid = descriptor.process_id(), "game session created");

        let handlers = self
            .created_handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for handler in handlers {
            handler(Arc::clone(&session) as Arc<dyn GameSession>);
        }

        session.transition_to(Phase::Preclient);
        session
    }

    fn advance(&self, descriptor: &ProcessDescriptor, next: Phase) {
        let Some(session) = self.find_owner(descriptor, next) else {
            debug!(
                name = descriptor.name(),
                pid = descriptor.process_id(),
                "launch does not belong to any session"
            );
            return;
        };

        session.adopt(descriptor.process_id());
        session.transition_to(next);
        if next == Phase::Game {
            self.retire(&session);
        }
    }

    /// Retire sessions whose preclient is no longer running and return how
    /// many were retired. A session whose lookup fails is kept.
    #[must_use]
    pub fn retire_exited(&self) -> usize {
        let exited: Vec<u32> = self
            .sessions()
            .iter()
            .map(|session| session.root_process_id())
            .filter(|&root| match self.watcher.is_running(root) {
                Ok(running) => !running,
                Err(err) => {
                    warn!(pid = root, %err, "could not check preclient; keeping session");
                    false
                }
            })
            .collect();
        if exited.is_empty() {
            return 0;
        }

        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|session| !exited.contains(&session.root_process_id()));
        let retired = before - sessions.len();
        info!(retired, "sessions of exited preclients retired");
        retired
    }

    fn retire(&self, session: &Arc<ProcessSession>) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|open| !Arc::ptr_eq(open, session));
        info!(session_id = session.id(), "game session retired");
    }

    /// The session that launched `descriptor`'s parent, or else the newest
    /// session sitting in the phase right before `next`.
    fn find_owner(&self, descriptor: &ProcessDescriptor, next: Phase) -> Option<Arc<ProcessSession>> {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions
            .iter()
            .rev()
            .find(|session| session.owns_process(descriptor.parent_process_id()))
            .or_else(|| {
                let previous = previous_phase(next)?;
                sessions
                    .iter()
                    .rev()
                    .find(|session| session.phase() == previous)
            })
            .cloned()
    }
}

impl SessionService for ProcessSessionService {
    fn subscribe_session_created(&self, handler: SessionCreatedHandler) {
        self.created_handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }
}

fn previous_phase(phase: Phase) -> Option<Phase> {
    match phase {
        Phase::Uninitialized => None,
        Phase::Preclient => Some(Phase::Uninitialized),
        Phase::Client => Some(Phase::Preclient),
        Phase::Game => Some(Phase::Client),
    }
}
