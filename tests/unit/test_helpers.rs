//! Recording fakes shared by the unit tests.
//!
//! Every orchestrator collaborator writes to one [`CallLog`] so tests can
//! assert the exact cross-collaborator call sequence.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use modweaver::chain::{ChainTask, CompilationTask, ResolutionTask};
use modweaver::models::injection::InjectionConfiguration;
use modweaver::models::modification::{Modification, ModificationTargetType};
use modweaver::models::phase::{Phase, PhaseChangedArgs};
use modweaver::models::process::{ProcessFound, RunningProcess};
use modweaver::services::{
    CompilerService, ConfigurationFactory, GameSession, InjectionService, ModificationRepository,
    PhaseChangedHandler, ResolutionService, ResourceStreaming, SessionCreatedHandler,
    SessionService,
};
use modweaver::watcher::{DiscoveryHandler, ProcessSource};
use modweaver::{AppError, Result};

/// Ordered record of collaborator calls.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

// ── Process source ──────────────────────────────────────

#[derive(Default)]
pub struct FakeProcessSource {
    running: Mutex<Vec<(RunningProcess, Option<u32>)>>,
    handler: Mutex<Option<DiscoveryHandler>>,
    starts: AtomicUsize,
    fail_start: Mutex<bool>,
    fail_find: Mutex<bool>,
    fail_lookup: Mutex<bool>,
}

impl FakeProcessSource {
    /// Source whose process table holds `(name, pid, parent)` entries.
    /// A `None` parent means the process exits before its parent is read.
    pub fn with_running(entries: &[(&str, u32, Option<u32>)]) -> Self {
        let source = Self::default();
        *source.running.lock().unwrap() = entries
            .iter()
            .map(|(name, pid, parent)| {
                (
                    RunningProcess {
                        name: (*name).to_owned(),
                        process_id: *pid,
                    },
                    *parent,
                )
            })
            .collect();
        source
    }

    pub fn fail_start(&self, fail: bool) {
        *self.fail_start.lock().unwrap() = fail;
    }

    pub fn fail_find(&self, fail: bool) {
        *self.fail_find.lock().unwrap() = fail;
    }

    pub fn fail_lookup(&self, fail: bool) {
        *self.fail_lookup.lock().unwrap() = fail;
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Push a discovery event through the installed handler.
    pub fn emit(&self, name: &str, process_id: u32, parent_process_id: u32) -> Result<()> {
        let handler = self
            .handler
            .lock()
            .unwrap()
            .clone()
            .expect("source not started");
        handler(&ProcessFound {
            name: name.to_owned(),
            process_id,
            parent_process_id,
        })
    }
}

impl ProcessSource for FakeProcessSource {
    fn start(&self, handler: DiscoveryHandler) -> Result<()> {
        if *self.fail_start.lock().unwrap() {
            return Err(AppError::Discovery("permission denied".into()));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.handler.lock().unwrap() = Some(handler);
        Ok(())
    }

    fn find_processes(
        &self,
        predicate: &dyn Fn(&RunningProcess) -> bool,
    ) -> Result<Vec<RunningProcess>> {
        if *self.fail_find.lock().unwrap() {
            return Err(AppError::Discovery("process table unavailable".into()));
        }
        Ok(self
            .running
            .lock()
            .unwrap()
            .iter()
            .map(|(process, _)| process.clone())
            .filter(|process| predicate(process))
            .collect())
    }

    fn parent_process_id(&self, process_id: u32) -> Result<Option<u32>> {
        if *self.fail_lookup.lock().unwrap() {
            return Err(AppError::Discovery("process table unavailable".into()));
        }
        Ok(self
            .running
            .lock()
            .unwrap()
            .iter()
            .find(|(process, _)| process.process_id == process_id)
            .and_then(|(_, parent)| *parent))
    }
}

// ── Chains ──────────────────────────────────────────────

/// Chain handle that records its join and yields a fixed result.
pub struct RecordedChain {
    log: CallLog,
    label: String,
    result: Result<()>,
}

impl ChainTask for RecordedChain {
    fn wait_for_chain_completion(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        let RecordedChain { log, label, result } = *self;
        log.push(format!("Join({label})"));
        async move { result }.boxed()
    }
}

/// Starts recorded chains; handles are labelled `<prefix><n>` in start order.
pub struct RecordingChainService {
    log: CallLog,
    prefix: &'static str,
    started: AtomicUsize,
    failing: HashSet<String>,
    targets: Mutex<Vec<ModificationTargetType>>,
}

impl RecordingChainService {
    pub fn new(log: &CallLog, prefix: &'static str) -> Self {
        Self {
            log: log.clone(),
            prefix,
            started: AtomicUsize::new(0),
            failing: HashSet::new(),
            targets: Mutex::new(Vec::new()),
        }
    }

    /// Chains started for `modification` fail on join.
    pub fn failing_for(mut self, modification: &str) -> Self {
        self.failing.insert(modification.to_owned());
        self
    }

    pub fn targets(&self) -> Vec<ModificationTargetType> {
        self.targets.lock().unwrap().clone()
    }

    fn start(
        &self,
        call: &str,
        modification: &Modification,
        target: ModificationTargetType,
        failure: fn(String) -> AppError,
    ) -> Box<RecordedChain> {
        self.log.push(format!("{call}({})", modification.name()));
        self.targets.lock().unwrap().push(target);
        let index = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        let result = if self.failing.contains(modification.name()) {
            Err(failure(format!("{} failed", modification.name())))
        } else {
            Ok(())
        };
        Box::new(RecordedChain {
            log: self.log.clone(),
            label: format!("{}{index}", self.prefix),
            result,
        })
    }
}

impl ResolutionService for RecordingChainService {
    fn start_modification_resolution(
        &self,
        modification: &Modification,
        target: ModificationTargetType,
    ) -> ResolutionTask {
        self.start("StartResolution", modification, target, AppError::Resolution)
    }
}

impl CompilerService for RecordingChainService {
    fn compile_objects(
        &self,
        modification: &Modification,
        target: ModificationTargetType,
    ) -> CompilationTask {
        self.start("CompileObjects", modification, target, AppError::Compilation)
    }
}

// ── Repository / streaming ──────────────────────────────

pub struct RecordingRepository {
    log: CallLog,
    modifications: Vec<Modification>,
    fail: bool,
}

impl RecordingRepository {
    pub fn new(log: &CallLog, names: &[&str]) -> Self {
        Self {
            log: log.clone(),
            modifications: names
                .iter()
                .map(|name| Modification::new(*name, format!("/mods/{name}")))
                .collect(),
            fail: false,
        }
    }

    pub fn failing(log: &CallLog) -> Self {
        Self {
            fail: true,
            ..Self::new(log, &[])
        }
    }
}

impl ModificationRepository for RecordingRepository {
    fn enumerate_modifications(&self) -> Result<Vec<Modification>> {
        self.log.push("Enumerate");
        if self.fail {
            return Err(AppError::Repository("modifications directory missing".into()));
        }
        Ok(self.modifications.clone())
    }
}

pub struct RecordingStreaming {
    log: CallLog,
    fail_suspend: bool,
}

impl RecordingStreaming {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail_suspend: false,
        }
    }

    pub fn failing_suspend(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail_suspend: true,
        }
    }
}

impl ResourceStreaming for RecordingStreaming {
    fn suspend(&self) -> Result<()> {
        self.log.push("Suspend");
        if self.fail_suspend {
            return Err(AppError::Streaming("streamer busy".into()));
        }
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        self.log.push("Resume");
        Ok(())
    }
}

// ── Injection ───────────────────────────────────────────

#[derive(Default)]
pub struct RecordingInjection {
    calls: Mutex<Vec<(u32, InjectionConfiguration)>>,
    fail: bool,
}

impl RecordingInjection {
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<(u32, InjectionConfiguration)> {
        self.calls.lock().unwrap().clone()
    }
}

impl InjectionService for RecordingInjection {
    fn inject_to_process(
        &self,
        process_id: u32,
        configuration: &InjectionConfiguration,
    ) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((process_id, configuration.clone()));
        if self.fail {
            return Err(AppError::Injection(format!("access denied to {process_id}")));
        }
        Ok(())
    }
}

/// Injection service that takes `delay` per call, like a target that
/// keeps refusing while the service retries.
pub struct SlowInjection {
    pub delay: std::time::Duration,
    pub calls: AtomicUsize,
}

impl InjectionService for SlowInjection {
    fn inject_to_process(
        &self,
        _process_id: u32,
        _configuration: &InjectionConfiguration,
    ) -> Result<()> {
        std::thread::sleep(self.delay);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FixedConfigurationFactory(pub InjectionConfiguration);

impl ConfigurationFactory for FixedConfigurationFactory {
    fn preclient_configuration(&self) -> InjectionConfiguration {
        self.0.clone()
    }
}

// ── Sessions ────────────────────────────────────────────

#[derive(Default)]
pub struct FakeSessionService {
    handlers: Mutex<Vec<SessionCreatedHandler>>,
}

impl FakeSessionService {
    pub fn handler_count(&self) -> usize {
        self.handlers.lock().unwrap().len()
    }

    pub fn create(&self, session: Arc<dyn GameSession>) {
        let handlers = self.handlers.lock().unwrap().clone();
        for handler in handlers {
            handler(Arc::clone(&session));
        }
    }
}

impl SessionService for FakeSessionService {
    fn subscribe_session_created(&self, handler: SessionCreatedHandler) {
        self.handlers.lock().unwrap().push(handler);
    }
}

pub struct FakeSession {
    id: String,
    handlers: Mutex<Vec<PhaseChangedHandler>>,
}

impl FakeSession {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_owned(),
            handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn raise(&self, old_phase: Phase, new_phase: Phase) {
        let handlers = self.handlers.lock().unwrap().clone();
        for handler in handlers {
            handler(PhaseChangedArgs::new(old_phase, new_phase));
        }
    }
}

impl GameSession for FakeSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn phase(&self) -> Phase {
        Phase::Uninitialized
    }

    fn subscribe_phase_changed(&self, handler: PhaseChangedHandler) {
        self.handlers.lock().unwrap().push(handler);
    }
}
