//! Polling process source backed by `sysinfo`.
//!
//! A dedicated thread rescans the OS process table every poll interval
//! and reports processes that were not present in the previous scan.
//! Processes already running when the source starts form the baseline
//! and are never reported; use a retroactive subscription for those.
//! A process is identified by `(pid, start time)`, so a reused pid is
//! reported as a new process. Threads are never reported.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::sync::{Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::process::{ProcessFound, RunningProcess};
use crate::{AppError, Result};

use super::source::{DiscoveryHandler, ProcessSource};

/// Process source that diffs successive process table scans.
pub struct SysinfoProcessSource {
    poll_interval: Duration,
    system: Mutex<System>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SysinfoProcessSource {
    /// Create a source scanning every `poll_interval`.
    #[must_use]
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            system: Mutex::new(System::new()),
            cancel: CancellationToken::new(),
            worker: Mutex::new(None),
        }
    }
}

impl Drop for SysinfoProcessSource {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl ProcessSource for SysinfoProcessSource {
    /// Must be called from within a tokio runtime; the poll thread waits
    /// on the runtime's timer between scans.
    fn start(&self, handler: DiscoveryHandler) -> Result<()> {
        let runtime = Handle::try_current().map_err(|err| {
            AppError::Discovery(format!("process source needs a tokio runtime: {err}"))
        })?;
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            return Err(AppError::Discovery("process source already started".into()));
        }

        let cancel = self.cancel.clone();
        let interval = self.poll_interval;
        let handle = std::thread::Builder::new()
            .name("process-source".into())
            .spawn(move || poll_loop(&runtime, interval, &cancel, &handler))
            .map_err(|err| AppError::Discovery(format!("failed to start poll thread: {err}")))?;

        *worker = Some(handle);
        info!(?interval, "process source started");
        Ok(())
    }

    fn find_processes(
        &self,
        predicate: &dyn Fn(&RunningProcess) -> bool,
    ) -> Result<Vec<RunningProcess>> {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, refresh_kind());

        let mut matches: Vec<RunningProcess> = system
            .processes()
            .iter()
            .filter(|(_, process)| !is_thread(process))
            .map(|(pid, process)| RunningProcess {
                name: process_name(process.name()),
                process_id: pid.as_u32(),
            })
            .filter(|process| predicate(process))
            .collect();
        matches.sort_by_key(|process| process.process_id);
        Ok(matches)
    }

    fn parent_process_id(&self, process_id: u32) -> Result<Option<u32>> {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        let pid = Pid::from_u32(process_id);
        system.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, refresh_kind());

        Ok(system
            .process(pid)
            .filter(|process| !is_thread(process))
            .map(|process| process.parent().map_or(0, Pid::as_u32)))
    }

    fn stop(&self) {
        self.cancel.cancel();
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("process source thread panicked");
            }
            info!("process source stopped");
        }
    }
}

/// Process table columns needed for discovery; thread entries excluded.
fn refresh_kind() -> ProcessRefreshKind {
    ProcessRefreshKind::nothing().without_tasks()
}

fn is_thread(process: &Process) -> bool {
    process.thread_kind().is_some()
}

fn process_name(name: &OsStr) -> String {
    name.to_string_lossy().into_owned()
}

/// Scan the process table and return every process keyed by identity.
fn scan(system: &mut System) -> Vec<((u32, u64), ProcessFound)> {
    system.refresh_processes_specifics(ProcessesToUpdate::All, true, refresh_kind());
    system
        .processes()
        .iter()
        .filter(|(_, process)| !is_thread(process))
        .map(|(pid, process)| {
            let found = ProcessFound {
                name: process_name(process.name()),
                process_id: pid.as_u32(),
                parent_process_id: process.parent().map_or(0, Pid::as_u32),
            };
            ((pid.as_u32(), process.start_time()), found)
        })
        .collect()
}

/// Wait out one poll interval. Returns `true` once `cancel` fires.
fn wait_for_next_scan(runtime: &Handle, interval: Duration, cancel: &CancellationToken) -> bool {
    runtime.block_on(async {
        tokio::select! {
            biased;
            () = cancel.cancelled() => true,
            () = tokio::time::sleep(interval) => false,
        }
    })
}

fn poll_loop(
    runtime: &Handle,
    interval: Duration,
    cancel: &CancellationToken,
    handler: &DiscoveryHandler,
) {
    let mut system = System::new();
    let mut known: HashSet<(u32, u64)> = scan(&mut system).into_iter().map(|(key, _)| key).collect();
    debug!(baseline = known.len(), "process baseline captured");

    loop {
        if wait_for_next_scan(runtime, interval, cancel) {
            debug!("process source poll loop exiting");
            break;
        }

        let processes = scan(&mut system);
        let mut current = HashSet::with_capacity(processes.len());
        let mut started = Vec::new();
        for (key, found) in processes {
            if !known.contains(&key) {
                started.push((key.1, found));
            }
            current.insert(key);
        }
        known = current;

        // Parents start before their children; deliver in start order.
        started.sort_by_key(|(start_time, found)| (*start_time, found.process_id));
        for (_, found) in started {
            debug!(name = found.name, pid = found.process_id, "process started");
            if let Err(err) = handler(&found) {
                warn!(%err, name = found.name, pid = found.process_id, "discovery dispatch failed");
            }
        }
    }
}
