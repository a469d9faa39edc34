//! Subscription-based process watcher.
//!
//! [`ProcessWatcherService`] maps new-process events from a
//! [`ProcessSource`] onto registered interest sets. Every subscription
//! whose name set contains the process name is notified, in registration
//! order, with the same [`ProcessDescriptor`]. A failing subscriber does
//! not stop delivery to the others; failures are aggregated and returned
//! to the event source.
//!
//! Retroactive subscriptions are registered first and then evaluated
//! against a snapshot of the running processes, so a process may be
//! delivered both retroactively and live. Delivery is at-least-once.

pub mod source;
pub mod sysinfo_source;

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, info_span, warn};

use crate::models::process::{ProcessDescriptor, ProcessFound, RunningProcess};
use crate::{AppError, Result};

pub use source::{DiscoveryHandler, ProcessSource};

/// Callback invoked with each matching process.
pub type ProcessCallback = Arc<dyn Fn(&ProcessDescriptor) -> Result<()> + Send + Sync>;

/// A registered interest in a set of executable names.
pub struct Subscription {
    names: HashSet<String>,
    retroactive: bool,
    callback: ProcessCallback,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("names", &self.names)
            .field("retroactive", &self.retroactive)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// Whether `name` is in this subscription's name set (case-sensitive).
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Executable names this subscription is interested in.
    #[must_use]
    pub fn names(&self) -> &HashSet<String> {
        &self.names
    }

    /// Whether already-running processes were evaluated at subscribe time.
    #[must_use]
    pub fn is_retroactive(&self) -> bool {
        self.retroactive
    }

    fn invoke(&self, descriptor: &ProcessDescriptor) -> Result<()> {
        catch_unwind(AssertUnwindSafe(|| (self.callback)(descriptor))).unwrap_or_else(|_| {
            Err(AppError::Subscriber(format!(
                "callback panicked for {} (pid {})",
                descriptor.name(),
                descriptor.process_id()
            )))
        })
    }
}

/// Dispatches process discovery events to subscribers.
pub struct ProcessWatcherService {
    source: Arc<dyn ProcessSource>,
    subscriptions: RwLock<Vec<Arc<Subscription>>>,
    initialized: AtomicBool,
}

impl ProcessWatcherService {
    /// Create a watcher over `source`. Nothing is delivered until
    /// [`initialize`](Self::initialize) is called.
    #[must_use]
    pub fn new(source: Arc<dyn ProcessSource>) -> Self {
        Self {
            source,
            subscriptions: RwLock::new(Vec::new()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Start the process source and hook its discovery events.
    ///
    /// Calling this again after a successful start is a no-op; the event
    /// hook is installed exactly once.
    ///
    /// # Errors
    ///
    /// Returns the source's error if it fails to start.
    pub fn initialize(self: &Arc<Self>) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("process watcher already initialized");
            return Ok(());
        }

        let watcher = Arc::downgrade(self);
        let handler: DiscoveryHandler = Arc::new(move |found: &ProcessFound| {
            watcher.upgrade().map_or(Ok(()), |watcher| {
                watcher
                    .handle_process_found(&found.name, found.process_id, found.parent_process_id)
                    .map(|_| ())
            })
        });

        if let Err(err) = self.source.start(handler) {
            self.initialized.store(false, Ordering::SeqCst);
            return Err(err);
        }

        info!("process watcher initialized");
        Ok(())
    }

    /// Register `callback` for processes named in `names`.
    ///
    /// With `retroactive`, already-running matches are delivered to
    /// `callback` before this returns, each with its resolved parent
    /// process id. The subscription stays registered for live events even
    /// if the retroactive scan fails.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Discovery` if the retroactive scan fails, or
    /// `AppError::Subscriber` if `callback` failed for a retroactive match.
    pub fn subscribe<I, S>(&self, names: I, retroactive: bool, callback: ProcessCallback) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let subscription = Arc::new(Subscription {
            names: names.into_iter().map(Into::into).collect(),
            retroactive,
            callback,
        });

        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&subscription));

        debug!(names = ?subscription.names, retroactive, "process subscription added");

        if retroactive {
            self.discover_running(&subscription)?;
        }
        Ok(())
    }

    /// Dispatch one discovered process to every matching subscription.
    ///
    /// Returns the number of subscriptions notified.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Subscriber` if any notified callback failed; all
    /// matching subscriptions are still invoked.
    pub fn handle_process_found(
        &self,
        name: &str,
        process_id: u32,
        parent_process_id: u32,
    ) -> Result<usize> {
        let descriptor = ProcessDescriptor::new(name, process_id, parent_process_id);
        let snapshot = self.snapshot();
        deliver(
            &descriptor,
            snapshot.iter().filter(|subscription| subscription.matches(name)),
        )
    }

    /// Whether `process_id` is still running.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Discovery` if the process table cannot be read.
    pub fn is_running(&self, process_id: u32) -> Result<bool> {
        Ok(self.source.parent_process_id(process_id)?.is_some())
    }

    /// Number of registered subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn snapshot(&self) -> Vec<Arc<Subscription>> {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn discover_running(&self, subscription: &Arc<Subscription>) -> Result<()> {
        let _span = info_span!("retroactive_discovery", names = ?subscription.names).entered();

        let running = self
            .source
            .find_processes(&|process: &RunningProcess| subscription.matches(&process.name))?;

        let mut descriptors = Vec::with_capacity(running.len());
        for process in running {
            match self.source.parent_process_id(process.process_id)? {
                Some(parent) => descriptors.push(ProcessDescriptor::new(
                    process.name,
                    process.process_id,
                    parent,
                )),
                None => {
                    debug!(
                        pid = process.process_id,
                        name = process.name,
                        "process exited during retroactive scan"
                    );
                }
            }
        }

        let mut failures = Vec::new();
        for descriptor in &descriptors {
            if let Err(err) = subscription.invoke(descriptor) {
                warn!(%err, pid = descriptor.process_id(), "retroactive subscriber failed");
                failures.push(err);
            }
        }
        debug!(matches = descriptors.len(), "retroactive discovery complete");

        match failures.first() {
            None => Ok(()),
            Some(first) => Err(AppError::Subscriber(format!(
                "{} of {} retroactive deliveries failed; first: {first}",
                failures.len(),
                descriptors.len()
            ))),
        }
    }
}

/// Invoke every subscription in order, isolating failures.
fn deliver<'a>(
    descriptor: &ProcessDescriptor,
    subscriptions: impl Iterator<Item = &'a Arc<Subscription>>,
) -> Result<usize> {
    let mut notified = 0usize;
    let mut failures = Vec::new();

    for subscription in subscriptions {
        notified += 1;
        if let Err(err) = subscription.invoke(descriptor) {
            warn!(
                %err,
                name = descriptor.name(),
                pid = descriptor.process_id(),
                "process subscriber failed"
            );
            failures.push(err);
        }
    }

    match failures.first() {
        None => Ok(notified),
        Some(first) => Err(AppError::Subscriber(format!(
            "{} of {notified} subscribers failed for {} (pid {}); first: {first}",
            failures.len(),
            descriptor.name(),
            descriptor.process_id()
        ))),
    }
}
