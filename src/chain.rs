//! Chains: asynchronous operation graphs joined through a single handle.
//!
//! A resolution or compilation for one modification is a graph of work
//! (the stage itself plus any continuations). Callers only ever see the
//! last handle of the graph; [`ChainTask::wait_for_chain_completion`]
//! resolves once every stage has finished and yields the graph's terminal
//! failure, not just the first stage's.

use std::future::Future;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, info_span, Instrument};

use crate::{AppError, Result};

/// A joinable, in-flight chain of work for one modification.
pub trait ChainTask: Send {
    /// Wait until the whole chain, including continuations, has finished.
    ///
    /// # Errors
    ///
    /// Returns the chain's terminal failure.
    fn wait_for_chain_completion(self: Box<Self>) -> BoxFuture<'static, Result<()>>;
}

/// Handle to a modification's resolution chain.
pub type ResolutionTask = Box<dyn ChainTask>;

/// Handle to a modification's compilation chain.
pub type CompilationTask = Box<dyn ChainTask>;

/// Pipeline stage a chain belongs to; selects the error variant for failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainKind {
    /// Dependency resolution.
    Resolution,
    /// Object compilation.
    Compilation,
}

impl ChainKind {
    /// Build the failure error for this stage.
    #[must_use]
    pub fn failure(self, message: impl Into<String>) -> AppError {
        match self {
            Self::Resolution => AppError::Resolution(message.into()),
            Self::Compilation => AppError::Compilation(message.into()),
        }
    }
}

impl std::fmt::Display for ChainKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resolution => f.write_str("resolution"),
            Self::Compilation => f.write_str("compilation"),
        }
    }
}

/// A chain stage running on its own tokio task.
///
/// Must be created from within a tokio runtime.
pub struct ChainHandle {
    kind: ChainKind,
    label: String,
    task: JoinHandle<Result<()>>,
}

impl std::fmt::Debug for ChainHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainHandle")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

impl ChainHandle {
    /// Start `stage` on its own task.
    #[must_use]
    pub fn spawn<F>(kind: ChainKind, label: impl Into<String>, stage: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let label = label.into();
        let span = info_span!("chain_stage", %kind, label = %label);
        Self {
            kind,
            label,
            task: tokio::spawn(stage.instrument(span)),
        }
    }

    /// A chain that has already completed successfully.
    #[must_use]
    pub fn completed(kind: ChainKind, label: impl Into<String>) -> Self {
        Self::spawn(kind, label, async { Ok(()) })
    }

    /// A chain that has already failed with `message`.
    #[must_use]
    pub fn failed(kind: ChainKind, label: impl Into<String>, message: impl Into<String>) -> Self {
        let err = kind.failure(message);
        Self::spawn(kind, label, async move { Err(err) })
    }

    /// Append a continuation that runs after this chain succeeds.
    ///
    /// The returned handle covers the whole graph: joining it waits for
    /// this chain and then the continuation. If this chain fails, the
    /// continuation never runs and the failure is propagated.
    #[must_use]
    pub fn then<F, Fut>(self, label: impl Into<String>, continuation: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let kind = self.kind;
        Self::spawn(kind, label, async move {
            self.join().await?;
            continuation().await
        })
    }

    /// Stage this chain belongs to.
    #[must_use]
    pub fn kind(&self) -> ChainKind {
        self.kind
    }

    /// Whether the most recent stage has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the chain and return its terminal result.
    ///
    /// # Errors
    ///
    /// Returns the chain's failure. A stage that panicked or was cancelled
    /// is reported as a failure of this chain's [`ChainKind`].
    pub async fn join(self) -> Result<()> {
        let Self { kind, label, task } = self;
        match task.await {
            Ok(result) => {
                debug!(%kind, label, ok = result.is_ok(), "chain joined");
                result
            }
            Err(err) if err.is_panic() => Err(kind.failure(format!("{label}: stage panicked"))),
            Err(err) => Err(kind.failure(format!("{label}: stage cancelled: {err}"))),
        }
    }
}

impl ChainTask for ChainHandle {
    fn wait_for_chain_completion(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        (*self).join().boxed()
    }
}
