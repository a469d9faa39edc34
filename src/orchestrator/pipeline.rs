//! Two-barrier resolve/compile pipeline.
//!
//! Runs once per `Uninitialized -> Preclient` transition:
//!
//! 1. Snapshot the modification repository.
//! 2. Start a resolution chain per modification, in snapshot order.
//! 3. Suspend resource streaming.
//! 4. Join every resolution chain (barrier).
//! 5. Start a compilation chain per modification, in snapshot order.
//! 6. Join every compilation chain (barrier).
//!
//! A failing chain aborts the run after the rest of its stage has been
//! drained; the first failure observed in join order is reported and
//! streaming is resumed before returning.

use tracing::{debug, error, info, warn};

use crate::chain::{ChainKind, ChainTask};
use crate::models::modification::ModificationTargetType;
use crate::services::{
    CompilerService, ModificationRepository, ResolutionService, ResourceStreaming,
};
use crate::Result;

/// Collaborators the pipeline calls, borrowed for one run.
pub struct PipelineStages<'a> {
    /// Modification snapshot source.
    pub repository: &'a dyn ModificationRepository,
    /// Resolution chain starter.
    pub resolution: &'a dyn ResolutionService,
    /// Compilation chain starter.
    pub compiler: &'a dyn CompilerService,
    /// Resource streaming control.
    pub streaming: &'a dyn ResourceStreaming,
}

/// Run the pipeline and return the number of modifications processed.
///
/// # Errors
///
/// - `AppError::Repository` if the snapshot fails (nothing else runs).
/// - `AppError::Streaming` if suspend fails; resolutions are drained and
///   nothing is compiled.
/// - The first resolution or compilation failure otherwise.
pub async fn run(stages: &PipelineStages<'_>) -> Result<usize> {
    let modifications = stages.repository.enumerate_modifications()?;
    info!(count = modifications.len(), "modification snapshot taken");

    let resolutions: Vec<Box<dyn ChainTask>> = modifications
        .iter()
        .map(|modification| {
            debug!(modification = modification.name(), "starting resolution");
            stages
                .resolution
                .start_modification_resolution(modification, ModificationTargetType::Client)
        })
        .collect();

    if let Err(err) = stages.streaming.suspend() {
        error!(%err, "failed to suspend resource streaming; draining resolutions");
        let _ = join_in_order(resolutions, ChainKind::Resolution).await;
        return Err(err);
    }
    debug!("resource streaming suspended");

    if let Err(err) = join_in_order(resolutions, ChainKind::Resolution).await {
        resume_after_abort(stages.streaming);
        return Err(err);
    }
    info!(count = modifications.len(), "all resolutions complete");

    let compilations: Vec<Box<dyn ChainTask>> = modifications
        .iter()
        .map(|modification| {
            debug!(modification = modification.name(), "starting compilation");
            stages
                .compiler
                .compile_objects(modification, ModificationTargetType::Client)
        })
        .collect();

    if let Err(err) = join_in_order(compilations, ChainKind::Compilation).await {
        resume_after_abort(stages.streaming);
        return Err(err);
    }
    info!(count = modifications.len(), "all compilations complete");

    Ok(modifications.len())
}

/// Join every chain in order, even after a failure, and return the first
/// failure observed.
async fn join_in_order(tasks: Vec<Box<dyn ChainTask>>, kind: ChainKind) -> Result<()> {
    let mut first_failure = None;
    for (index, task) in tasks.into_iter().enumerate() {
        if let Err(err) = task.wait_for_chain_completion().await {
            warn!(%err, %kind, index, "chain failed");
            first_failure.get_or_insert(err);
        }
    }
    first_failure.map_or(Ok(()), Err)
}

fn resume_after_abort(streaming: &dyn ResourceStreaming) {
    match streaming.resume() {
        Ok(()) => debug!("resource streaming resumed after abort"),
        Err(err) => warn!(%err, "failed to resume resource streaming after abort"),
    }
}
