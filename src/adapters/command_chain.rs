//! Resolution and compilation chains built from external commands.
//!
//! Each configured step becomes one stage of the chain: the first step is
//! spawned immediately and every following step is a continuation of the
//! previous one. Joining the returned handle waits for the last step and
//! reports the first failing step.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::chain::{ChainHandle, ChainKind, CompilationTask, ResolutionTask};
use crate::config::{StageConfig, StepConfig};
use crate::models::modification::{Modification, ModificationTargetType};
use crate::services::{CompilerService, ResolutionService};
use crate::Result;

/// Runs a configured command chain per modification.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct CommandChainService {
    kind: ChainKind,
    steps: Vec<StepConfig>,
}

impl CommandChainService {
    /// Chain service for `kind` running `stage`'s steps.
    #[must_use]
    pub fn new(kind: ChainKind, stage: &StageConfig) -> Self {
        Self {
            kind,
            steps: stage.steps.clone(),
        }
    }

    /// Start the chain for `modification`. With no steps configured the
    /// chain completes immediately.
    #[must_use]
    pub fn start(&self, modification: &Modification, target: ModificationTargetType) -> ChainHandle {
        let kind = self.kind;
        let mut steps = self.steps.iter().cloned().enumerate();

        let Some((_, first)) = steps.next() else {
            debug!(%kind, modification = modification.name(), "no steps configured");
            return ChainHandle::completed(kind, modification.name());
        };

        let root = modification.root().to_path_buf();
        let label = format!("{}#0", modification.name());
        let head = ChainHandle::spawn(kind, label, {
            let root = root.clone();
            async move { run_step(kind, &first, &root, target).await }
        });

        steps.fold(head, |chain, (index, step)| {
            let root = root.clone();
            let label = format!("{}#{index}", modification.name());
            chain.then(label, move || async move { run_step(kind, &step, &root, target).await })
        })
    }
}

impl ResolutionService for CommandChainService {
    fn start_modification_resolution(
        &self,
        modification: &Modification,
        target: ModificationTargetType,
    ) -> ResolutionTask {
        Box::new(self.start(modification, target))
    }
}

impl CompilerService for CommandChainService {
    fn compile_objects(
        &self,
        modification: &Modification,
        target: ModificationTargetType,
    ) -> CompilationTask {
        Box::new(self.start(modification, target))
    }
}

/// Replace `{modification}` and `{target}` in `arg`.
#[must_use]
pub fn substitute(arg: &str, root: &Path, target: ModificationTargetType) -> String {
    arg.replace("{modification}", &root.to_string_lossy())
        .replace("{target}", &target.to_string())
}

async fn run_step(
    kind: ChainKind,
    step: &StepConfig,
    root: &Path,
    target: ModificationTargetType,
) -> Result<()> {
    let args: Vec<String> = step
        .args
        .iter()
        .map(|arg| substitute(arg, root, target))
        .collect();
    debug!(program = step.program, ?args, "running chain step");

    let output = Command::new(&step.program)
        .args(&args)
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|err| kind.failure(format!("failed to run {}: {err}", step.program)))?;

    if output.status.success() {
        info!(program = step.program, root = %root.display(), "chain step finished");
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(kind.failure(format!(
            "{} exited with {} for {}: {}",
            step.program,
            output.status,
            root.display(),
            stderr.trim()
        )))
    }
}
