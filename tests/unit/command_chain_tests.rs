//! Unit tests for command-backed resolution and compilation chains.

use std::path::Path;

use modweaver::adapters::command_chain::substitute;
use modweaver::adapters::CommandChainService;
use modweaver::chain::ChainKind;
use modweaver::config::{StageConfig, StepConfig};
use modweaver::models::modification::{Modification, ModificationTargetType};
use modweaver::services::{CompilerService, ResolutionService};
use modweaver::AppError;

fn step(program: &str, args: &[&str]) -> StepConfig {
    StepConfig {
        program: program.to_owned(),
        args: args.iter().map(|arg| (*arg).to_owned()).collect(),
    }
}

#[test]
fn placeholders_are_substituted() {
    let arg = substitute(
        "--root={modification}:{target}",
        Path::new("/mods/hd"),
        ModificationTargetType::Client,
    );
    assert_eq!(arg, "--root=/mods/hd:client");
}

#[tokio::test]
async fn empty_stage_completes_immediately() {
    let service = CommandChainService::new(ChainKind::Resolution, &StageConfig::default());
    let modification = Modification::new("hd", "/mods/hd");

    service
        .start_modification_resolution(&modification, ModificationTargetType::Client)
        .wait_for_chain_completion()
        .await
        .unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn steps_run_in_order_inside_the_modification_root() {
    let dir = tempfile::tempdir().expect("tempdir");
    let modification = Modification::new("hd", dir.path());
    let service = CommandChainService::new(
        ChainKind::Compilation,
        &StageConfig {
            steps: vec![
                step("sh", &["-c", "echo first:{target} > trace"]),
                step("sh", &["-c", "echo second >> trace"]),
            ],
        },
    );

    service
        .compile_objects(&modification, ModificationTargetType::Client)
        .wait_for_chain_completion()
        .await
        .unwrap();

    let trace = std::fs::read_to_string(dir.path().join("trace")).expect("trace file");
    assert_eq!(trace, "first:client\nsecond\n");
}

#[cfg(unix)]
#[tokio::test]
async fn failing_step_stops_the_chain_with_its_stage_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let modification = Modification::new("hd", dir.path());
    let service = CommandChainService::new(
        ChainKind::Resolution,
        &StageConfig {
            steps: vec![step("false", &[]), step("sh", &["-c", "touch reached"])],
        },
    );

    let err = service
        .start_modification_resolution(&modification, ModificationTargetType::Client)
        .wait_for_chain_completion()
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Resolution(ref msg) if msg.contains("false exited")));
    assert!(!dir.path().join("reached").exists());
}
