//! Unit tests for the resource streaming gate.

use modweaver::adapters::StreamingGate;
use modweaver::services::ResourceStreaming;
use modweaver::AppError;

#[test]
fn suspend_and_resume_toggle_the_gate() {
    let gate = StreamingGate::default();
    assert!(!gate.is_suspended());

    gate.suspend().unwrap();
    assert!(gate.is_suspended());

    gate.resume().unwrap();
    assert!(!gate.is_suspended());
}

#[test]
fn resume_without_suspend_is_harmless() {
    let gate = StreamingGate::default();
    gate.resume().unwrap();
    assert!(!gate.is_suspended());
}

#[test]
fn pause_file_exists_only_while_suspended() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pause = dir.path().join("streaming.pause");
    let gate = StreamingGate::new(Some(pause.clone()));

    gate.suspend().unwrap();
    assert!(pause.exists());

    gate.resume().unwrap();
    assert!(!pause.exists());

    // A second resume must tolerate the file already being gone.
    gate.resume().unwrap();
}

#[test]
fn unwritable_pause_file_fails_suspend() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gate = StreamingGate::new(Some(dir.path().join("missing").join("streaming.pause")));

    let err = gate.suspend().unwrap_err();
    assert!(matches!(err, AppError::Streaming(_)));
    assert!(!gate.is_suspended());
}
