//! Unit tests for phases, modifications, and injection configuration.

use modweaver::models::injection::InjectionConfiguration;
use modweaver::models::modification::{Modification, ModificationTargetType};
use modweaver::models::phase::Phase;
use modweaver::models::process::ProcessDescriptor;

#[test]
fn phases_are_ordered_by_launch_stage() {
    assert!(Phase::Uninitialized < Phase::Preclient);
    assert!(Phase::Preclient < Phase::Client);
    assert!(Phase::Client < Phase::Game);
}

#[test]
fn phase_transitions_only_move_forward() {
    assert!(Phase::Uninitialized.can_transition_to(Phase::Preclient));
    assert!(Phase::Preclient.can_transition_to(Phase::Game));
    assert!(!Phase::Client.can_transition_to(Phase::Client));
    assert!(!Phase::Game.can_transition_to(Phase::Preclient));
}

#[test]
fn phase_and_target_display_lowercase() {
    assert_eq!(Phase::Preclient.to_string(), "preclient");
    assert_eq!(ModificationTargetType::Client.to_string(), "client");
    assert_eq!(ModificationTargetType::Game.to_string(), "game");
}

#[test]
fn modification_equality_is_identity() {
    let a = Modification::new("hd-textures", "/mods/hd-textures");
    let twin = Modification::new("hd-textures", "/mods/hd-textures");
    let shared = a.clone();

    assert_eq!(a, shared);
    assert_ne!(a, twin);
    assert_eq!(a.name(), "hd-textures");
    assert_eq!(a.root(), std::path::Path::new("/mods/hd-textures"));
}

#[test]
fn injection_configuration_collects_properties() {
    let config = InjectionConfiguration::new("/opt/runtime.so")
        .with_property("channel", "beta")
        .with_property("channel", "live")
        .with_property("log", "debug");

    assert_eq!(config.properties.len(), 2);
    assert_eq!(config.properties["channel"], "live");
}

#[test]
fn descriptor_exposes_identity() {
    let descriptor = ProcessDescriptor::new("client.exe", 4321, 1234);
    assert_eq!(descriptor.name(), "client.exe");
    assert_eq!(descriptor.process_id(), 4321);
    assert_eq!(descriptor.parent_process_id(), 1234);
}
