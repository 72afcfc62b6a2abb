//! Instance state checks against scripted listings in every known shape.

use std::time::Duration;

use vmcheck_core::testing::ScriptedMachine;
use vmcheck_core::{
    Config, Enablements, ExecOutput, ExpectedLaunch, Guest, HarnessError, Poller, StateVerifier,
};
use vmcheck_e2e::fixtures::{confined_record, keyed_listing, package_record};

fn check(listing: String, expected: &ExpectedLaunch, enablements: Enablements) -> vmcheck_core::Result<()> {
    let machine = ScriptedMachine::new();
    machine.on("--json ps", ExecOutput::ok(listing));
    let guest = Guest::new(
        machine,
        Poller::new(Duration::from_millis(1), Duration::from_millis(10)),
    );
    let config = Config::default();
    StateVerifier::new(&guest, &config)
        .check_single_instance(expected, enablements)
        .map(|_| ())
}

fn ne_foot() -> ExpectedLaunch {
    ExpectedLaunch::wrapper("ne-foot", "/nix/store/")
}

#[test]
fn test_keyed_wrapper_listing() -> anyhow::Result<()> {
    let listing = keyed_listing(&[confined_record("ne-foot", 1)]);
    check(listing, &ne_foot(), Enablements::WAYLAND)?;
    Ok(())
}

#[test]
fn test_array_listing() -> anyhow::Result<()> {
    let listing = serde_json::Value::Array(vec![confined_record("ne-foot", 9)]).to_string();
    check(listing, &ne_foot(), Enablements::WAYLAND | Enablements::PULSE)?;
    Ok(())
}

#[test]
fn test_package_listing() -> anyhow::Result<()> {
    let listing = keyed_listing(&[package_record("hakurei", "foot", 13)]);
    check(
        listing,
        &ExpectedLaunch::package("foot", "hakurei", "/nix/store/"),
        Enablements::WAYLAND | Enablements::DBUS | Enablements::PULSE,
    )?;
    Ok(())
}

#[test]
fn test_empty_listing() {
    let err = check("{}".to_string(), &ne_foot(), Enablements::WAYLAND).unwrap_err();
    assert!(matches!(
        err,
        HarnessError::UnexpectedCardinality {
            expected: 1,
            found: 0,
            ..
        }
    ));
}

#[test]
fn test_other_app_running() {
    let listing = keyed_listing(&[confined_record("da-foot", 1)]);
    let err = check(listing, &ne_foot(), Enablements::WAYLAND).unwrap_err();
    assert!(matches!(err, HarnessError::UnexpectedLaunchCommand { .. }));
    assert!(err.to_string().contains("da-foot-start"));
}

#[test]
fn test_missing_integration() {
    let listing = keyed_listing(&[confined_record("pa-foot", 1)]);
    let err = check(
        listing,
        &ExpectedLaunch::wrapper("pa-foot", "/nix/store/"),
        Enablements::WAYLAND | Enablements::PULSE,
    )
    .unwrap_err();
    match err {
        HarnessError::UnexpectedEnablements { expected, found } => {
            assert_eq!(expected.bits(), 9);
            assert_eq!(found, Enablements::WAYLAND);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_garbage_listing() {
    let err = check("not json".to_string(), &ne_foot(), Enablements::WAYLAND).unwrap_err();
    assert!(matches!(err, HarnessError::Decode { .. }));
}
