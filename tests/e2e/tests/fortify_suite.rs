//! Desktop suite against the simulated guest.

use vmcheck_core::{Enablements, FailureKind, Outcome, Suite};
use vmcheck_e2e::{
    Fault, TestHarness, assert_command_issued, assert_failed_at, assert_failure_contains,
    assert_passed,
};

#[test]
fn test_full_suite_passes() {
    let harness = TestHarness::new(Suite::Fortify);
    let report = harness.run();

    assert_passed!(report);
    assert_eq!(report.outcomes.len(), 17);
    assert_eq!(report.outcomes[0].name, "boot");
    assert_eq!(report.outcomes[16].name, "teardown");
}

#[test]
fn test_apps_use_identities_after_check_presets() {
    let harness = TestHarness::new(Suite::Fortify);
    assert_passed!(harness.run());

    let vm = harness.vm();
    for identity in 1..=3 {
        assert_command_issued!(vm, &format!("test -e /tmp/fortify.1000/tmpdir/{identity}/sandbox-ok"));
    }
    assert_command_issued!(vm, "test -e /tmp/fortify.1000/tmpdir/4/client-ok");
    assert_command_issued!(vm, "test -e /tmp/fortify.1000/tmpdir/5/pulse-ok");
    assert_command_issued!(vm, "test -e /tmp/fortify.1000/tmpdir/6/x11-ok");
    assert_command_issued!(vm, "test -e /tmp/fortify.1000/tmpdir/7/direct-ok");
    assert!(vm.windows().is_empty());
}

#[test]
fn test_state_is_collected_per_app() {
    let harness = TestHarness::new(Suite::Fortify);
    assert_passed!(harness.run());

    let vm = harness.vm();
    for state in ["foot_wayland", "pulse_wayland", "alacritty_x11", "foot_direct"] {
        assert_command_issued!(vm, &format!("copy:/tmp/{state}.json"), 1);
        assert_command_issued!(vm, &format!("copy:/tmp/{state}.ps"), 1);
        assert!(vm.log().contains(&format!("screenshot:{state}")));
    }
}

#[test]
fn test_interrupt_covers_every_flag_set() {
    let harness = TestHarness::new(Suite::Fortify);
    assert_passed!(harness.run());

    assert_command_issued!(harness.vm(), "key:ctrl-c", 4);
    assert_command_issued!(harness.vm(), "cat /tmp/pd-silent", 3);
}

#[test]
fn test_untrusted_user_accepted() {
    let report = TestHarness::new(Suite::Fortify)
        .with_fault(Fault::AcceptUntrusted)
        .run();

    assert_failed_at!(report, "deny-unmapped-uid");
    assert_failure_contains!(report, "unexpectedly succeeded");
    assert_eq!(report.outcomes[0].outcome, Outcome::Passed);
}

#[test]
fn test_noisy_interrupt() {
    let report = TestHarness::new(Suite::Fortify)
        .with_fault(Fault::NoisyInterrupt)
        .run();

    assert_failed_at!(report, "silent-output-interrupt");
    assert_failure_contains!(report, "cat /tmp/pd-silent");
}

#[test]
fn test_acl_entry_outlives_instances() {
    let report = TestHarness::new(Suite::Fortify)
        .with_fault(Fault::AclLeak)
        .run();

    assert_failed_at!(report, "acl-revocation");
}

#[test]
fn test_wrong_enablements() {
    let report = TestHarness::new(Suite::Fortify)
        .with_fault(Fault::WrongEnablements("pa-foot", Enablements::WAYLAND))
        .run();

    assert_failed_at!(report, "pulseaudio-app");
    assert_failure_contains!(report, "unexpected enablements");
}

#[test]
fn test_duplicate_instances() {
    let report = TestHarness::new(Suite::Fortify)
        .with_fault(Fault::DuplicateInstances)
        .run();

    assert_failed_at!(report, "wayland-app");
    assert_failure_contains!(report, "unexpected state length 2");
    assert!(matches!(
        report.failure().unwrap().outcome,
        Outcome::Failed {
            kind: FailureKind::InstanceState,
            ..
        }
    ));
}
