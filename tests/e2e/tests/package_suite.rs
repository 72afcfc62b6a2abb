//! Package suite against the simulated guest.

use vmcheck_core::{Enablements, RunReport, Suite};
use vmcheck_e2e::{Fault, TestHarness, assert_command_issued, assert_failed_at, assert_passed};

#[test]
fn test_full_suite_passes() {
    let harness = TestHarness::new(Suite::Package);
    assert_passed!(harness.run());

    let vm = harness.vm();
    assert_command_issued!(vm, "install -dm 0700 -o alice -g users /var/lib/hakurei/1000", 1);
    assert_command_issued!(vm, "test -e /tmp/hakurei.1000/tmpdir/2/success-client");
    assert!(vm.has_file("/tmp/fpkg-install-done"));
}

#[test]
fn test_package_enablements() {
    let report = TestHarness::new(Suite::Package)
        .with_fault(Fault::WrongEnablements("foot", Enablements::WAYLAND))
        .run();

    assert_failed_at!(report, "start-package");
}

#[test]
fn test_acl_revoked_after_exit() {
    let report = TestHarness::new(Suite::Package)
        .with_fault(Fault::AclLeak)
        .run();

    assert_failed_at!(report, "start-package");
}

#[test]
fn test_report_written() {
    let dir = tempfile::tempdir().unwrap();
    let report = TestHarness::new(Suite::Package).run();
    let path = report.write_to(dir.path()).unwrap();

    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        format!("report-{}.json", report.run_id)
    );
    let written: RunReport = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written.run_id, report.run_id);
    assert_eq!(written.suite, Suite::Package);
    assert_eq!(written.outcomes, report.outcomes);

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["suite"], "package");
    assert_eq!(raw["outcomes"][0]["status"], "passed");
}
