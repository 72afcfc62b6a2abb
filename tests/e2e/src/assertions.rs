//! Assertion macros for run reports and guest logs.

/// Asserts that every scenario of a run passed.
#[macro_export]
macro_rules! assert_passed {
    ($report:expr) => {{
        let report = &$report;
        assert!(
            report.passed(),
            "expected suite {} to pass, failed at {:?}",
            report.suite,
            report.failure()
        )
    }};
}

/// Asserts that a run failed at the named scenario and skipped the rest.
#[macro_export]
macro_rules! assert_failed_at {
    ($report:expr, $name:expr) => {{
        let report = &$report;
        let failure = report
            .failure()
            .unwrap_or_else(|| panic!("expected suite {} to fail at {}", report.suite, $name));
        assert_eq!(failure.name, $name, "failed at the wrong scenario: {:?}", failure);
        let position = report
            .outcomes
            .iter()
            .position(|o| o.name == $name)
            .unwrap();
        for later in &report.outcomes[position + 1..] {
            assert_eq!(
                later.outcome,
                vmcheck_core::Outcome::Skipped,
                "scenario {} ran after the failure",
                later.name
            );
        }
    }};
}

/// Asserts that the failure message of a run contains a substring.
#[macro_export]
macro_rules! assert_failure_contains {
    ($report:expr, $substring:expr) => {{
        let report = &$report;
        match report.failure().map(|f| &f.outcome) {
            Some(vmcheck_core::Outcome::Failed { error, .. }) => assert!(
                error.contains($substring),
                "expected failure to contain '{}', got '{}'",
                $substring,
                error
            ),
            other => panic!("expected a failed scenario, got {:?}", other),
        }
    }};
}

/// Asserts that the guest saw a command or keystroke entry containing a substring.
#[macro_export]
macro_rules! assert_command_issued {
    ($vm:expr, $substring:expr) => {
        assert!(
            $vm.count($substring) > 0,
            "expected a guest command containing '{}', got {:#?}",
            $substring,
            $vm.log()
        )
    };
    ($vm:expr, $substring:expr, $times:expr) => {
        assert_eq!(
            $vm.count($substring),
            $times,
            "unexpected number of guest commands containing '{}': {:#?}",
            $substring,
            $vm.log()
        )
    };
}
