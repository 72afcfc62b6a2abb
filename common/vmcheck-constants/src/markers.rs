/// Marker written inside the sandbox by the `check-sandbox-*` helpers.
pub const SANDBOX_OK: &str = "sandbox-ok";

/// Log file for the backgrounded Go test run.
pub const GO_TEST_LOG: &str = "/tmp/go-test";

/// Marker written when the backgrounded Go test run passes.
pub const GO_TEST_OK: &str = "/tmp/go-test-ok";

/// Marker written by the session wrapper when sway exits with status 0.
pub const SWAY_EXIT_OK: &str = "/tmp/sway-exit-ok";

/// Prefix of the per-identity marker written by the container check helpers.
pub const CHECK_OK_PREFIX: &str = "/var/tmp/.hakurei-check-ok.";
