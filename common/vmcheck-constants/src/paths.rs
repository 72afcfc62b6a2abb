/// Read-only package store every launch wrapper must live under.
pub const STORE_PREFIX: &str = "/nix/store/";

/// Suffix of per-app launch wrappers.
pub const WRAPPER_SUFFIX: &str = "-start";

/// Per-identity temporary directory root of the sandbox tool.
pub const TMPDIR_ROOT: &str = "/tmp/fortify.1000/tmpdir";

/// Runtime directory of the session user.
pub const RUNTIME_DIR: &str = "/run/user/1000";

/// Sandbox tool state directory inside the runtime directory.
pub const RUN_DIR: &str = "/run/user/1000/fortify";

/// Sway IPC socket created by the session wrapper.
pub const SWAY_IPC_SOCKET: &str = "/tmp/sway-ipc.sock";
