/// Environment variable prefix for configuration overrides.
pub const CONFIG_PREFIX: &str = "VMCHECK_";

/// Separator between nested configuration keys in environment overrides.
pub const CONFIG_SPLIT: &str = "__";

/// Runtime directory variable passed to the sandbox tool.
pub const XDG_RUNTIME_DIR: &str = "XDG_RUNTIME_DIR";

/// Wayland display variable passed to check helpers.
pub const WAYLAND_DISPLAY: &str = "WAYLAND_DISPLAY";
