/// Session user owning the compositor.
pub const USER: &str = "alice";

/// Numeric uid of the session user.
pub const UID: u32 = 1000;

/// User that is deliberately absent from the setuid helper's configuration.
pub const UNTRUSTED_USER: &str = "untrusted";

/// Numeric uid of the untrusted user.
pub const UNTRUSTED_UID: u32 = 1001;

/// Guest hostname, part of every terminal window title.
pub const HOSTNAME: &str = "machine";

/// Wayland display name of the compositor.
pub const WAYLAND_DISPLAY: &str = "wayland-1";

/// Compositor control client.
pub const SWAYMSG: &str = "swaymsg";

/// Systemd target the guest must reach before a suite starts.
pub const BOOT_TARGET: &str = "multi-user.target";
