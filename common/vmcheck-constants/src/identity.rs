/// Flat subject base used by setuid-helper builds that map identity 0 to uid 1000000.
pub const FLAT_BASE: u32 = 1_000_000;

/// Per-user stride used by helper builds that scale by user id.
pub const USER_STRIDE: u32 = 10_000;

/// Lowest uid a scaled helper build may hand out.
pub const SCALED_BASE: u32 = 10_000;

/// Largest identity accepted by the sandbox tool.
pub const MAX_IDENTITY: u32 = 9999;
