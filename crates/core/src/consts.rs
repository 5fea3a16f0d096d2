//! Constant variables.

/// Number of vnodes a process hosts by default.
pub const DEFAULT_NUM_VNODES: usize = 8;
/// Default successor list capacity.
pub const DEFAULT_NUM_SUCCESSORS: usize = 8;
/// Ring width matching a SHA-1 digest.
pub const DEFAULT_HASH_BITS: usize = 160;
/// Base stabilization interval in ms
pub const DEFAULT_STABILIZE_INTERVAL_MS: u64 = 30 * 1000;
/// Max deviation from the base stabilization interval in ms
pub const DEFAULT_STABILIZE_JITTER_MS: u64 = 15 * 1000;
/// Max random delay in ms added to each call of the dummy transport
pub const DUMMY_DELAY_MAX_MS: u64 = 20;
