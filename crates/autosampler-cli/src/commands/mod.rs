//! CLI command implementations

pub mod generate;
pub mod inspect;
pub mod scan;
pub mod train;

use rand::RngCore;

/// Resolve an optional user-provided seed, drawing from OS entropy when
/// absent. Callers print the resolved value so any run can be repeated.
pub(crate) fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| rand::thread_rng().next_u64())
}
