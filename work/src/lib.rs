//! Proof-of-work valuation, thresholds and generation.
//!
//! Every block carries a 64-bit nonce. Its value is an 8-byte Blake2b digest
//! of the nonce and the block root; the required threshold depends on the
//! block's epoch and whether it is receive-side work.

pub mod difficulty;
pub mod pool;
pub mod thresholds;
pub mod value;

pub use difficulty::{difficulty_from_multiplier, multiplier_from_difficulty, DifficultyEma};
pub use pool::{generate_blocking, LocalWorkPool, WorkGenerator};
pub use thresholds::{threshold, validate_work, WorkSubtype};
pub use value::work_value;
