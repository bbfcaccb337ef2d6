//! Shared logging and statistics plumbing.

pub mod logging;
pub mod stats;

pub use logging::init_logging;
pub use stats::StatsCounter;
