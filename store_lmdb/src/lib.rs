//! LMDB-backed implementation of the `cobalt-store` traits.
//!
//! One named database per logical table. LMDB gives snapshot-consistent
//! readers and a single serialized writer per environment, which satisfies
//! the transaction contract directly: a write transaction's table-lock set
//! degenerates to the whole environment.

pub mod environment;
pub mod error;
pub mod migration;
pub mod txn;

pub use environment::LmdbStore;
pub use error::LmdbError;
pub use migration::CURRENT_SCHEMA_VERSION;
