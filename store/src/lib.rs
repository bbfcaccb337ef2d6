//! Abstract storage for the cobalt ledger.
//!
//! Defines the logical tables, the read/write transaction contract and the
//! typed records each table stores. Backends (LMDB, in-memory) implement the
//! traits; the rest of the workspace depends only on this crate.

pub mod account;
pub mod confirmation_height;
pub mod error;
pub mod mem;
pub mod pending;
pub mod txn;
pub mod unchecked;

pub use account::AccountInfo;
pub use confirmation_height::ConfirmationHeightInfo;
pub use error::StoreError;
pub use mem::MemStore;
pub use pending::{PendingInfo, PendingKey};
pub use txn::{ReadTransaction, Store, Table, WriteTransaction};
pub use unchecked::{SignatureVerification, UncheckedInfo, UncheckedKey};
