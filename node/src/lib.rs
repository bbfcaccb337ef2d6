//! Node-level processing: the block ingress pipeline, inbound message
//! routing, post-consensus cementing, and subsystem lifecycle.

pub mod block_processor;
pub mod config;
pub mod confirmation_height;
pub mod confirming_set;
pub mod error;
pub mod message_handler;
pub mod node;

pub use block_processor::{BlockProcessor, BlockSource, ProcessedEvent};
pub use config::NodeConfig;
pub use confirmation_height::{CementEvent, CementMode, ConfirmationHeightProcessor};
pub use confirming_set::ConfirmingSet;
pub use error::NodeError;
pub use message_handler::{MessageHandler, Routed};
pub use node::Node;
