//! Channel output layer.
//!
//! - Channel dialects and byte-budget profiles (`ChannelProfile`)
//! - Batch packing of rendered reports (`BatchPacker`)

pub mod channel;
pub mod packer;

pub use channel::{ChannelProfile, Dialect};
pub use packer::{BatchPacker, add_batch_headers, pack_report};
