//! Per-stream async pipelines and the routing table that holds them

pub mod channel;
pub mod registry;

pub use channel::AsyncLogChannel;
pub use registry::{Lookup, StreamRegistry};
