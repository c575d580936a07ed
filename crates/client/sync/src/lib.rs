//! Streaming synchronization loop.
//!
//! The [Streamer] repeatedly asks its [StreamerAdapter] for the chain head,
//! picks the next block range with [calculate_target_block], exports it and
//! persists the new checkpoint. A range is only checkpointed once it has been
//! fully exported; a cancelled or failed cycle leaves the checkpoint as is.
mod adapter;
mod streamer;
mod target;

#[cfg(test)]
mod tests;

pub use adapter::StreamerAdapter;
pub use streamer::{Streamer, StreamerConfig, StreamerEvent};
pub use target::{calculate_target_block, SyncTarget};
