//! Records exchanged between extraction, enrichment and sinks.
//!
//! A [Record] is an open field map tagged with its [EntityType]. Records are
//! built by extraction jobs, gain fields through enrichment, and finally get an
//! `item_id` and an `item_timestamp` from [identity::assign] right before being
//! handed to a sink in the order produced by [sequence::sequence].
mod entity;
pub mod identity;
mod range;
mod record;
pub mod sequence;

pub use entity::{EntityType, UnknownEntityType};
pub use range::{BlockRange, InvalidBlockRange};
pub use record::{Fields, Record};
pub use serde_json::{json, Value};
