//! Retry and failure classification primitives.
//!
//! - [RetryState] tracks attempts against a [RetryConfig] and hands out the
//!   delay before the next attempt, escalating from quick retries to
//!   exponential backoff and finally a fixed steady interval.
//! - [FailureKind] is the tag every error type in the pipeline exposes through
//!   [Classify], so callers can tell a transient RPC hiccup from a fatal
//!   condition without inspecting error messages.
pub mod failure;
pub mod retry;

pub use failure::{Classify, FailureKind};
pub use retry::{RetryConfig, RetryPhase, RetryState};
