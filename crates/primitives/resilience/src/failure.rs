use serde::{Deserialize, Serialize};

/// How a failure should be handled by the layer that observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Retrying the same operation unchanged may succeed (timeouts, connection
    /// resets, overloaded node).
    Transient,
    /// Retrying cannot help; the error must be propagated.
    Fatal,
}

impl FailureKind {
    pub fn is_transient(self) -> bool {
        matches!(self, FailureKind::Transient)
    }
}

/// Exposes the [FailureKind] of an error.
pub trait Classify {
    fn failure_kind(&self) -> FailureKind;

    fn is_transient(&self) -> bool {
        self.failure_kind().is_transient()
    }

    /// The remote side rejected the request because of its size; the same
    /// work split into smaller requests may succeed.
    fn is_too_large(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Timeout;
    impl Classify for Timeout {
        fn failure_kind(&self) -> FailureKind {
            FailureKind::Transient
        }
    }

    #[test]
    fn classify_default_is_transient_follows_kind() {
        assert!(Timeout.is_transient());
        assert!(!FailureKind::Fatal.is_transient());
    }

    #[test]
    fn failure_kind_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&FailureKind::Transient).unwrap(), "\"transient\"");
    }
}
