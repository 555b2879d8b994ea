//! Result types for index operations.

/// What an index write did.
///
/// Every variant is a successful, idempotent outcome: re-applying the same
/// `(identity, version)` update yields `Stale` and leaves the index unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The index now reflects the requested version.
    Applied,
    /// The index already held an equal or higher version for the identity.
    Stale,
    /// Nothing to write (e.g. the entity no longer exists at that version).
    Skipped,
}

impl WriteOutcome {
    /// Whether the index was mutated.
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}
