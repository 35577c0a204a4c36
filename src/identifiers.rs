//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing correlation ids with observer handles.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// CommandId
// ============================================================================

/// Correlation identifier of an outbound request or subscription.
///
/// Replies and subscription updates echo the id of the frame that
/// originated them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(u64);

impl CommandId {
    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// CommandIdGenerator
// ============================================================================

/// Mints monotonically increasing [`CommandId`]s.
///
/// One generator lives as long as its client; routing tables are reset per
/// connection so ids never need to be recycled.
#[derive(Debug, Default)]
pub(crate) struct CommandIdGenerator {
    next: AtomicU64,
}

impl CommandIdGenerator {
    /// Returns the next unused id.
    #[inline]
    pub(crate) fn next(&self) -> CommandId {
        CommandId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

// ============================================================================
// ObserverId
// ============================================================================

/// Handle returned by observer registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    #[inline]
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_is_monotonic() {
        let ids = CommandIdGenerator::default();
        let first = ids.next();
        let second = ids.next();
        assert_eq!(first.as_u64(), 0);
        assert!(second > first);
    }

    #[test]
    fn test_command_id_serializes_as_number() {
        let json = serde_json::to_string(&CommandId::new(42)).expect("serialize");
        assert_eq!(json, "42");
    }

    #[test]
    fn test_display() {
        assert_eq!(CommandId::new(3).to_string(), "3");
        assert_eq!(ObserverId::new(1).to_string(), "observer-1");
    }
}
