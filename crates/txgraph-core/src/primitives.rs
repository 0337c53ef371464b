//! # Engine Primitives
//!
//! Hardcoded runtime constants for txgraph-core.
//!
//! These bound every input and every scan. They are compiled into the
//! binary and are immutable at runtime.

/// Magic bytes for the txgraph binary snapshot header.
///
/// - File Header = Magic Bytes ("TXGR") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"TXGR";

/// Current serialization format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

/// Default page size for `list_nodes` when the caller gives none.
pub const DEFAULT_LIST_LIMIT: usize = 200;

/// Upper bound for any listing, whatever the caller asks for.
pub const MAX_LIST_LIMIT: usize = 10_000;

/// Maximum depth for `reachable` queries.
///
/// Shortest path is unbounded; reachability is not.
pub const MAX_TRAVERSAL_DEPTH: usize = 100;

/// Traversals poll their cancel token once per this many dequeued nodes.
pub const CANCEL_CHECK_INTERVAL: usize = 64;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length in bytes for `user_id` and `txn_id`.
pub const MAX_ID_LENGTH: usize = 256;

/// Maximum length in bytes for any string attribute (name, email, device, ...).
///
/// Longer values are rejected by the Validator.
pub const MAX_ATTRIBUTE_LENGTH: usize = 1024;
