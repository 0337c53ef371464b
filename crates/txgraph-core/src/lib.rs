//! # txgraph-core
//!
//! The property graph engine behind txgraph.
//!
//! Users and transactions are stored as nodes. Transactions are linked to
//! their sender and receiver. On every write the engine infers
//! relationships between entities that share identifying attributes:
//! - users sharing an email, phone, address or payment method
//!   (`SHARED_ATTRIBUTE`)
//! - transactions sharing a device or IP address (`LINKED`)
//!
//! The resulting graph answers reachability and shortest-path queries.
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies (pure Rust)
//! - `BTreeMap` only: listings, snapshots and BFS tie-breaks are reproducible
//! - Integer money: amounts are minor units, never floats
//! - One `RwLock` around the store; cancellation through `CancelToken`

// =============================================================================
// MODULES
// =============================================================================

pub mod cancel;
pub mod engine;
pub mod formats;
pub mod graph;
pub mod index;
pub mod inference;
pub mod primitives;
pub mod query;
pub mod storage;
pub mod traversal;
pub mod types;
pub mod validation;
pub mod views;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Amount, Attribute, Edge, EdgeKind, EdgeRecord, GraphError, Node, NodeKey, NodeKind,
    NodeRecord, Transaction, TransactionPatch, User, UserPatch,
};

// =============================================================================
// RE-EXPORTS: Graph Engine
// =============================================================================

pub use cancel::CancelToken;
pub use engine::{Engine, EngineConfig, UpsertOutcome};
pub use graph::{Direction, Graph, GraphStats, SerializableGraph};
pub use index::AttributeIndex;
pub use inference::{InferenceOutcome, InferenceStatus, InferenceStrategy};
pub use query::{Query, QueryOutcome, QueryType};
pub use storage::{GraphMirror, RedbStore, WriteSet};
pub use traversal::{Step, Traversal};
pub use validation::Validator;
pub use views::{EdgeView, GraphSnapshot, Neighborhood, NodeView, Relation};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{PersistenceHeader, graph_from_bytes, graph_to_bytes};
