//! # Core Type Definitions
//!
//! This module contains all core types for the txgraph property graph:
//! - Node identity (`NodeKind`, `NodeKey`)
//! - Node variants (`User`, `Transaction`, `Node`) and their write patches
//! - Money (`Amount`, integer minor units)
//! - Edges (`EdgeKind`, `Edge`) and matchable attributes (`Attribute`)
//! - Stored records (`NodeRecord`, `EdgeRecord`)
//! - Error types (`GraphError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point, amounts are cents)
//! - Implement `Ord` where they key a `BTreeMap`/`BTreeSet`

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// NODE IDENTITY
// =============================================================================

/// The two node variants of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    User,
    Transaction,
}

impl NodeKind {
    /// Lowercase name used in messages and views.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Transaction => "transaction",
        }
    }

    /// The inferred edge kind produced between two nodes of this kind.
    #[must_use]
    pub const fn inferred_edge(self) -> EdgeKind {
        match self {
            Self::User => EdgeKind::SharedAttribute,
            Self::Transaction => EdgeKind::Linked,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique key of a node in the store.
///
/// Ids are unique across both variants, so the bare id string alone
/// identifies a node. `Display` prints the bare id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKey {
    User(String),
    Transaction(String),
}

impl NodeKey {
    /// Key for a user id.
    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    /// Key for a transaction id.
    #[must_use]
    pub fn transaction(id: impl Into<String>) -> Self {
        Self::Transaction(id.into())
    }

    /// Build a key from a kind and id.
    #[must_use]
    pub fn new(kind: NodeKind, id: impl Into<String>) -> Self {
        match kind {
            NodeKind::User => Self::User(id.into()),
            NodeKind::Transaction => Self::Transaction(id.into()),
        }
    }

    /// The bare id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::User(id) | Self::Transaction(id) => id,
        }
    }

    /// The node variant this key refers to.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::User(_) => NodeKind::User,
            Self::Transaction(_) => NodeKind::Transaction,
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// =============================================================================
// AMOUNT
// =============================================================================

/// A non-negative monetary amount in minor units (cents).
///
/// Parsed from decimal text with at most two fractional digits.
/// Displayed with exactly two decimals.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// Create an amount from minor units.
    #[must_use]
    pub const fn from_minor(cents: u64) -> Self {
        Self(cents)
    }

    /// The raw minor-unit value.
    #[must_use]
    pub const fn minor_units(self) -> u64 {
        self.0
    }

    /// Parse decimal text such as `"12"`, `"12.5"` or `"0.07"`.
    ///
    /// Rejects negative values, exponent notation, non-digit characters
    /// and more than two significant fractional digits.
    pub fn parse(text: &str) -> Result<Self, GraphError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(GraphError::Validation("amount is empty".to_string()));
        }
        if trimmed.starts_with('-') {
            return Err(GraphError::Validation(format!(
                "amount must be non-negative, got {}",
                trimmed
            )));
        }
        let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);

        let (whole, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !is_digits(whole) || !is_digits(frac) {
            return Err(GraphError::Validation(format!(
                "amount is not a decimal number: {}",
                trimmed
            )));
        }

        let frac = frac.trim_end_matches('0');
        if frac.len() > 2 {
            return Err(GraphError::Validation(format!(
                "amount has more than two decimal places: {}",
                trimmed
            )));
        }

        let overflow = || GraphError::Validation(format!("amount is too large: {}", trimmed));
        let whole_value: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let frac_value: u64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u64>().map_err(|_| overflow())?.saturating_mul(10),
            _ => frac.parse().map_err(|_| overflow())?,
        };

        whole_value
            .checked_mul(100)
            .and_then(|cents| cents.checked_add(frac_value))
            .map(Self)
            .ok_or_else(overflow)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// NODE VARIANTS
// =============================================================================

/// A user of the payment system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub payment_method: Option<String>,
}

/// A transfer between two users.
///
/// `sender_id` and `receiver_id` are fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub txn_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub amount: Amount,
    pub device_id: Option<String>,
    pub ip_address: Option<String>,
}

/// An identifying attribute that inference matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Email,
    Phone,
    Address,
    PaymentMethod,
    DeviceId,
    IpAddress,
}

impl Attribute {
    /// Field name of the attribute.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Address => "address",
            Self::PaymentMethod => "payment_method",
            Self::DeviceId => "device_id",
            Self::IpAddress => "ip_address",
        }
    }
}

/// A node of the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    User(User),
    Transaction(Transaction),
}

impl Node {
    /// The unique key of this node.
    #[must_use]
    pub fn key(&self) -> NodeKey {
        match self {
            Self::User(u) => NodeKey::User(u.user_id.clone()),
            Self::Transaction(t) => NodeKey::Transaction(t.txn_id.clone()),
        }
    }

    /// The bare id of this node.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::User(u) => &u.user_id,
            Self::Transaction(t) => &t.txn_id,
        }
    }

    /// The variant of this node.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::User(_) => NodeKind::User,
            Self::Transaction(_) => NodeKind::Transaction,
        }
    }

    /// Display label: the user's name, or the transaction id.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::User(u) => &u.name,
            Self::Transaction(t) => &t.txn_id,
        }
    }

    /// Attributes eligible for matching: present and non-empty only.
    #[must_use]
    pub fn match_attributes(&self) -> Vec<(Attribute, &str)> {
        let fields: Vec<(Attribute, Option<&String>)> = match self {
            Self::User(u) => vec![
                (Attribute::Email, u.email.as_ref()),
                (Attribute::Phone, u.phone.as_ref()),
                (Attribute::Address, u.address.as_ref()),
                (Attribute::PaymentMethod, u.payment_method.as_ref()),
            ],
            Self::Transaction(t) => vec![
                (Attribute::DeviceId, t.device_id.as_ref()),
                (Attribute::IpAddress, t.ip_address.as_ref()),
            ],
        };
        fields
            .into_iter()
            .filter_map(|(attr, value)| {
                value
                    .map(String::as_str)
                    .filter(|v| !v.is_empty())
                    .map(|v| (attr, v))
            })
            .collect()
    }

    /// True if both nodes are the same variant and agree on at least one
    /// present, non-empty attribute. Never true for a node and itself.
    #[must_use]
    pub fn shares_attribute_with(&self, other: &Self) -> bool {
        if self.kind() != other.kind() || self.id() == other.id() {
            return false;
        }
        let theirs = other.match_attributes();
        self.match_attributes()
            .iter()
            .any(|mine| theirs.contains(mine))
    }

    /// All stored fields as `(name, value)` pairs, absent optionals omitted.
    #[must_use]
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        let mut push = |name: &'static str, value: Option<&String>| {
            if let Some(v) = value {
                out.push((name, v.clone()));
            }
        };
        match self {
            Self::User(u) => {
                push("user_id", Some(&u.user_id));
                push("name", Some(&u.name));
                push("email", u.email.as_ref());
                push("phone", u.phone.as_ref());
                push("address", u.address.as_ref());
                push("payment_method", u.payment_method.as_ref());
            }
            Self::Transaction(t) => {
                push("txn_id", Some(&t.txn_id));
                push("sender_id", Some(&t.sender_id));
                push("receiver_id", Some(&t.receiver_id));
                push("amount", Some(&t.amount.to_string()));
                push("device_id", t.device_id.as_ref());
                push("ip_address", t.ip_address.as_ref());
            }
        }
        out
    }
}

// =============================================================================
// WRITE PATCHES
// =============================================================================

/// Upsert input for a user (merge-patch).
///
/// `None` fields are left unchanged on update and absent on insert.
/// `name` is required when the user does not exist yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub payment_method: Option<String>,
}

impl UserPatch {
    /// Patch for the given user id with no fields set.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    #[must_use]
    pub fn payment_method(mut self, method: impl Into<String>) -> Self {
        self.payment_method = Some(method.into());
        self
    }
}

/// Upsert input for a transaction (merge-patch).
///
/// `sender_id` and `receiver_id` are always required and must match the
/// stored values on update. `amount` is required on insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPatch {
    pub txn_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub amount: Option<Amount>,
    pub device_id: Option<String>,
    pub ip_address: Option<String>,
}

impl TransactionPatch {
    /// Patch for a transaction between two users with no optional fields set.
    #[must_use]
    pub fn new(
        txn_id: impl Into<String>,
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
    ) -> Self {
        Self {
            txn_id: txn_id.into(),
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn device_id(mut self, device: impl Into<String>) -> Self {
        self.device_id = Some(device.into());
        self
    }

    #[must_use]
    pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }
}

// =============================================================================
// EDGES
// =============================================================================

/// Relationship type of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// User → Transaction.
    Sent,
    /// Transaction → User.
    ReceivedBy,
    /// User → User, inferred.
    SharedAttribute,
    /// Transaction → Transaction, inferred.
    Linked,
}

impl EdgeKind {
    /// All kinds in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Sent,
        Self::ReceivedBy,
        Self::SharedAttribute,
        Self::Linked,
    ];

    /// Relationship type name as exposed to callers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "SENT",
            Self::ReceivedBy => "RECEIVED_BY",
            Self::SharedAttribute => "SHARED_ATTRIBUTE",
            Self::Linked => "LINKED",
        }
    }

    /// Inferred kinds are symmetric in meaning: one edge per unordered pair.
    #[must_use]
    pub const fn is_inferred(self) -> bool {
        matches!(self, Self::SharedAttribute | Self::Linked)
    }

    /// Kinds of the (source, target) nodes this edge kind connects.
    #[must_use]
    pub const fn endpoint_kinds(self) -> (NodeKind, NodeKind) {
        match self {
            Self::Sent => (NodeKind::User, NodeKind::Transaction),
            Self::ReceivedBy => (NodeKind::Transaction, NodeKind::User),
            Self::SharedAttribute => (NodeKind::User, NodeKind::User),
            Self::Linked => (NodeKind::Transaction, NodeKind::Transaction),
        }
    }

    /// Compact storage code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Sent => 0,
            Self::ReceivedBy => 1,
            Self::SharedAttribute => 2,
            Self::Linked => 3,
        }
    }

    /// Inverse of [`EdgeKind::code`].
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Sent),
            1 => Some(Self::ReceivedBy),
            2 => Some(Self::SharedAttribute),
            3 => Some(Self::Linked),
            _ => None,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeKey,
    pub target: NodeKey,
    pub kind: EdgeKind,
}

impl Edge {
    /// Create a new edge.
    #[must_use]
    pub fn new(source: NodeKey, target: NodeKey, kind: EdgeKind) -> Self {
        Self {
            source,
            target,
            kind,
        }
    }

    /// Stable composite id of `(kind, source, target)`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}:{}->{}", self.kind.as_str(), self.source, self.target)
    }

    /// The same edge with source and target swapped.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self::new(self.target.clone(), self.source.clone(), self.kind)
    }
}

// =============================================================================
// STORED RECORDS
// =============================================================================

/// A node together with its insertion sequence and write revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Insertion order among all nodes.
    pub seq: u64,
    /// Monotonic write counter, bumped on every upsert.
    pub revision: u64,
    pub node: Node,
}

/// An edge together with its creation sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub seq: u64,
    pub edge: Edge,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors returned by the graph engine.
///
/// - No silent failures
/// - Every fallible operation returns `Result<T, GraphError>`
/// - The engine never panics
#[derive(Debug, Error)]
pub enum GraphError {
    /// A required field is missing or a value is malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A transaction references a user that does not exist.
    #[error("Referenced {} not found: {}", .0.kind(), .0)]
    ReferenceNotFound(NodeKey),

    /// A read targeted an unknown id.
    #[error("Node not found: {0}")]
    NotFound(String),

    /// No path connects the two ids (or one of them does not exist).
    #[error("No path found from {from} to {to}")]
    NoPathFound { from: String, to: String },

    /// The operation was cancelled or its deadline passed.
    #[error("Operation cancelled")]
    Cancelled,

    /// The persistent backend failed or the engine is shut down.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Encoding or decoding of stored data failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GraphError {
    /// Stable machine-readable name of the error variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::ReferenceNotFound(_) => "reference_not_found",
            Self::NotFound(_) => "not_found",
            Self::NoPathFound { .. } => "no_path_found",
            Self::Cancelled => "cancelled",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::Serialization(_) => "serialization_error",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
