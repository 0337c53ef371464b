//! # Validation Module
//!
//! Input validation for write patches and loaded nodes.
//!
//! - Runs before any lock is taken
//! - Rejects malformed input with `GraphError::Validation`
//! - Never touches the store; cross-node checks (references, id
//!   collisions, immutability) belong to the `Graph`

use crate::primitives::{MAX_ATTRIBUTE_LENGTH, MAX_ID_LENGTH};
use crate::types::{GraphError, Node, TransactionPatch, UserPatch};

/// Stateless validator for user and transaction patches.
pub struct Validator;

impl Validator {
    /// Validate a user patch.
    ///
    /// A patch is valid if:
    /// - `user_id` is a valid id
    /// - `name`, when provided, is non-empty
    /// - every provided attribute is within length limits
    pub fn user(patch: &UserPatch) -> Result<(), GraphError> {
        Self::id("user_id", &patch.user_id)?;
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(GraphError::Validation("name must not be empty".to_string()));
            }
            Self::attribute("name", name)?;
        }
        Self::optional("email", patch.email.as_deref())?;
        Self::optional("phone", patch.phone.as_deref())?;
        Self::optional("address", patch.address.as_deref())?;
        Self::optional("payment_method", patch.payment_method.as_deref())?;
        Ok(())
    }

    /// Validate a transaction patch.
    ///
    /// `txn_id`, `sender_id` and `receiver_id` must all be valid ids.
    /// The amount is already typed, so only its presence is checked later.
    pub fn transaction(patch: &TransactionPatch) -> Result<(), GraphError> {
        Self::id("txn_id", &patch.txn_id)?;
        Self::id("sender_id", &patch.sender_id)?;
        Self::id("receiver_id", &patch.receiver_id)?;
        Self::optional("device_id", patch.device_id.as_deref())?;
        Self::optional("ip_address", patch.ip_address.as_deref())?;
        Ok(())
    }

    /// Validate a complete node, as read from a snapshot or a database.
    ///
    /// Same rules as the patches, plus a user must carry a name.
    pub fn node(node: &Node) -> Result<(), GraphError> {
        match node {
            Node::User(user) => {
                let mut patch = UserPatch::new(user.user_id.as_str()).name(user.name.as_str());
                patch.email.clone_from(&user.email);
                patch.phone.clone_from(&user.phone);
                patch.address.clone_from(&user.address);
                patch.payment_method.clone_from(&user.payment_method);
                Self::user(&patch)
            }
            Node::Transaction(txn) => {
                let mut patch = TransactionPatch::new(
                    txn.txn_id.as_str(),
                    txn.sender_id.as_str(),
                    txn.receiver_id.as_str(),
                );
                patch.device_id.clone_from(&txn.device_id);
                patch.ip_address.clone_from(&txn.ip_address);
                Self::transaction(&patch)
            }
        }
    }

    fn id(field: &str, value: &str) -> Result<(), GraphError> {
        if value.trim().is_empty() {
            return Err(GraphError::Validation(format!("{} is required", field)));
        }
        if value.len() > MAX_ID_LENGTH {
            return Err(GraphError::Validation(format!(
                "{} exceeds {} bytes",
                field, MAX_ID_LENGTH
            )));
        }
        Ok(())
    }

    fn attribute(field: &str, value: &str) -> Result<(), GraphError> {
        if value.len() > MAX_ATTRIBUTE_LENGTH {
            return Err(GraphError::Validation(format!(
                "{} exceeds {} bytes",
                field, MAX_ATTRIBUTE_LENGTH
            )));
        }
        Ok(())
    }

    fn optional(field: &str, value: Option<&str>) -> Result<(), GraphError> {
        value.map_or(Ok(()), |v| Self::attribute(field, v))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_minimal_user() {
        assert!(Validator::user(&UserPatch::new("u1").name("Alice")).is_ok());
        // name may be omitted on the patch; presence on insert is checked by the graph
        assert!(Validator::user(&UserPatch::new("u1")).is_ok());
    }

    #[test]
    fn rejects_empty_or_blank_user_id() {
        assert!(Validator::user(&UserPatch::new("").name("A")).is_err());
        assert!(Validator::user(&UserPatch::new("   ").name("A")).is_err());
    }

    #[test]
    fn rejects_empty_name() {
        let err = Validator::user(&UserPatch::new("u1").name("")).expect_err("empty name");
        assert!(matches!(err, GraphError::Validation(_)));
    }

    #[test]
    fn rejects_oversized_values() {
        let long_id = "x".repeat(MAX_ID_LENGTH + 1);
        assert!(Validator::user(&UserPatch::new(long_id).name("A")).is_err());

        let long_attr = "y".repeat(MAX_ATTRIBUTE_LENGTH + 1);
        assert!(Validator::user(&UserPatch::new("u1").name("A").email(long_attr)).is_err());
    }

    #[test]
    fn empty_attribute_is_allowed() {
        assert!(Validator::user(&UserPatch::new("u1").name("A").phone("")).is_ok());
    }

    #[test]
    fn stored_nodes_follow_patch_rules() {
        use crate::types::{Amount, Transaction, User};

        let user = User {
            user_id: "u1".to_string(),
            name: "Alice".to_string(),
            email: None,
            phone: None,
            address: Some("z".repeat(MAX_ATTRIBUTE_LENGTH + 1)),
            payment_method: None,
        };
        assert!(Validator::node(&Node::User(user.clone())).is_err());

        let nameless = User {
            name: " ".to_string(),
            address: None,
            ..user
        };
        assert!(Validator::node(&Node::User(nameless)).is_err());

        let txn = Transaction {
            txn_id: "t1".to_string(),
            sender_id: "u1".to_string(),
            receiver_id: String::new(),
            amount: Amount::from_minor(100),
            device_id: None,
            ip_address: None,
        };
        assert!(Validator::node(&Node::Transaction(txn.clone())).is_err());
        let txn = Transaction {
            receiver_id: "u2".to_string(),
            ..txn
        };
        assert!(Validator::node(&Node::Transaction(txn)).is_ok());
    }

    #[test]
    fn transaction_requires_all_ids() {
        assert!(Validator::transaction(&TransactionPatch::new("t1", "u1", "u2")).is_ok());
        assert!(Validator::transaction(&TransactionPatch::new("", "u1", "u2")).is_err());
        assert!(Validator::transaction(&TransactionPatch::new("t1", "", "u2")).is_err());
        assert!(Validator::transaction(&TransactionPatch::new("t1", "u1", " ")).is_err());
    }
}
