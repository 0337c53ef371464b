//! # Sample Data
//!
//! Two datasets feed `txgraph seed`:
//!
//! - [`Dataset::sample`]: five users and five transactions with one address
//!   match (`user1`/`user4`) and one device match (`txn1`/`txn4`).
//! - [`Dataset::synthetic`]: a deterministic generated set. Payment
//!   methods, devices and IPs come from small pools assigned round-robin,
//!   so inferred edges appear at scale.
//!
//! Seeding is an ordinary sequence of upserts and is safe to repeat.

use serde::Serialize;
use txgraph_core::{
    Amount, Engine, GraphError, InferenceStatus, TransactionPatch, UserPatch,
};

pub const PAYMENT_METHODS: [&str; 4] = ["visa", "paypal", "bank", "mastercard"];
pub const DEVICES: [&str; 5] = ["d1", "d2", "d3", "d4", "d5"];
pub const IP_ADDRESSES: [&str; 5] = [
    "192.168.0.10",
    "192.168.0.20",
    "10.0.0.1",
    "10.0.0.2",
    "172.16.0.5",
];

/// Smallest and largest synthetic amounts, in cents.
const MIN_AMOUNT_MINOR: u64 = 5_00;
const MAX_AMOUNT_MINOR: u64 = 5_000_00;

/// Users and transactions to upsert, in order.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub users: Vec<UserPatch>,
    pub transactions: Vec<TransactionPatch>,
}

impl Dataset {
    /// The fixed five-user scenario.
    #[must_use]
    pub fn sample() -> Self {
        let user = |id: &str, name: &str, email: &str, phone: &str, address: &str, pay: &str| {
            UserPatch::new(id)
                .name(name)
                .email(email)
                .phone(phone)
                .address(address)
                .payment_method(pay)
        };
        let txn = |id: &str, from: &str, to: &str, cents: u64, device: &str, ip: &str| {
            TransactionPatch::new(id, from, to)
                .amount(Amount::from_minor(cents))
                .device_id(device)
                .ip_address(ip)
        };

        Self {
            users: vec![
                user("user1", "Alice Johnson", "alice@example.com", "555-0101", "123 Main St", "visa"),
                user("user2", "Bob Smith", "bob@example.com", "555-0102", "456 Oak Ave", "paypal"),
                user("user3", "Carol White", "carol@example.com", "555-0103", "789 Pine Rd", "bank"),
                user("user4", "Dan Brown", "dan@example.com", "555-0104", "123 Main St", "mastercard"),
                user("user5", "Eve Davis", "eve@example.com", "555-0105", "321 Elm Blvd", "amex"),
            ],
            transactions: vec![
                txn("txn1", "user1", "user2", 150_00, "device1", "192.168.1.1"),
                txn("txn2", "user2", "user3", 75_50, "device2", "192.168.1.2"),
                txn("txn3", "user3", "user5", 20_00, "device3", "192.168.1.3"),
                txn("txn4", "user4", "user5", 300_00, "device1", "192.168.1.4"),
                txn("txn5", "user5", "user1", 45_25, "device5", "192.168.1.5"),
            ],
        }
    }

    /// `users` generated users and `transactions` transactions between them.
    pub fn synthetic(users: usize, transactions: usize) -> Result<Self, GraphError> {
        if transactions > 0 && users < 2 {
            return Err(GraphError::Validation(
                "transactions need at least two users".to_string(),
            ));
        }

        let ids: Vec<String> = (0..users).map(|i| format!("u{:05}", i)).collect();
        let user_patches = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                UserPatch::new(id.as_str())
                    .name(format!("User {}", i))
                    .email(format!("{}@example.com", id))
                    .phone(format!("555-{:05}", i))
                    .address(format!("{} Market St", i + 1))
                    .payment_method(PAYMENT_METHODS[i % PAYMENT_METHODS.len()])
            })
            .collect();

        let span = MAX_AMOUNT_MINOR - MIN_AMOUNT_MINOR + 1;
        let txn_patches = (0..transactions)
            .map(|j| {
                let sender = j % users;
                // Offset in 1..users never lands back on the sender.
                let receiver = (sender + 1 + (j / users) % (users - 1)) % users;
                let cents = MIN_AMOUNT_MINOR + (j as u64).wrapping_mul(7_919) % span;
                TransactionPatch::new(
                    format!("t{:06}", j),
                    ids[sender].as_str(),
                    ids[receiver].as_str(),
                )
                .amount(Amount::from_minor(cents))
                .device_id(DEVICES[j % DEVICES.len()])
                .ip_address(IP_ADDRESSES[(j / DEVICES.len()) % IP_ADDRESSES.len()])
            })
            .collect();

        Ok(Self {
            users: user_patches,
            transactions: txn_patches,
        })
    }
}

/// Counters from one seeding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub users: usize,
    pub transactions: usize,
    pub created: usize,
    pub inferred_edges: usize,
    /// Writes whose inference pass was cancelled.
    pub cancelled: usize,
}

/// Upsert every user, then every transaction.
pub fn seed(engine: &Engine, dataset: Dataset) -> Result<SeedReport, GraphError> {
    let mut report = SeedReport::default();
    for patch in dataset.users {
        let outcome = engine.upsert_user(patch)?;
        report.users += 1;
        report.record(outcome.created, outcome.inference.status, outcome.inference.edges.len());
    }
    for patch in dataset.transactions {
        let outcome = engine.upsert_transaction(patch)?;
        report.transactions += 1;
        report.record(outcome.created, outcome.inference.status, outcome.inference.edges.len());
    }
    tracing::info!(
        users = report.users,
        transactions = report.transactions,
        inferred = report.inferred_edges,
        "Seeding complete"
    );
    Ok(report)
}

impl SeedReport {
    fn record(&mut self, created: bool, status: InferenceStatus, inferred: usize) {
        if created {
            self.created += 1;
        }
        if status == InferenceStatus::Cancelled {
            self.cancelled += 1;
        }
        self.inferred_edges += inferred;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txgraph_core::EdgeKind;

    #[test]
    fn sample_yields_one_match_of_each_kind() {
        let engine = Engine::new();
        let report = seed(&engine, Dataset::sample()).expect("seed");
        assert_eq!(report.created, 10);
        assert_eq!(report.inferred_edges, 2);

        let stats = engine.stats();
        assert_eq!(stats.shared_attribute, 1);
        assert_eq!(stats.linked, 1);

        let again = seed(&engine, Dataset::sample()).expect("reseed");
        assert_eq!(again.created, 0);
        assert_eq!(again.inferred_edges, 0);
        assert_eq!(engine.stats().edges, stats.edges);
    }

    #[test]
    fn synthetic_is_deterministic_and_valid() {
        let a = Dataset::synthetic(10, 40).expect("dataset");
        let b = Dataset::synthetic(10, 40).expect("dataset");
        assert_eq!(a.transactions, b.transactions);

        for txn in &a.transactions {
            assert_ne!(txn.sender_id, txn.receiver_id);
            let cents = txn.amount.expect("amount").minor_units();
            assert!((MIN_AMOUNT_MINOR..=MAX_AMOUNT_MINOR).contains(&cents));
        }

        let engine = Engine::new();
        seed(&engine, a).expect("seed");
        let stats = engine.stats();
        assert_eq!(stats.users, 10);
        assert_eq!(stats.transactions, 40);
        assert_eq!(stats.sent, 40);
        assert!(stats.linked > 0);
        assert!(engine
            .snapshot()
            .edges
            .iter()
            .any(|e| e.kind == EdgeKind::SharedAttribute));
    }

    #[test]
    fn synthetic_needs_two_users_for_transactions() {
        assert!(Dataset::synthetic(1, 5).is_err());
        assert!(Dataset::synthetic(1, 0).is_ok());
    }
}
