//! Domain types for the CreditNet trust graph.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque account address on the ledger network.
///
/// No internal structure is assumed beyond equality; the newtype exists so
/// source/target parameters cannot be swapped silently.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Create an address from its string form.
    pub fn new(s: impl Into<String>) -> Self {
        Address(s.into())
    }

    /// The address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered `(source, target)` account pair.
///
/// Keys the per-pair serialization lock in the pipeline and the capacity map
/// in the flow engine. Direction matters: `(a, b)` and `(b, a)` are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    /// Edge source (the TrustSet initiator).
    pub source: Address,
    /// Edge target (the credit counterparty).
    pub target: Address,
}

impl PairKey {
    /// Build a pair key.
    pub fn new(source: Address, target: Address) -> Self {
        Self { source, target }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source, self.target)
    }
}

/// A directed credit-limit edge in the trust graph.
///
/// Convention (applied uniformly): the edge `source -> target` carries the
/// limit the TrustSet initiator (`source`) granted toward the counterparty
/// (`target`), and capacity flows along the edge direction. An edge with
/// `amount == 0` is logically absent and is deleted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustEdge {
    /// Account that issued the TrustSet.
    pub source: Address,
    /// Counterparty the limit applies to.
    pub target: Address,
    /// Current credit limit. Always >= 0.
    pub amount: Decimal,
    /// Limit immediately before the most recent mutation.
    pub prev_amount: Decimal,
}

impl TrustEdge {
    /// The pair identifying this edge.
    pub fn pair(&self) -> PairKey {
        PairKey::new(self.source.clone(), self.target.clone())
    }
}

/// Result of one `upsert_edge` call.
///
/// Both values come from the same store transaction, so the delta below is
/// race-free under the pipeline's per-pair lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeMutation {
    /// Edge amount before the mutation (0 if the edge was absent).
    pub prev_amount: Decimal,
    /// Edge amount after the mutation (0 means the edge was deleted).
    pub new_amount: Decimal,
}

impl EdgeMutation {
    /// The signed delta applied to both parties' history records.
    pub fn limit_change(&self) -> Decimal {
        self.new_amount - self.prev_amount
    }
}

/// Ledger coordinates of the transaction that caused a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnMeta {
    /// Index of the ledger the transaction settled in.
    pub ledger_index: u64,
    /// Hash of that ledger.
    pub ledger_hash: String,
    /// Transaction hash.
    pub txn_hash: String,
    /// Settlement time, Unix seconds.
    pub txn_date: i64,
    /// Decoded memo text, if the transaction carried one.
    pub memo: Option<String>,
}

/// One append-only, human-facing history entry.
///
/// Written to the initiator's outgoing list and the counterparty's incoming
/// list in the same logical operation as the edge mutation it documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Display name of the other party (falls back to the raw address).
    pub counterparty_username: String,
    /// Memo text attached to the transaction, if any.
    pub message: Option<String>,
    /// `new_amount - prev_amount` for the mutation this entry documents.
    pub limit_change: Decimal,
    /// Ledger index of the settling ledger.
    pub ledger_index: u64,
    /// Hash of the settling ledger.
    pub ledger_hash: String,
    /// Transaction hash (dedup key for redelivered events).
    pub txn_hash: String,
    /// Settlement time, Unix seconds.
    pub txn_date: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn pair_key_is_directional() {
        let ab = PairKey::new(Address::from("rA"), Address::from("rB"));
        let ba = PairKey::new(Address::from("rB"), Address::from("rA"));
        assert_ne!(ab, ba);
        assert_eq!(ab.to_string(), "rA->rB");
    }

    #[test]
    fn limit_change_is_signed() {
        let up = EdgeMutation {
            prev_amount: dec!(10),
            new_amount: dec!(25),
        };
        assert_eq!(up.limit_change(), dec!(15));

        let down = EdgeMutation {
            prev_amount: dec!(40),
            new_amount: dec!(0),
        };
        assert_eq!(down.limit_change(), dec!(-40));
    }

    #[test]
    fn address_serializes_transparently() {
        let addr = Address::from("rGWoaEBB7V3EeDcnqc6ocGcn1N9cbtqRTf");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"rGWoaEBB7V3EeDcnqc6ocGcn1N9cbtqRTf\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
