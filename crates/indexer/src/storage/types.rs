//! Database row types for the indexer storage layer.

use creditnet_core::types::{Address, TransactionRecord};
use serde::{Deserialize, Serialize};

/// Which side of a mutation a history row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryDirection {
    /// Row on the TrustSet initiator's list.
    Outgoing,
    /// Row on the counterparty's list.
    Incoming,
}

impl HistoryDirection {
    /// Database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryDirection::Outgoing => "outgoing",
            HistoryDirection::Incoming => "incoming",
        }
    }
}

impl std::str::FromStr for HistoryDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outgoing" => Ok(HistoryDirection::Outgoing),
            "incoming" => Ok(HistoryDirection::Incoming),
            _ => Err(format!("Unknown history direction: {}", s)),
        }
    }
}

/// One history append, addressed to a specific account's list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// The account whose list this entry lands on.
    pub account: Address,
    /// Which of the account's lists.
    pub direction: HistoryDirection,
    /// The record itself.
    pub record: TransactionRecord,
}

/// A directory account row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Ledger address.
    pub address: Address,
    /// Human-facing display name.
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_str_conversion_roundtrips() {
        assert_eq!(HistoryDirection::Outgoing.as_str(), "outgoing");
        assert_eq!(HistoryDirection::Incoming.as_str(), "incoming");
        assert_eq!(
            "outgoing".parse::<HistoryDirection>().unwrap(),
            HistoryDirection::Outgoing
        );
        assert_eq!(
            "incoming".parse::<HistoryDirection>().unwrap(),
            HistoryDirection::Incoming
        );
        assert!("sideways".parse::<HistoryDirection>().is_err());
    }
}
