//! Protocol and policy constants for CreditNet.

/// Result code a ledger transaction must carry to be eligible for processing.
pub const SUCCESS_RESULT_CODE: &str = "tesSUCCESS";

/// Transaction type string for trust-line mutations.
pub const TXN_TYPE_TRUST_SET: &str = "TrustSet";

/// Transaction type string for payments.
pub const TXN_TYPE_PAYMENT: &str = "Payment";

/// Required length of a currency code on the ledger network.
pub const CURRENCY_CODE_LEN: usize = 3;

/// Default hop bound for capacity queries.
pub const DEFAULT_MAX_HOPS: u32 = 3;

/// Hard upper hop bound accepted by capacity queries.
///
/// Path enumeration is exponential in the hop count; admissibility checks
/// rarely need more than 3 hops.
pub const MAX_HOPS_LIMIT: u32 = 6;

/// Offset between the ledger network's epoch and the Unix epoch, in seconds.
///
/// Ledger transaction dates count seconds since 2000-01-01T00:00:00Z.
pub const LEDGER_EPOCH_OFFSET: i64 = 946_684_800;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_epoch_is_y2k() {
        // 2000-01-01T00:00:00Z in Unix seconds.
        assert_eq!(LEDGER_EPOCH_OFFSET, 946_684_800);
    }

    #[test]
    fn default_hops_within_limit() {
        assert!(DEFAULT_MAX_HOPS <= MAX_HOPS_LIMIT);
        assert!(DEFAULT_MAX_HOPS >= 1);
    }
}
