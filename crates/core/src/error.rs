//! Error taxonomy shared by the ingestion pipeline and query services.

use thiserror::Error;

/// Core error type.
///
/// The first three variants map onto the failure classes the pipeline
/// distinguishes when logging: malformed input (discarded), a store that
/// could not be reached, and the one dual-write inconsistency the system
/// cannot rule out without a cross-store transaction.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Event failed classification (missing fields, wrong currency,
    /// unparsable amount). Discarded, never surfaced as a failure.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// A graph or history store call failed or timed out. No partial state
    /// is committed for a failed graph mutation.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The graph mutation succeeded but the history append failed.
    ///
    /// Logged distinctly from [`CoreError::StoreUnavailable`] so it can be
    /// reconciled out-of-band; the graph mutation is not rolled back.
    #[error("inconsistent state: graph mutated but history append failed for txn {txn_hash}: {detail}")]
    InconsistentState {
        /// Hash of the ledger transaction whose history write was lost.
        txn_hash: String,
        /// Underlying store failure.
        detail: String,
    },

    /// Capacity between an address and itself is not defined; callers must
    /// special-case it instead of querying.
    #[error("capacity between an address and itself is not defined")]
    SelfCapacity,

    /// Hop bound outside the accepted range.
    #[error("invalid hop bound: {0} (must be between 1 and {max})", max = crate::constants::MAX_HOPS_LIMIT)]
    InvalidHopBound(u32),

    /// Currency code of the wrong shape for this ledger network.
    #[error("invalid currency code: {0:?} (must be {len} characters)", len = crate::constants::CURRENCY_CODE_LEN)]
    InvalidCurrency(String),
}

/// Result type alias for CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;
