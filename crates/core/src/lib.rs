//! Core types and pure logic for CreditNet.
//!
//! This crate holds everything the stateful services agree on:
//! - Domain types (`Address`, `TrustEdge`, `TransactionRecord`, ...)
//! - The ledger event classifier (pure, no side effects)
//! - The error taxonomy shared across the pipeline and query services

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classifier;
pub mod constants;
pub mod error;
pub mod types;

pub use classifier::{classify, EventKind, IgnoreReason};
pub use error::CoreError;
pub use types::{Address, EdgeMutation, PairKey, TransactionRecord, TrustEdge, TxnMeta};
