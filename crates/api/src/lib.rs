//! Axum-based API server for CreditNet.
//!
//! This crate provides:
//! - `/health` - Liveness probe
//! - `/v1/capacity?source=...&target=...&max_hops=...` - Bounded-hop credit capacity
//! - `/v1/history/:address` - Per-account trust-line history, newest first
//! - `/v1/accounts` - Registered accounts in the directory

#![warn(missing_docs)]

/// API server runtime and in-process app builder.
pub mod server;
