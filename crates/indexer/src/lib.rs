//! Ledger event ingestion and trust-graph maintenance for CreditNet.
//!
//! This crate provides:
//! - SQLite storage for trust-graph edges, per-account history, and the
//!   account directory
//! - The ingestion pipeline consuming the ledger transaction feed
//! - The flow service answering bounded-hop capacity queries
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────┐
//! │  creditnet-indexer (this)         │
//! │                                   │
//! │  ┌──────────────┐                 │
//! │  │ EventSource  │ ← ledger feed   │
//! │  │ (subscription)│  transactions  │
//! │  └──────┬───────┘                 │
//! │         │ raw JSON                │
//! │  ┌──────▼───────┐                 │
//! │  │  Pipeline    │ classify,       │
//! │  │ (tokio tasks)│ per-pair locks  │
//! │  └──────┬───────┘                 │
//! │         │                         │
//! │  ┌──────▼───────┐                 │
//! │  │   Storage    │ ← SQLite        │
//! │  │ edges+history│   dual write    │
//! │  └──────┬───────┘                 │
//! │         │                         │
//! │  ┌──────▼───────┐                 │
//! │  │ FlowService  │ bounded-hop     │
//! │  │              │ max flow        │
//! │  └──────────────┘                 │
//! └───────────────────────────────────┘
//!          │ shared DB
//! ┌────────▼──────────────────────────┐
//! │  creditnet-api (separate, axum)   │
//! │  • GET /v1/capacity               │
//! │  • GET /v1/history/{address}      │
//! └───────────────────────────────────┘
//! ```
//!
//! The indexer writes; the API service only reads. The ledger feed's
//! connection lifecycle (reconnects, heartbeats) is the transport's problem:
//! the pipeline consumes whatever an [`listener::EventSource`] yields.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod directory;
pub mod flow;
pub mod listener;
pub mod pipeline;
pub mod storage;

pub use creditnet_core::{classifier::*, constants, error::CoreError, types::*};
