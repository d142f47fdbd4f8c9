//! The ingestion pipeline: feed message -> classification -> dual write.
//!
//! Each delivered message runs as one logical task through a small state
//! machine: classify, and for an accepted TrustSet mutate the graph store
//! then append both parties' history records. Tasks for different ordered
//! account pairs run concurrently; tasks touching the same ordered pair
//! serialize on a per-pair lock held from before the graph mutation until
//! the history append has completed or failed, so `prev_amount`,
//! `new_amount`, and the recorded delta always come from one
//! non-interleaved view.
//!
//! A single event's failure never stops the ingestion loop.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use creditnet_core::classifier::{classify, EventKind, RawLedgerMessage, TrustSetEvent};
use creditnet_core::error::CoreError;
use creditnet_core::types::{Address, EdgeMutation, PairKey, TransactionRecord};

use crate::directory::AccountDirectory;
use crate::listener::EventSource;
use crate::storage::{HistoryDirection, HistoryEntry, Storage};

/// Terminal state of one processed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Discarded by classification; no side effects.
    Ignored,
    /// In-currency payment; bookkeeping only, no graph mutation.
    PaymentAccepted,
    /// Graph mutated and both history records written.
    Committed(EdgeMutation),
    /// Graph mutation failed; nothing was written.
    Failed,
    /// Graph mutated but the history append failed; requires out-of-band
    /// reconciliation. The graph mutation is not rolled back.
    PartiallyCommitted(EdgeMutation),
}

/// Counters over terminal states, for the status command and logs.
#[derive(Debug, Default)]
pub struct PipelineStats {
    ignored: AtomicU64,
    payments: AtomicU64,
    committed: AtomicU64,
    failed: AtomicU64,
    partially_committed: AtomicU64,
}

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Events discarded by classification.
    pub ignored: u64,
    /// Payments seen (bookkeeping).
    pub payments: u64,
    /// Fully committed TrustSet events.
    pub committed: u64,
    /// TrustSet events whose graph mutation failed.
    pub failed: u64,
    /// TrustSet events left inconsistent by a failed history append.
    pub partially_committed: u64,
}

impl PipelineStats {
    /// Snapshot the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ignored: self.ignored.load(Ordering::Relaxed),
            payments: self.payments.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            partially_committed: self.partially_committed.load(Ordering::Relaxed),
        }
    }
}

/// The ingestion pipeline.
///
/// Cheap to clone; clones share storage, directory, locks, and counters.
#[derive(Clone)]
pub struct IngestionPipeline {
    storage: Storage,
    directory: Arc<dyn AccountDirectory>,
    currency: String,
    store_timeout: Duration,
    pair_locks: Arc<StdMutex<HashMap<PairKey, Arc<AsyncMutex<()>>>>>,
    stats: Arc<PipelineStats>,
}

impl IngestionPipeline {
    /// Create a pipeline over the given stores.
    pub fn new(
        storage: Storage,
        directory: Arc<dyn AccountDirectory>,
        currency: String,
        store_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            directory,
            currency,
            store_timeout,
            pair_locks: Arc::new(StdMutex::new(HashMap::new())),
            stats: Arc::new(PipelineStats::default()),
        }
    }

    /// The shared stat counters.
    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// Consume the feed until it ends, spawning one task per message.
    ///
    /// Unrelated pairs proceed concurrently; the per-pair lock inside
    /// [`IngestionPipeline::process_message`] provides same-pair ordering.
    pub async fn run(&self, mut source: impl EventSource) -> Result<()> {
        info!("Ingestion pipeline starting (currency: {})", self.currency);

        let mut tasks: JoinSet<()> = JoinSet::new();

        while let Some(raw) = source.next_message().await {
            // Reap whatever finished without blocking the loop.
            while tasks.try_join_next().is_some() {}

            let pipeline = self.clone();
            tasks.spawn(async move {
                pipeline.process_message(raw).await;
            });
        }

        // Feed ended: drain in-flight work before reporting.
        while tasks.join_next().await.is_some() {}

        let stats = self.stats.snapshot();
        info!(
            "Feed ended: {} committed, {} payments, {} ignored, {} failed, {} partially committed",
            stats.committed, stats.payments, stats.ignored, stats.failed,
            stats.partially_committed
        );

        Ok(())
    }

    /// Process one raw feed message to its terminal state.
    pub async fn process_message(&self, raw: serde_json::Value) -> EventOutcome {
        let msg: RawLedgerMessage = match serde_json::from_value(raw) {
            Ok(msg) => msg,
            Err(e) => {
                let err = CoreError::MalformedEvent(e.to_string());
                debug!("Discarding feed message: {err}");
                self.stats.ignored.fetch_add(1, Ordering::Relaxed);
                return EventOutcome::Ignored;
            }
        };

        match classify(&msg, &self.currency) {
            EventKind::Ignored(reason) => {
                debug!("Ignoring event: {:?}", reason);
                self.stats.ignored.fetch_add(1, Ordering::Relaxed);
                EventOutcome::Ignored
            }
            EventKind::Payment(payment) => {
                debug!(
                    "Payment {} -> {} of {} (bookkeeping only)",
                    payment.source, payment.destination, payment.amount
                );
                self.stats.payments.fetch_add(1, Ordering::Relaxed);
                EventOutcome::PaymentAccepted
            }
            EventKind::TrustSet(trust_set) => self.process_trust_set(trust_set).await,
        }
    }

    async fn process_trust_set(&self, event: TrustSetEvent) -> EventOutcome {
        let pair = PairKey::new(event.source.clone(), event.target.clone());
        let lock = self.pair_lock(&pair);
        // Held until the history append completes or fails: the recorded
        // delta must come from the same view as the mutation.
        let _guard = lock.lock().await;

        let mutation = match tokio::time::timeout(
            self.store_timeout,
            self.storage
                .upsert_edge(&event.source, &event.target, event.new_limit),
        )
        .await
        {
            Ok(Ok(mutation)) => mutation,
            Ok(Err(e)) => {
                let err = CoreError::StoreUnavailable(format!("{e:#}"));
                error!(txn = %event.meta.txn_hash, pair = %pair, "Graph mutation failed: {err}");
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                return EventOutcome::Failed;
            }
            Err(_) => {
                let err = CoreError::StoreUnavailable(format!(
                    "graph upsert timed out after {:?}",
                    self.store_timeout
                ));
                error!(txn = %event.meta.txn_hash, pair = %pair, "Graph mutation failed: {err}");
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                return EventOutcome::Failed;
            }
        };

        let limit_change = mutation.limit_change();
        let source_name = self.display_name(&event.source).await;
        let target_name = self.display_name(&event.target).await;

        let record = |counterparty: String| TransactionRecord {
            counterparty_username: counterparty,
            message: event.meta.memo.clone(),
            limit_change,
            ledger_index: event.meta.ledger_index,
            ledger_hash: event.meta.ledger_hash.clone(),
            txn_hash: event.meta.txn_hash.clone(),
            txn_date: event.meta.txn_date,
        };

        let outgoing = HistoryEntry {
            account: event.source.clone(),
            direction: HistoryDirection::Outgoing,
            record: record(target_name),
        };
        let incoming = HistoryEntry {
            account: event.target.clone(),
            direction: HistoryDirection::Incoming,
            record: record(source_name),
        };

        match tokio::time::timeout(
            self.store_timeout,
            self.storage.append_both(&outgoing, &incoming),
        )
        .await
        {
            Ok(Ok(())) => {
                info!(
                    txn = %event.meta.txn_hash, pair = %pair,
                    "Committed trust-line change: {} -> {} (delta {})",
                    mutation.prev_amount, mutation.new_amount, limit_change
                );
                self.stats.committed.fetch_add(1, Ordering::Relaxed);
                EventOutcome::Committed(mutation)
            }
            Ok(Err(e)) => {
                let err = CoreError::InconsistentState {
                    txn_hash: event.meta.txn_hash.clone(),
                    detail: format!("{e:#}"),
                };
                error!(pair = %pair, "{err}");
                self.stats.partially_committed.fetch_add(1, Ordering::Relaxed);
                EventOutcome::PartiallyCommitted(mutation)
            }
            Err(_) => {
                let err = CoreError::InconsistentState {
                    txn_hash: event.meta.txn_hash.clone(),
                    detail: format!("history append timed out after {:?}", self.store_timeout),
                };
                error!(pair = %pair, "{err}");
                self.stats.partially_committed.fetch_add(1, Ordering::Relaxed);
                EventOutcome::PartiallyCommitted(mutation)
            }
        }
    }

    /// Resolve a display name, falling back to the raw address.
    async fn display_name(&self, address: &Address) -> String {
        match self.directory.resolve_display_name(address).await {
            Ok(Some(name)) => name,
            Ok(None) => address.to_string(),
            Err(e) => {
                warn!("Display-name lookup failed for {}: {:#}", address, e);
                address.to_string()
            }
        }
    }

    /// The serialization lock for an ordered pair.
    ///
    /// The lock map grows with the set of pairs ever seen; contention on a
    /// single pair is expected to be rare, and entries are tiny.
    fn pair_lock(&self, pair: &PairKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self.pair_locks.lock().expect("pair lock map poisoned");
        Arc::clone(locks.entry(pair.clone()).or_default())
    }
}
