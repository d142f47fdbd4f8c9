//! Capacity queries over the trust graph.
//!
//! [`FlowService`] is the read-side counterpart of the pipeline: it fetches
//! bounded-hop paths from storage and hands them to the pure flow engine.
//! It performs no writes and keeps no state across calls; a concurrent graph
//! mutation can make the answer approximate, which is acceptable for an
//! admissibility estimate.

use rust_decimal::Decimal;
use tracing::debug;

use creditnet_core::constants::MAX_HOPS_LIMIT;
use creditnet_core::error::CoreError;
use creditnet_core::types::Address;

use crate::storage::Storage;

/// Answers `max_flow(source, target, max_hops)` capacity queries.
#[derive(Debug, Clone)]
pub struct FlowService {
    storage: Storage,
}

impl FlowService {
    /// Create a flow service over a storage handle.
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Maximum credit routable from `source` to `target` over directed
    /// paths of at most `max_hops` edges.
    ///
    /// Zero is a valid answer, not a failure. `source == target` is
    /// rejected: capacity to oneself is not defined.
    pub async fn max_flow(
        &self,
        source: &Address,
        target: &Address,
        max_hops: u32,
    ) -> Result<Decimal, CoreError> {
        if source == target {
            return Err(CoreError::SelfCapacity);
        }
        if max_hops == 0 || max_hops > MAX_HOPS_LIMIT {
            return Err(CoreError::InvalidHopBound(max_hops));
        }

        let paths = self
            .storage
            .get_edges_on_paths(source, target, max_hops)
            .await
            .map_err(|e| CoreError::StoreUnavailable(format!("{e:#}")))?;

        let capacity = creditnet_engine::compute_max_flow(&paths);
        debug!(
            "max_flow({}, {}, {}) = {} over {} paths",
            source,
            target,
            max_hops,
            capacity,
            paths.len()
        );

        Ok(capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::setup_storage;
    use rust_decimal_macros::dec;

    fn addr(s: &str) -> Address {
        Address::from(s)
    }

    async fn service_with_chain() -> (FlowService, tempfile::NamedTempFile) {
        let (storage, temp_db) = setup_storage().await;
        // A -> C (50), C -> B (30), no direct A -> B.
        storage
            .upsert_edge(&addr("rA"), &addr("rC"), dec!(50))
            .await
            .unwrap();
        storage
            .upsert_edge(&addr("rC"), &addr("rB"), dec!(30))
            .await
            .unwrap();
        (FlowService::new(storage), temp_db)
    }

    #[tokio::test]
    async fn direct_edge_capacity() {
        let (storage, _temp_db) = setup_storage().await;
        storage
            .upsert_edge(&addr("rA"), &addr("rB"), dec!(100))
            .await
            .unwrap();
        let flow = FlowService::new(storage);

        assert_eq!(
            flow.max_flow(&addr("rA"), &addr("rB"), 1).await.unwrap(),
            dec!(100)
        );
    }

    #[tokio::test]
    async fn bottleneck_and_hop_bound() {
        let (flow, _temp_db) = service_with_chain().await;

        assert_eq!(
            flow.max_flow(&addr("rA"), &addr("rB"), 2).await.unwrap(),
            dec!(30)
        );
        assert_eq!(
            flow.max_flow(&addr("rA"), &addr("rB"), 1).await.unwrap(),
            Decimal::ZERO
        );
    }

    #[tokio::test]
    async fn monotone_in_hop_bound() {
        let (flow, _temp_db) = service_with_chain().await;

        let mut previous = Decimal::ZERO;
        for hops in 1..=4 {
            let capacity = flow.max_flow(&addr("rA"), &addr("rB"), hops).await.unwrap();
            assert!(capacity >= previous, "capacity decreased at {hops} hops");
            assert!(capacity >= Decimal::ZERO);
            previous = capacity;
        }
    }

    #[tokio::test]
    async fn crossing_edge_does_not_shrink_capacity_at_higher_hop_bound() {
        // Diamond A -> {B, C} -> Z plus a crossing edge B -> C, all at 1.
        // The three-hop route A -> B -> C -> Z shares an edge with each
        // two-hop route; consuming it first would leave only one unit.
        let (storage, _temp_db) = setup_storage().await;
        for (source, target) in [
            ("rA", "rB"),
            ("rA", "rC"),
            ("rB", "rZ"),
            ("rC", "rZ"),
            ("rB", "rC"),
        ] {
            storage
                .upsert_edge(&addr(source), &addr(target), dec!(1))
                .await
                .unwrap();
        }
        let flow = FlowService::new(storage);

        assert_eq!(
            flow.max_flow(&addr("rA"), &addr("rZ"), 2).await.unwrap(),
            dec!(2)
        );
        assert_eq!(
            flow.max_flow(&addr("rA"), &addr("rZ"), 3).await.unwrap(),
            dec!(2)
        );

        let mut previous = Decimal::ZERO;
        for hops in 1..=4 {
            let capacity = flow.max_flow(&addr("rA"), &addr("rZ"), hops).await.unwrap();
            assert!(capacity >= previous, "capacity decreased at {hops} hops");
            previous = capacity;
        }
    }

    #[tokio::test]
    async fn disconnected_accounts_have_zero_capacity() {
        let (flow, _temp_db) = service_with_chain().await;

        assert_eq!(
            flow.max_flow(&addr("rB"), &addr("rA"), 3).await.unwrap(),
            Decimal::ZERO
        );
        assert_eq!(
            flow.max_flow(&addr("rA"), &addr("rNowhere"), 3)
                .await
                .unwrap(),
            Decimal::ZERO
        );
    }

    #[tokio::test]
    async fn rejects_self_and_bad_hop_bounds() {
        let (flow, _temp_db) = service_with_chain().await;

        assert!(matches!(
            flow.max_flow(&addr("rA"), &addr("rA"), 3).await,
            Err(CoreError::SelfCapacity)
        ));
        assert!(matches!(
            flow.max_flow(&addr("rA"), &addr("rB"), 0).await,
            Err(CoreError::InvalidHopBound(0))
        ));
        assert!(matches!(
            flow.max_flow(&addr("rA"), &addr("rB"), 99).await,
            Err(CoreError::InvalidHopBound(99))
        ));
    }

    #[tokio::test]
    async fn deleted_edge_is_absent_from_capacity() {
        let (storage, _temp_db) = setup_storage().await;
        storage
            .upsert_edge(&addr("rA"), &addr("rB"), dec!(100))
            .await
            .unwrap();
        storage
            .upsert_edge(&addr("rA"), &addr("rB"), Decimal::ZERO)
            .await
            .unwrap();
        let flow = FlowService::new(storage);

        assert_eq!(
            flow.max_flow(&addr("rA"), &addr("rB"), 3).await.unwrap(),
            Decimal::ZERO
        );
    }
}
