//! CreditNet flow engine.
//!
//! Computes the routable credit capacity between two accounts, constrained to
//! the bounded-hop paths a caller fetched from the graph store. The
//! computation is a feasibility estimate by successive bottleneck-limited
//! path augmentation, not a min-cost-flow solver: paths are consumed in the
//! order given, ties broken by discovery order.
//!
//! All working state is local to one [`compute_max_flow`] call. In particular
//! the remaining-capacity map is keyed by the edge's `(source, target)` pair,
//! never by object identity, and is discarded when the call returns.

#![warn(missing_docs)]
#![warn(clippy::all)]

use rust_decimal::Decimal;
use std::collections::HashMap;

use creditnet_core::types::{PairKey, TrustEdge};

/// Compute the total capacity routable over the given bounded-hop paths.
///
/// Each path is the ordered edge list of one directed path from the query
/// source to the query target. For every path the bottleneck is the minimum
/// remaining capacity among its edges; a positive bottleneck is subtracted
/// from each edge on the path and added to the running total. A path whose
/// bottleneck is already exhausted contributes zero and is not an error.
///
/// The result is exact decimal arithmetic and always non-negative. An empty
/// path list yields zero.
pub fn compute_max_flow(paths: &[Vec<TrustEdge>]) -> Decimal {
    let mut remaining: HashMap<PairKey, Decimal> = HashMap::new();
    let mut total = Decimal::ZERO;

    for path in paths {
        if path.is_empty() {
            continue;
        }

        // Lazily seed each edge's capacity from its current amount the first
        // time it appears in this computation.
        for edge in path {
            remaining.entry(edge.pair()).or_insert(edge.amount);
        }

        let bottleneck = path
            .iter()
            .map(|edge| remaining[&edge.pair()])
            .min()
            .unwrap_or(Decimal::ZERO);

        if bottleneck <= Decimal::ZERO {
            continue;
        }

        for edge in path {
            if let Some(cap) = remaining.get_mut(&edge.pair()) {
                *cap -= bottleneck;
            }
        }
        total += bottleneck;
    }

    total
}
