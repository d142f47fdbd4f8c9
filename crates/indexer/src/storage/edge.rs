//! Trust-graph edge operations.
//!
//! Edges are mutated only through [`Storage::upsert_edge`]: create with
//! `prev_amount = 0`, update recording the outgoing amount as `prev_amount`,
//! delete when the new limit is zero. The read side offers point lookups and
//! the bounded-hop path enumeration the flow service consumes.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sqlx::Row;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use creditnet_core::types::{Address, EdgeMutation, TrustEdge};

use super::Storage;

impl Storage {
    /// Create, update, or delete-on-zero the edge for an ordered pair.
    ///
    /// Each case is a single atomic statement whose `RETURNING` clause yields
    /// the pre-mutation amount, so the returned `prev_amount`/`new_amount`
    /// reflect one consistent view and concurrent calls on different pairs
    /// never contend on a read-to-write lock upgrade. Callers mutating the
    /// same ordered pair must still serialize (the pipeline holds a per-pair
    /// lock across this call and the matching history append).
    pub async fn upsert_edge(
        &self,
        source: &Address,
        target: &Address,
        new_limit: Decimal,
    ) -> Result<EdgeMutation> {
        let prev: Option<String> = if new_limit.is_zero() {
            // A zero-limit edge is logically absent: remove the row instead
            // of keeping dead weight the path queries would have to skip.
            sqlx::query_scalar(
                r#"
                DELETE FROM trust_edges
                WHERE source_address = ? AND target_address = ?
                RETURNING amount
                "#,
            )
            .bind(source.as_str())
            .bind(target.as_str())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to delete zero-limit edge")?
        } else {
            // On insert the row's prev_amount is the bound zero; on conflict
            // it is set to the old amount before RETURNING reads it back.
            sqlx::query_scalar(
                r#"
                INSERT INTO trust_edges (source_address, target_address, amount, prev_amount, updated_at)
                VALUES (?, ?, ?, '0', ?)
                ON CONFLICT (source_address, target_address)
                DO UPDATE SET
                    prev_amount = trust_edges.amount,
                    amount = excluded.amount,
                    updated_at = excluded.updated_at
                RETURNING prev_amount
                "#,
            )
            .bind(source.as_str())
            .bind(target.as_str())
            .bind(new_limit.to_string())
            .bind(chrono::Utc::now().timestamp())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to upsert edge")?
        };

        let prev_amount = match prev {
            Some(raw) => parse_stored_amount(&raw)?,
            None => Decimal::ZERO,
        };

        Ok(EdgeMutation {
            prev_amount,
            new_amount: new_limit,
        })
    }

    /// Fetch the live edge for an ordered pair.
    pub async fn get_edge(&self, source: &Address, target: &Address) -> Result<Option<TrustEdge>> {
        let row = sqlx::query(
            r#"
            SELECT source_address, target_address, amount, prev_amount
            FROM trust_edges
            WHERE source_address = ? AND target_address = ?
            "#,
        )
        .bind(source.as_str())
        .bind(target.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_edge).transpose()
    }

    /// Get all live edges, ordered by pair.
    pub async fn get_all_edges(&self) -> Result<Vec<TrustEdge>> {
        let rows = sqlx::query(
            r#"
            SELECT source_address, target_address, amount, prev_amount
            FROM trust_edges
            ORDER BY source_address, target_address
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_edge).collect()
    }

    /// Count live edges.
    pub async fn count_edges(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trust_edges")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Enumerate all simple directed paths `source -> target` of length at
    /// most `max_hops`, each as its ordered edge list.
    ///
    /// Reads outward from `source` one hop-frontier at a time (one query per
    /// hop), then walks the fetched adjacency in memory. Paths come back in
    /// ascending length, ties broken by depth-first discovery order over
    /// adjacency sorted by target address. Length ordering makes the flow
    /// computation's k-hop prefix identical to a k-hop run, which keeps
    /// capacity answers monotone in the hop bound. This is the sole
    /// graph-read primitive of the flow service.
    pub async fn get_edges_on_paths(
        &self,
        source: &Address,
        target: &Address,
        max_hops: u32,
    ) -> Result<Vec<Vec<TrustEdge>>> {
        if max_hops == 0 {
            return Ok(Vec::new());
        }

        let mut adjacency: HashMap<Address, Vec<TrustEdge>> = HashMap::new();
        let mut expanded: HashSet<Address> = HashSet::new();
        let mut frontier: Vec<Address> = vec![source.clone()];

        for _hop in 0..max_hops {
            // The target never needs expansion: a simple path cannot pass
            // through its own endpoint and come back.
            let to_fetch: Vec<Address> = frontier
                .iter()
                .filter(|addr| *addr != target && !expanded.contains(*addr))
                .cloned()
                .collect();

            if to_fetch.is_empty() {
                break;
            }

            let edges = self.edges_from(&to_fetch).await?;
            expanded.extend(to_fetch);

            let mut next_frontier: Vec<Address> = Vec::new();
            for edge in edges {
                if !expanded.contains(&edge.target) && !next_frontier.contains(&edge.target) {
                    next_frontier.push(edge.target.clone());
                }
                adjacency.entry(edge.source.clone()).or_default().push(edge);
            }
            frontier = next_frontier;
        }

        for edges in adjacency.values_mut() {
            edges.sort_by(|a, b| a.target.cmp(&b.target));
        }

        let mut paths = Vec::new();
        let mut current: Vec<TrustEdge> = Vec::new();
        let mut on_path: HashSet<Address> = HashSet::new();
        on_path.insert(source.clone());
        collect_paths(
            &adjacency,
            source,
            target,
            max_hops,
            &mut current,
            &mut on_path,
            &mut paths,
        );

        // Shortest first (stable): a longer path sharing edges with a short
        // one must never drain their capacity ahead of it.
        paths.sort_by_key(|path| path.len());

        Ok(paths)
    }

    /// Fetch the outgoing edges of a set of addresses in one query.
    async fn edges_from(&self, sources: &[Address]) -> Result<Vec<TrustEdge>> {
        if sources.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; sources.len()].join(", ");
        let sql = format!(
            "SELECT source_address, target_address, amount, prev_amount \
             FROM trust_edges WHERE source_address IN ({placeholders})"
        );

        let mut query = sqlx::query(&sql);
        for addr in sources {
            query = query.bind(addr.as_str());
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch frontier edges")?;

        rows.into_iter().map(row_to_edge).collect()
    }
}

/// Depth-first walk collecting every simple path that ends at `target`.
fn collect_paths(
    adjacency: &HashMap<Address, Vec<TrustEdge>>,
    node: &Address,
    target: &Address,
    hops_left: u32,
    current: &mut Vec<TrustEdge>,
    on_path: &mut HashSet<Address>,
    paths: &mut Vec<Vec<TrustEdge>>,
) {
    if hops_left == 0 {
        return;
    }

    let Some(edges) = adjacency.get(node) else {
        return;
    };

    for edge in edges {
        if on_path.contains(&edge.target) {
            continue;
        }

        current.push(edge.clone());
        if &edge.target == target {
            paths.push(current.clone());
        } else {
            on_path.insert(edge.target.clone());
            collect_paths(
                adjacency,
                &edge.target,
                target,
                hops_left - 1,
                current,
                on_path,
                paths,
            );
            on_path.remove(&edge.target);
        }
        current.pop();
    }
}

fn row_to_edge(row: sqlx::sqlite::SqliteRow) -> Result<TrustEdge> {
    let source: String = row.get("source_address");
    let target: String = row.get("target_address");
    let amount: String = row.get("amount");
    let prev_amount: String = row.get("prev_amount");

    Ok(TrustEdge {
        source: Address::from(source),
        target: Address::from(target),
        amount: parse_stored_amount(&amount)?,
        prev_amount: parse_stored_amount(&prev_amount)?,
    })
}

fn parse_stored_amount(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).with_context(|| format!("Invalid stored amount: {raw:?}"))
}
