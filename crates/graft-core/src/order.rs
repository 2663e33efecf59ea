//! Load-order resolution.
//!
//! Edges come from two relations:
//! - a record with `parent = P` loads after the record whose id is `P`;
//! - a record that lists `D` in its dependencies loads after `D`.
//!
//! References to ids outside the collection are logged and dropped, as are
//! self-references. A cycle is an error.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::error::OrderingError;
use crate::metadata::Metadata;

/// Groups records into layers with Kahn's algorithm.
///
/// Every record in a layer depends only on records in earlier layers. Within
/// a layer the input order is preserved, so the result is deterministic.
pub fn resolve_layers(
    records: &[Arc<Metadata>],
) -> Result<Vec<Vec<Arc<Metadata>>>, OrderingError> {
    let layers = layer_indices(records)?;
    Ok(layers
        .into_iter()
        .map(|layer| layer.into_iter().map(|i| Arc::clone(&records[i])).collect())
        .collect())
}

/// Returns the records in a total load order.
///
/// This is the concatenation of [`resolve_layers`].
pub fn sort_metadata(records: &[Arc<Metadata>]) -> Result<Vec<Arc<Metadata>>, OrderingError> {
    let layers = layer_indices(records)?;
    Ok(layers
        .into_iter()
        .flatten()
        .map(|i| Arc::clone(&records[i]))
        .collect())
}

fn layer_indices(records: &[Arc<Metadata>]) -> Result<Vec<Vec<usize>>, OrderingError> {
    let n = records.len();

    // First occurrence wins if the caller passed duplicate ids.
    let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(n);
    for (i, record) in records.iter().enumerate() {
        index_of.entry(record.id()).or_insert(i);
    }

    let mut in_degree: Vec<usize> = vec![0; n];
    let mut dependents: Vec<Vec<usize>> = vec![vec![]; n];

    for (i, record) in records.iter().enumerate() {
        let predecessors = record
            .parent()
            .map(|p| (p, "parent"))
            .into_iter()
            .chain(record.dependencies().keys().map(|d| (d.as_str(), "dependency")));

        for (target, relation) in predecessors {
            match index_of.get(target) {
                Some(&j) if j != i => {
                    // A parent that is also a dependency is still one edge.
                    if !dependents[j].contains(&i) {
                        dependents[j].push(i);
                        in_degree[i] += 1;
                    }
                }
                Some(_) => {
                    warn!(
                        plugin = %record.id(),
                        relation,
                        "Plugin references itself, ignoring the edge"
                    );
                }
                None => {
                    warn!(
                        plugin = %record.id(),
                        relation,
                        target,
                        "Referenced plugin is not present; load order for this edge is not guaranteed"
                    );
                }
            }
        }
    }

    let mut layers: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut processed = 0;

    while !current.is_empty() {
        processed += current.len();
        let mut next: Vec<usize> = Vec::new();
        for &i in &current {
            for &j in &dependents[i] {
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    next.push(j);
                }
            }
        }
        next.sort_unstable();
        layers.push(current);
        current = next;
    }

    if processed != n {
        let ids = (0..n)
            .filter(|&i| in_degree[i] > 0)
            .map(|i| records[i].id().to_string())
            .collect();
        return Err(OrderingError::Cycle { ids });
    }

    Ok(layers)
}
