//! Round-robin partitioning of pending work across API keys.
//!
//! Item `i` goes to shard `i % n`. Input files are often sorted by street or
//! district, so a contiguous split would hand one key a run of similar (and
//! similarly slow or failing) lookups; interleaving spreads them evenly. Shard
//! sizes differ by at most one.

use crate::common::{Error, Result};

/// Splits `items` into `n` disjoint shards, preserving relative order inside
/// each shard.
///
/// # Errors
///
/// Returns [`Error::InvalidShardCount`] if `n` is zero.
pub fn shard<T>(items: Vec<T>, n: usize) -> Result<Vec<Vec<T>>> {
    if n == 0 {
        return Err(Error::InvalidShardCount);
    }

    let len = items.len();
    let mut shards: Vec<Vec<T>> = (0..n)
        .map(|i| Vec::with_capacity(len / n + usize::from(i < len % n)))
        .collect();

    for (i, item) in items.into_iter().enumerate() {
        shards[i % n].push(item);
    }

    Ok(shards)
}
