//! Durable record of every address ever attempted.
//!
//! The [`CheckpointTable`] is the only resume mechanism: an address with a
//! row here is not dispatched again (subject to [`ResumePolicy`]). The table
//! is loaded once per run, mutated only by the checkpoint writer and written
//! back in full through a [`CheckpointStore`].

pub mod parquet;

use crate::common::{Address, Coordinates, GeocodeResult, Result};
use crate::config::ResumePolicy;
use std::collections::HashMap;

pub use self::parquet::ParquetStore;

/// Durable backing for a [`CheckpointTable`].
///
/// `persist` always receives the full table and must replace the previous
/// contents atomically: a failure part-way through must leave the previously
/// persisted table readable.
pub trait CheckpointStore: Send + 'static {
    /// Loads the persisted table, or an empty one if nothing was persisted
    /// yet.
    fn load(&self) -> Result<CheckpointTable>;

    fn persist(&mut self, table: &CheckpointTable) -> Result<()>;
}

/// Insertion-ordered rows keyed by address.
///
/// The address index is built once when rows are loaded and kept in sync on
/// every merge, so membership checks never scan the rows.
#[derive(Debug, Clone, Default)]
pub struct CheckpointTable {
    rows: Vec<GeocodeResult>,
    index: HashMap<Address, usize>,
}

impl CheckpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from persisted rows. A repeated address keeps its last
    /// row.
    pub fn from_rows(rows: impl IntoIterator<Item = GeocodeResult>) -> Self {
        let mut table = Self::new();
        table.merge(rows);
        table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[GeocodeResult] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeocodeResult> {
        self.rows.iter()
    }

    pub fn get(&self, address: &str) -> Option<&GeocodeResult> {
        self.index.get(address).map(|&idx| &self.rows[idx])
    }

    pub fn contains(&self, address: &str) -> bool {
        self.index.contains_key(address)
    }

    /// Inserts a new row or replaces the existing row for the same address
    /// in place. Returns `true` if the address was not present before.
    pub fn upsert(&mut self, result: GeocodeResult) -> bool {
        match self.index.get(&result.address) {
            Some(&idx) => {
                self.rows[idx] = result;
                false
            }
            None => {
                self.index.insert(result.address.clone(), self.rows.len());
                self.rows.push(result);
                true
            }
        }
    }

    /// Upserts every result, returning how many addresses were new.
    ///
    /// Merging the same results twice leaves the table unchanged, which lets
    /// a failed flush be retried with the same buffer.
    pub fn merge(&mut self, results: impl IntoIterator<Item = GeocodeResult>) -> usize {
        results
            .into_iter()
            .map(|result| usize::from(self.upsert(result)))
            .sum()
    }

    /// Whether `address` needs no further work under `policy`.
    pub fn is_settled(&self, address: &str, policy: ResumePolicy) -> bool {
        match (self.get(address), policy) {
            (None, _) => false,
            (Some(_), ResumePolicy::SkipAttempted) => true,
            (Some(row), ResumePolicy::RetryUnresolved) => row.is_resolved(),
        }
    }

    /// Requested addresses minus settled ones, in request order.
    ///
    /// Duplicates in the request are kept; each is attempted independently.
    pub fn pending<'a, I>(&self, addresses: I, policy: ResumePolicy) -> Vec<Address>
    where
        I: IntoIterator<Item = &'a Address>,
    {
        addresses
            .into_iter()
            .filter(|address| !self.is_settled(address.as_str(), policy))
            .cloned()
            .collect()
    }

    /// Usable coordinates for `address`, if it was resolved.
    pub fn coordinates_for(&self, address: &str) -> Option<Coordinates> {
        self.get(address)
            .and_then(|row| row.coordinates)
            .filter(Coordinates::is_usable)
    }

    /// All rows with usable coordinates.
    pub fn resolved(&self) -> impl Iterator<Item = (&Address, Coordinates)> {
        self.rows.iter().filter_map(|row| {
            row.coordinates
                .filter(Coordinates::is_usable)
                .map(|coords| (&row.address, coords))
        })
    }

    /// Joins `addresses` against the table, preserving their order.
    ///
    /// Used to merge coordinates back into a wider record set by address key.
    pub fn merge_into<'a, I>(&self, addresses: I) -> Vec<(Address, Option<Coordinates>)>
    where
        I: IntoIterator<Item = &'a Address>,
    {
        addresses
            .into_iter()
            .map(|address| (address.clone(), self.coordinates_for(address.as_str())))
            .collect()
    }

    pub fn summary(&self) -> TableSummary {
        let resolved = self.rows.iter().filter(|row| row.is_resolved()).count();
        TableSummary {
            total: self.len(),
            resolved,
            unresolved: self.len() - resolved,
        }
    }
}

/// Row counts of a checkpoint table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSummary {
    pub total: usize,
    /// Rows with usable coordinates.
    pub resolved: usize,
    pub unresolved: usize,
}


#[cfg(test)]
mod tests {
    use super::*;

    fn row(address: &str, coords: Option<(f64, f64)>) -> GeocodeResult {
        GeocodeResult {
            address: address.into(),
            coordinates: coords.map(|(lat, lon)| Coordinates::new(lat, lon)),
        }
    }

    fn addresses(values: &[&str]) -> Vec<Address> {
        values.iter().map(|&v| Address::from(v)).collect()
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut table = CheckpointTable::from_rows([row("A", None), row("B", Some((1.0, 2.0)))]);
        assert!(!table.upsert(row("A", Some((55.7, 37.6)))));
        assert!(table.upsert(row("C", None)));

        let order: Vec<_> = table.iter().map(|r| r.address.as_str()).collect();
        assert_eq!(order, ["A", "B", "C"]);
        assert_eq!(table.get("A").unwrap().latitude(), Some(55.7));
    }

    #[test]
    fn merge_is_idempotent() {
        let mut table = CheckpointTable::new();
        let batch = vec![row("A", None), row("B", Some((1.0, 2.0)))];
        assert_eq!(table.merge(batch.clone()), 2);
        assert_eq!(table.merge(batch), 0);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn pending_skips_attempted_by_default() {
        let table = CheckpointTable::from_rows([row("A", Some((55.7, 37.6))), row("B", None)]);
        let requested = addresses(&["A", "B", "C", "C"]);

        let pending = table.pending(&requested, ResumePolicy::SkipAttempted);
        assert_eq!(pending, addresses(&["C", "C"]));
    }

    #[test]
    fn pending_retries_unresolved_when_asked() {
        let table = CheckpointTable::from_rows([row("A", Some((55.7, 37.6))), row("B", None)]);
        let requested = addresses(&["A", "B", "C"]);

        let pending = table.pending(&requested, ResumePolicy::RetryUnresolved);
        assert_eq!(pending, addresses(&["B", "C"]));
    }

    #[test]
    fn retry_policy_and_summary_agree_on_unusable_rows() {
        let table = CheckpointTable::from_rows([
            row("A", Some((55.7, 37.6))),
            row("Z", Some((0.0, 37.6))),
            row("B", None),
        ]);
        let requested = addresses(&["A", "Z", "B"]);

        let pending = table.pending(&requested, ResumePolicy::RetryUnresolved);
        assert_eq!(pending, addresses(&["Z", "B"]));
        assert_eq!(table.summary().unresolved, pending.len());
    }

    #[test]
    fn merge_into_keeps_request_order_and_drops_unusable() {
        let table = CheckpointTable::from_rows([
            row("A", Some((55.7, 37.6))),
            row("B", None),
            row("Z", Some((0.0, 0.0))),
        ]);
        let merged = table.merge_into(&addresses(&["Z", "missing", "A", "B"]));

        assert_eq!(
            merged,
            vec![
                (Address::from("Z"), None),
                (Address::from("missing"), None),
                (Address::from("A"), Some(Coordinates::new(55.7, 37.6))),
                (Address::from("B"), None),
            ]
        );
        assert_eq!(
            table.summary(),
            TableSummary {
                total: 3,
                resolved: 1,
                unresolved: 2
            }
        );
    }
}
