//! Per-partition completion state
//!
//! Each partition has its own lock so that many connections finishing
//! partitions at the same time never contend on one table-wide lock.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Completion state of a single partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionState {
    /// Still streaming
    Normal,
    /// Reached its end sequence number
    Completed,
    /// Stream was torn down before completing
    StreamClosed,
}

impl PartitionState {
    /// Terminal states are never left.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Normal)
    }
}

/// Fixed-size table of independently locked partition states.
#[derive(Debug)]
pub struct PartitionStateTable {
    cells: Box<[RwLock<PartitionState>]>,
}

impl PartitionStateTable {
    /// Create a table with every partition in `Normal`.
    pub fn new(partition_count: u16) -> Self {
        let cells = (0..partition_count)
            .map(|_| RwLock::new(PartitionState::Normal))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Current state of `partition`.
    ///
    /// # Panics
    ///
    /// Panics if `partition` is outside the table.
    pub fn get(&self, partition: u16) -> PartitionState {
        *self.cell(partition).read()
    }

    /// Move `partition` from `Normal` to `to`.
    ///
    /// Returns `false` when the partition was already terminal; terminal
    /// states are sticky, so the write is dropped.
    ///
    /// # Panics
    ///
    /// Panics if `partition` is outside the table.
    pub fn transition(&self, partition: u16, to: PartitionState) -> bool {
        let mut state = self.cell(partition).write();
        if state.is_terminal() || to == PartitionState::Normal {
            return false;
        }
        *state = to;
        true
    }

    /// Number of partitions not in `Normal`.
    pub fn terminal_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|cell| cell.read().is_terminal())
            .count()
    }

    /// Whether every partition has reached a terminal state.
    pub fn all_terminal(&self) -> bool {
        self.terminal_count() == self.cells.len()
    }

    /// Copy of all states, in partition order.
    pub fn snapshot(&self) -> Vec<PartitionState> {
        self.cells.iter().map(|cell| *cell.read()).collect()
    }

    fn cell(&self, partition: u16) -> &RwLock<PartitionState> {
        match self.cells.get(partition as usize) {
            Some(cell) => cell,
            None => panic!(
                "partition {} out of range (table has {} partitions)",
                partition,
                self.cells.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_initial_state() {
        let table = PartitionStateTable::new(4);
        assert_eq!(table.len(), 4);
        assert!(table.snapshot().iter().all(|s| *s == PartitionState::Normal));
        assert_eq!(table.terminal_count(), 0);
        assert!(!table.all_terminal());
    }

    #[test]
    fn test_transition_to_completed() {
        let table = PartitionStateTable::new(2);
        assert!(table.transition(1, PartitionState::Completed));
        assert_eq!(table.get(1), PartitionState::Completed);
        assert_eq!(table.get(0), PartitionState::Normal);
        assert_eq!(table.terminal_count(), 1);
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let table = PartitionStateTable::new(2);
        assert!(table.transition(0, PartitionState::Completed));
        assert!(!table.transition(0, PartitionState::StreamClosed));
        assert!(!table.transition(0, PartitionState::Normal));
        assert_eq!(table.get(0), PartitionState::Completed);

        assert!(table.transition(1, PartitionState::StreamClosed));
        assert!(!table.transition(1, PartitionState::Completed));
        assert_eq!(table.get(1), PartitionState::StreamClosed);

        assert!(table.all_terminal());
    }

    #[test]
    fn test_normal_is_not_a_transition_target() {
        let table = PartitionStateTable::new(1);
        assert!(!table.transition(0, PartitionState::Normal));
        assert_eq!(table.get(0), PartitionState::Normal);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_unknown_partition_panics() {
        let table = PartitionStateTable::new(2);
        table.get(2);
    }

    #[test]
    fn test_concurrent_transitions() {
        let table = Arc::new(PartitionStateTable::new(64));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let table = table.clone();
                std::thread::spawn(move || {
                    for p in 0..64u16 {
                        let to = if (p as usize + t) % 2 == 0 {
                            PartitionState::Completed
                        } else {
                            PartitionState::StreamClosed
                        };
                        table.transition(p, to);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(table.all_terminal());
    }
}
