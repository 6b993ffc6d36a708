//! Partition range balancing
//!
//! Splits `0..partition_count` into one contiguous range per connection.
//! Range sizes differ by at most one; the first `partition_count %
//! connection_count` connections take the extra partition.

use crate::common::{CaptureError, Result};
use std::ops::Range;

/// Split `partition_count` partitions across `connection_count` connections.
///
/// Requires `1 <= connection_count <= partition_count`.
pub fn balance_load(partition_count: usize, connection_count: usize) -> Result<Vec<Range<usize>>> {
    if connection_count == 0 {
        return Err(CaptureError::config("connection count must be at least 1"));
    }
    if connection_count > partition_count {
        return Err(CaptureError::config(format!(
            "connection count {} exceeds partition count {}",
            connection_count, partition_count
        )));
    }

    let base = partition_count / connection_count;
    let remainder = partition_count % connection_count;

    let mut ranges = Vec::with_capacity(connection_count);
    let mut low = 0;
    for index in 0..connection_count {
        let size = if index < remainder { base + 1 } else { base };
        ranges.push(low..low + size);
        low += size;
    }
    Ok(ranges)
}

/// Partition ids owned by each connection.
pub fn partition_lists(partition_count: u16, connection_count: usize) -> Result<Vec<Vec<u16>>> {
    Ok(balance_load(partition_count as usize, connection_count)?
        .into_iter()
        .map(|range| range.map(|p| p as u16).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_uneven_split() {
        assert_eq!(balance_load(5, 2).unwrap(), vec![0..3, 3..5]);
    }

    #[test]
    fn test_even_split() {
        assert_eq!(balance_load(4, 2).unwrap(), vec![0..2, 2..4]);
    }

    #[test]
    fn test_remainder_goes_to_first_connections() {
        assert_eq!(balance_load(10, 4).unwrap(), vec![0..3, 3..6, 6..8, 8..10]);
    }

    #[test]
    fn test_one_partition_per_connection() {
        let ranges = balance_load(3, 3).unwrap();
        assert_eq!(ranges, vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn test_invalid_counts() {
        assert!(balance_load(4, 0).is_err());
        assert!(balance_load(2, 3).is_err());
        assert!(balance_load(0, 1).is_err());
    }

    #[test]
    fn test_partition_lists() {
        let lists = partition_lists(8, 2).unwrap();
        assert_eq!(lists, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn test_ranges_cover_and_balance(
            (partitions, connections) in (1usize..2048).prop_flat_map(|p| (Just(p), 1..=p))
        ) {
            let ranges = balance_load(partitions, connections).unwrap();
            prop_assert_eq!(ranges.len(), connections);

            let mut expected_low = 0;
            for range in &ranges {
                prop_assert_eq!(range.start, expected_low);
                prop_assert!(range.end > range.start);
                expected_low = range.end;
            }
            prop_assert_eq!(expected_low, partitions);

            let sizes: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
            let max = *sizes.iter().max().unwrap();
            let min = *sizes.iter().min().unwrap();
            prop_assert!(max - min <= 1);
        }
    }
}
