//! Recipient list partitioning

use payamak_common::types::sanitize_number;
use std::collections::HashSet;

/// Maximum numbers per gateway call
pub const SEGMENT_SIZE: usize = 100;

/// Clean a raw recipient list: normalize each number, drop the ones that
/// do not survive sanitization, and deduplicate while keeping first-seen
/// order.
pub fn sanitize_list<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut numbers = Vec::new();

    for entry in raw {
        if let Some(number) = sanitize_number(entry.as_ref()) {
            if seen.insert(number.clone()) {
                numbers.push(number);
            }
        }
    }

    numbers
}

/// Partition a sanitized recipient list into ordered batches of at most
/// [`SEGMENT_SIZE`] numbers. The final batch carries the remainder.
pub fn partition(numbers: &[String]) -> Vec<Vec<String>> {
    numbers
        .chunks(SEGMENT_SIZE)
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Number of batches a list of the given length partitions into
pub fn batch_count(total: usize) -> usize {
    total.div_ceil(SEGMENT_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbers(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("98912{:07}", i)).collect()
    }

    #[test]
    fn test_partition_exact_multiple() {
        let batches = partition(&numbers(200));
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 100);
        assert_eq!(batches[1].len(), 100);
    }

    #[test]
    fn test_partition_with_remainder() {
        let batches = partition(&numbers(250));
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 100);
        assert_eq!(batches[1].len(), 100);
        assert_eq!(batches[2].len(), 50);
    }

    #[test]
    fn test_partition_preserves_order() {
        let list = numbers(150);
        let batches = partition(&list);
        assert_eq!(batches[0][0], list[0]);
        assert_eq!(batches[0][99], list[99]);
        assert_eq!(batches[1][0], list[100]);
        assert_eq!(batches[1][49], list[149]);
    }

    #[test]
    fn test_partition_empty_and_single() {
        assert!(partition(&[]).is_empty());

        let batches = partition(&numbers(1));
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
    }

    #[test]
    fn test_batch_count() {
        assert_eq!(batch_count(0), 0);
        assert_eq!(batch_count(1), 1);
        assert_eq!(batch_count(100), 1);
        assert_eq!(batch_count(101), 2);
        assert_eq!(batch_count(250), 3);
    }

    #[test]
    fn test_sanitize_list_dedup_and_filter() {
        let cleaned = sanitize_list([
            "+98 912 000-0001",
            "989120000001",
            "not-a-number",
            "989120000002",
            "123", // too short
        ]);
        assert_eq!(cleaned, vec!["989120000001", "989120000002"]);
    }
}
