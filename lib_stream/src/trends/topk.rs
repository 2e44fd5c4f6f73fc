use super::freq::FrequencyTable;
use super::maxheap::MaxHeap;

/// Selects the `k` highest-count terms from `table`, descending by count.
///
/// Builds a fresh heap from the full table (O(n log n)), then extracts up
/// to `k` times, stopping early when the heap runs dry. Returns
/// `min(k, |table|)` entries.
pub fn top_k(table: &FrequencyTable, k: usize) -> Vec<(String, u64)> {
    let mut heap = MaxHeap::with_capacity(table.len());
    for (term, count) in table.iter() {
        heap.insert(term, count);
    }

    let mut ranked = Vec::with_capacity(k.min(table.len()));
    for _ in 0..k {
        match heap.extract_max() {
            Some(node) => ranked.push((node.term, node.count)),
            None => break,
        }
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_of(pairs: &[(&str, u64)]) -> FrequencyTable {
        let mut table = FrequencyTable::new();
        for (term, count) in pairs {
            table.add(term, *count);
        }
        table
    }

    #[test]
    fn selects_the_five_highest_in_descending_order() {
        let table = table_of(&[
            ("a", 10),
            ("b", 1),
            ("c", 7),
            ("d", 2),
            ("e", 17),
            ("f", 5),
            ("g", 20),
        ]);

        let ranked = top_k(&table, 5);
        assert_eq!(
            ranked,
            vec![
                ("g".to_string(), 20),
                ("e".to_string(), 17),
                ("a".to_string(), 10),
                ("c".to_string(), 7),
                ("f".to_string(), 5),
            ]
        );
    }

    #[test]
    fn stops_early_when_the_table_is_smaller_than_k() {
        let table = table_of(&[("x", 3), ("y", 9)]);
        let ranked = top_k(&table, 5);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0], ("y".to_string(), 9));
        assert_eq!(ranked[1], ("x".to_string(), 3));
    }

    #[test]
    fn counts_match_the_table_exactly() {
        let table = table_of(&[("a", 4), ("b", 8), ("c", 2), ("d", 6)]);
        for (term, count) in top_k(&table, 3) {
            assert_eq!(count, table.count(&term));
        }
    }

    #[test]
    fn empty_table_yields_empty_result() {
        let table = FrequencyTable::new();
        assert!(top_k(&table, 10).is_empty());
    }
}
