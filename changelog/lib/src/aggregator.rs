//! Grouping of classified entries into category buckets.

use std::collections::BTreeMap;

use crate::types::Entry;

/// Entries grouped by category, each bucket ordered by pull request number.
pub type Buckets = BTreeMap<String, Vec<Entry>>;

/// Groups entries by category.
///
/// Entries are sorted by `(number, text)` first, so the output does not
/// depend on the order workers finished in. When one pull request shows up
/// more than once (a backport surfaced next to its origin, say) only the
/// first entry in that order is kept. Deduplication runs before grouping, so
/// a pull request lands in exactly one bucket even when its copies carry
/// different categories.
pub fn aggregate(mut entries: Vec<Entry>) -> Buckets {
    entries.sort_by(|a, b| a.number.cmp(&b.number).then_with(|| a.text.cmp(&b.text)));
    entries.dedup_by_key(|entry| entry.number);

    let mut buckets = Buckets::new();
    for entry in entries {
        buckets.entry(entry.category.clone()).or_default().push(entry);
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(number: u64, category: &str, text: &str) -> Entry {
        Entry {
            number,
            author: "dev".into(),
            author_url: "https://github.com/dev".into(),
            pr_url: format!("https://github.com/o/r/pull/{number}"),
            text: text.into(),
            category: category.into(),
        }
    }

    #[test]
    fn buckets_are_sorted_by_number() {
        let buckets = aggregate(vec![
            entry(500, "Bug Fix", "b"),
            entry(100, "Bug Fix", "a"),
            entry(300, "Improvement", "c"),
        ]);
        let numbers: Vec<_> = buckets["Bug Fix"].iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec![100, 500]);
        assert_eq!(buckets["Improvement"].len(), 1);
    }

    #[test]
    fn duplicate_numbers_keep_the_smallest_text() {
        let buckets = aggregate(vec![
            entry(7, "Improvement", "Original text."),
            entry(7, "Improvement", "Backported in #9: Original text."),
        ]);
        assert_eq!(buckets["Improvement"].len(), 1);
        assert_eq!(buckets["Improvement"][0].text, "Backported in #9: Original text.");
    }

    #[test]
    fn duplicates_across_categories_land_in_one_bucket() {
        let buckets = aggregate(vec![
            entry(7, "Improvement", "Later text."),
            entry(7, "Bug Fix", "Earlier text."),
        ]);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets["Bug Fix"][0].text, "Earlier text.");
        assert!(!buckets.contains_key("Improvement"));
    }

    #[test]
    fn empty_input_has_no_buckets() {
        assert!(aggregate(Vec::new()).is_empty());
    }

    proptest! {
        #[test]
        fn every_number_appears_once(
            numbers in proptest::collection::vec(1u64..50, 0..60),
        ) {
            let categories = ["Bug Fix", "Improvement", "Other"];
            let entries: Vec<_> = numbers
                .iter()
                .enumerate()
                .map(|(i, n)| entry(*n, categories[i % 3], &format!("text {i}")))
                .collect();

            let buckets = aggregate(entries.clone());
            let mut seen: Vec<u64> = buckets.values().flatten().map(|e| e.number).collect();
            seen.sort_unstable();

            let mut expected = numbers.clone();
            expected.sort_unstable();
            expected.dedup();
            prop_assert_eq!(seen, expected);

            let mut reversed = entries;
            reversed.reverse();
            prop_assert_eq!(aggregate(reversed), buckets);
        }
    }
}
