//! Fuzzy category matching.
//!
//! Authors type categories by hand (`Bugfix`, `improvements`, `New feature`),
//! so the extracted text is snapped to the closest canonical category when
//! it is similar enough.

use crate::types::CATEGORIES_PREFERRED_ORDER;

/// Minimum similarity (0..=100) for a category to be snapped.
pub const MATCH_THRESHOLD: u8 = 90;

/// Length of the longest common subsequence of two char slices.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Normalized edit similarity on a 0..=100 scale.
///
/// Insertions and deletions cost one, substitutions two, so the score is
/// `2 * lcs / (len(a) + len(b))` rounded to the nearest integer. Identical
/// strings score 100; strings with nothing in common score 0.
///
/// ## Examples
///
/// ```
/// use changelog_lib::similarity::ratio;
///
/// assert_eq!(ratio("bug fix", "bug fix"), 100);
/// assert!(ratio("bugfix", "bug fix") >= 90);
/// assert_eq!(ratio("abc", "xyz"), 0);
/// ```
pub fn ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100;
    }
    let common = lcs_len(&a, &b);
    ((200 * common) as f64 / total as f64).round() as u8
}

/// Snaps `category` to the first canonical category, in preferred order,
/// that scores at least [`MATCH_THRESHOLD`]. Comparison ignores case.
/// Unmatched text is returned unchanged.
///
/// ## Examples
///
/// ```
/// use changelog_lib::similarity::normalize_category;
///
/// assert_eq!(normalize_category("bugfix"), "Bug Fix");
/// assert_eq!(normalize_category("Improvements"), "Improvement");
/// assert_eq!(normalize_category("Experimental Feature"), "Experimental Feature");
/// ```
pub fn normalize_category(category: &str) -> String {
    let lowered = category.to_lowercase();
    CATEGORIES_PREFERRED_ORDER
        .iter()
        .find(|canonical| ratio(&lowered, &canonical.to_lowercase()) >= MATCH_THRESHOLD)
        .map_or_else(|| category.to_string(), |canonical| canonical.to_string())
}
