//! Markdown changelog document.

use std::fmt::Write;

use crate::aggregator::Buckets;
use crate::links::IssueLinker;
use crate::types::{CATEGORIES_PREFERRED_ORDER, Entry, ReleaseRange};

/// Renders the changelog document.
///
/// Layout: front matter with the year, the title line naming the range, then
/// one `####` section per category. Canonical categories come first in their
/// fixed order; every other category (sentinels, unrecognized text) follows
/// in lexical order.
///
/// ## Examples
///
/// ```
/// use changelog_lib::aggregator::Buckets;
/// use changelog_lib::links::IssueLinker;
/// use changelog_lib::renderer::render_changelog;
/// use changelog_lib::types::ReleaseRange;
/// use chrono::NaiveDate;
///
/// let range = ReleaseRange {
///     from_ref: "v1.0".into(),
///     to_ref: "v1.1".into(),
///     from_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
///     to_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
/// };
/// let linker = IssueLinker::new("https://github.com/o/r/issues/");
/// let doc = render_changelog("r", &range, 2024, &Buckets::new(), &linker);
/// assert!(doc.contains("### r release v1.1 as compared to v1.0"));
/// ```
pub fn render_changelog(
    project: &str,
    range: &ReleaseRange,
    year: i32,
    buckets: &Buckets,
    linker: &IssueLinker,
) -> String {
    let mut out = String::new();

    let _ = write!(
        out,
        "---\nsidebar_position: 1\nsidebar_label: {year}\n---\n\n# {year} Changelog\n\n"
    );
    let _ = write!(
        out,
        "### {project} release {} as compared to {}\n\n",
        range.to_ref, range.from_ref
    );

    for category in CATEGORIES_PREFERRED_ORDER {
        if let Some(entries) = buckets.get(category) {
            let _ = writeln!(out, "#### {category}");
            write_entries(&mut out, entries, linker);
        }
    }

    // BTreeMap iteration is already lexical.
    for (category, entries) in buckets {
        if !CATEGORIES_PREFERRED_ORDER.contains(&category.as_str()) {
            let _ = write!(out, "#### {category}\n\n");
            write_entries(&mut out, entries, linker);
        }
    }

    out
}

fn write_entries(out: &mut String, entries: &[Entry], linker: &IssueLinker) {
    for entry in entries {
        let _ = writeln!(out, "{}", format_entry(entry, linker));
    }
    out.push('\n');
}

/// `* <text> [#<number>](<pr url>) ([<author>](<author url>)).`
pub fn format_entry(entry: &Entry, linker: &IssueLinker) -> String {
    format!(
        "* {} [#{}]({}) ([{}]({})).",
        linker.linkify(&entry.text),
        entry.number,
        entry.pr_url,
        entry.author,
        entry.author_url
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use crate::types::{NO_CL_CATEGORY, NOT_FOR_CHANGELOG};
    use chrono::NaiveDate;

    const ISSUES: &str = "https://github.com/owner/repo/issues/";

    fn range() -> ReleaseRange {
        ReleaseRange {
            from_ref: "v23.7.1.1-stable".into(),
            to_ref: "v23.8.1.1-stable".into(),
            from_date: NaiveDate::from_ymd_opt(2023, 7, 26).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2023, 9, 1).unwrap(),
        }
    }

    fn entry(number: u64, category: &str, text: &str) -> Entry {
        Entry {
            number,
            author: "Dev".into(),
            author_url: "https://github.com/dev".into(),
            pr_url: format!("https://github.com/owner/repo/pull/{number}"),
            text: text.into(),
            category: category.into(),
        }
    }

    #[test]
    fn entry_line_format() {
        let line = format_entry(&entry(1234, "Bug Fix", "Fixed #56789."), &IssueLinker::new(ISSUES));
        assert_eq!(
            line,
            "* Fixed [#56789](https://github.com/owner/repo/issues/56789). \
             [#1234](https://github.com/owner/repo/pull/1234) ([Dev](https://github.com/dev))."
        );
    }

    #[test]
    fn full_document_layout() {
        let buckets = aggregate(vec![
            entry(3, "Bug Fix", "Fix B."),
            entry(2, "New Feature", "Feature A."),
            entry(1, "Bug Fix", "Fix A."),
            entry(4, "Experimental Feature", "Exp."),
            entry(5, NOT_FOR_CHANGELOG, "Refactor"),
            entry(6, NO_CL_CATEGORY, "Oops."),
        ]);
        let doc = render_changelog("repo", &range(), 2023, &buckets, &IssueLinker::new(ISSUES));

        let expected = "\
---
sidebar_position: 1
sidebar_label: 2023
---

# 2023 Changelog

### repo release v23.8.1.1-stable as compared to v23.7.1.1-stable

#### New Feature
* Feature A. [#2](https://github.com/owner/repo/pull/2) ([Dev](https://github.com/dev)).

#### Bug Fix
* Fix A. [#1](https://github.com/owner/repo/pull/1) ([Dev](https://github.com/dev)).
* Fix B. [#3](https://github.com/owner/repo/pull/3) ([Dev](https://github.com/dev)).

#### Experimental Feature

* Exp. [#4](https://github.com/owner/repo/pull/4) ([Dev](https://github.com/dev)).

#### NO CL CATEGORY

* Oops. [#6](https://github.com/owner/repo/pull/6) ([Dev](https://github.com/dev)).

#### NOT FOR CHANGELOG / INSIGNIFICANT

* Refactor [#5](https://github.com/owner/repo/pull/5) ([Dev](https://github.com/dev)).

";
        assert_eq!(doc, expected);
    }

    #[test]
    fn empty_buckets_render_only_the_header() {
        let doc = render_changelog("repo", &range(), 2023, &Buckets::new(), &IssueLinker::new(ISSUES));
        assert!(doc.ends_with("as compared to v23.7.1.1-stable\n\n"));
        assert!(!doc.contains("####"));
    }
}
