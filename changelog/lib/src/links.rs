//! Issue reference linking for entry text.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    /// `#1234`, with the `[` of an existing link label if there is one.
    static ref ISSUE_REF: Regex = Regex::new(r"\[?#([0-9]{4,})").unwrap();
    /// An issues URL, with the `(` of an existing link target if there is one.
    static ref ISSUE_URL: Regex = Regex::new(r"\(?(https?://\S+?/issues/)([0-9]{4,})").unwrap();
}

/// Rewrites bare issue references into markdown links.
///
/// Both `#1234` and `<issues url>1234` become `[#1234](<issues url>1234)`.
/// References of fewer than four digits are left alone. Already linked
/// references are not touched, so linking twice changes nothing.
#[derive(Debug, Clone)]
pub struct IssueLinker {
    issues_url: String,
}

impl IssueLinker {
    /// `issues_url` is the issue page prefix, ending in `/issues/`.
    pub fn new(issues_url: impl Into<String>) -> Self {
        Self {
            issues_url: issues_url.into(),
        }
    }

    fn link(&self, number: &str) -> String {
        format!("[#{number}]({}{number})", self.issues_url)
    }

    /// ## Examples
    ///
    /// ```
    /// use changelog_lib::links::IssueLinker;
    ///
    /// let linker = IssueLinker::new("https://github.com/o/r/issues/");
    /// assert_eq!(
    ///     linker.linkify("Fixes #12345"),
    ///     "Fixes [#12345](https://github.com/o/r/issues/12345)"
    /// );
    /// assert_eq!(linker.linkify("see #123"), "see #123");
    /// ```
    pub fn linkify(&self, text: &str) -> String {
        // The opening bracket is matched, not excluded by a preceding
        // character class, so back to back references are all linked in one
        // pass.
        let text = ISSUE_REF.replace_all(text, |caps: &Captures| {
            if caps[0].starts_with('[') {
                caps[0].to_string()
            } else {
                self.link(&caps[1])
            }
        });

        ISSUE_URL
            .replace_all(&text, |caps: &Captures| {
                if caps[0].starts_with('(') || caps[1] != self.issues_url {
                    caps[0].to_string()
                } else {
                    self.link(&caps[2])
                }
            })
            .into_owned()
    }
}
