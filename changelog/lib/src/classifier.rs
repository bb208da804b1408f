//! Pull request classification.
//!
//! Maps a snapshot to a changelog [`Entry`], or to nothing for documentation
//! changes. Backports (`backport/<base>/<number>` branches) are classified
//! from the description of the pull request they were backported from.

use std::future::Future;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use crate::error::CacheError;
use crate::parser::parse_description;
use crate::similarity::normalize_category;
use crate::types::{
    Entry, NO_CL_CATEGORY, NO_CL_ENTRY, NOT_FOR_CHANGELOG, PrNumber, PrSnapshot,
};

lazy_static! {
    static ref NOT_SIGNIFICANT: Regex =
        Regex::new(r"(?i)^(?:(?:non|in|not|un)[-\s]*significant|not *for *changelog)").unwrap();
    static ref DOCUMENTATION: Regex = Regex::new(r"(?i)^doc").unwrap();
}

const BACKPORT_PREFIX: &str = "backport/";

/// Fetches the pull request a backport originates from.
pub trait BackportResolver: Send + Sync {
    fn resolve_origin(
        &self,
        number: PrNumber,
    ) -> impl Future<Output = Result<PrSnapshot, CacheError>> + Send;
}

/// What a source branch name says about backporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackportBranch {
    /// Not a backport branch.
    None,
    /// `backport/<base>/<number>`: backported from `number`.
    Origin(PrNumber),
    /// Starts with `backport/` but does not follow the pattern.
    Malformed,
}

/// Reads a source branch name.
///
/// ## Examples
///
/// ```
/// use changelog_lib::classifier::{BackportBranch, parse_backport_branch};
///
/// assert_eq!(parse_backport_branch("backport/23.8/12345"), BackportBranch::Origin(12345));
/// assert_eq!(parse_backport_branch("backport/23.8"), BackportBranch::Malformed);
/// assert_eq!(parse_backport_branch("fix-crash"), BackportBranch::None);
/// ```
pub fn parse_backport_branch(head_ref: &str) -> BackportBranch {
    if !head_ref.starts_with(BACKPORT_PREFIX) {
        return BackportBranch::None;
    }
    let parts: Vec<&str> = head_ref.split('/').collect();
    match parts.as_slice() {
        [_, _, number] => number
            .parse()
            .map_or(BackportBranch::Malformed, BackportBranch::Origin),
        _ => BackportBranch::Malformed,
    }
}

/// Classifies `snapshot`, following backport branches through `resolver`.
///
/// A backport whose origin cannot be fetched, or whose branch name is
/// malformed, is classified as an ordinary pull request.
pub async fn classify<R: BackportResolver>(snapshot: &PrSnapshot, resolver: &R) -> Option<Entry> {
    let origin = match parse_backport_branch(&snapshot.head_ref) {
        BackportBranch::None => None,
        BackportBranch::Origin(number) => match resolver.resolve_origin(number).await {
            Ok(origin) => Some(origin),
            Err(e) => {
                warn!("Unable to get backported PR #{}: {}", number, e);
                None
            }
        },
        BackportBranch::Malformed => {
            warn!(
                "The branch {} doesn't match backport template, using PR #{} as is",
                snapshot.head_ref, snapshot.number
            );
            None
        }
    };

    classify_snapshot(snapshot, origin.as_ref())
}

/// Classifies a snapshot whose backport origin, if any, is already known.
///
/// Rules, in order:
/// 1. no category → `NO CL CATEGORY`
/// 2. "not significant" / "not for changelog" → `NOT FOR CHANGELOG /
///    INSIGNIFICANT` with the title as text, returned as is
/// 3. documentation → excluded (`None`)
/// 4. backport → text prefixed with `Backported in #<number>: `
/// 5. no entry text → `NO CL ENTRY` with `NO CL ENTRY: '<title>'`
/// 6. text trimmed and terminated with a period
/// 7. category snapped to the canonical list
///
/// The entry carries the number, URL and author of the origin pull request
/// when there is one.
pub fn classify_snapshot(surfaced: &PrSnapshot, origin: Option<&PrSnapshot>) -> Option<Entry> {
    let source = origin.unwrap_or(surfaced);
    let parsed = parse_description(source.body.as_deref().unwrap_or_default());

    let mut category = parsed
        .category
        .unwrap_or_else(|| NO_CL_CATEGORY.to_string());

    if NOT_SIGNIFICANT.is_match(&category) {
        return Some(make_entry(source, source.title.clone(), NOT_FOR_CHANGELOG.to_string()));
    }

    if DOCUMENTATION.is_match(&category) {
        return None;
    }

    let mut text = parsed.entry;
    if source.number != surfaced.number {
        text = format!("Backported in #{}: {}", surfaced.number, text);
    }

    if text.is_empty() {
        category = NO_CL_ENTRY.to_string();
        text = format!("NO CL ENTRY: '{}'", source.title);
    }

    let mut text = text.trim().to_string();
    if !text.ends_with('.') {
        text.push('.');
    }

    Some(make_entry(source, text, normalize_category(&category)))
}

fn make_entry(source: &PrSnapshot, text: String, category: String) -> Entry {
    Entry {
        number: source.number,
        author: source.author.display_name().to_string(),
        author_url: source.author.html_url.clone(),
        pr_url: source.html_url.clone(),
        text,
        category,
    }
}
