//! Release changelog generation from merged pull requests.
//!
//! A run resolves the release range in a local git clone, searches the issue
//! tracker for pull requests merged in that window, fetches each one through
//! an on-disk cache, keeps those whose merge commit is in the range, and
//! classifies them into categories from their descriptions. The result is a
//! markdown document grouped by category.
//!
//! ## Examples
//!
//! ```no_run
//! use changelog_lib::{ChangelogConfig, generate_changelog};
//!
//! # #[tokio::main]
//! # async fn main() -> changelog_lib::Result<()> {
//! let config = ChangelogConfig {
//!     to_ref: "v23.8.1.2992-lts".into(),
//!     ..ChangelogConfig::default()
//! };
//! let document = generate_changelog(&config).await?;
//! println!("{document}");
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod github;
pub mod links;
pub mod parser;
pub mod pool;
pub mod refs;
pub mod renderer;
pub mod retry;
pub mod similarity;
pub mod types;
pub mod vcs;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local};
use tracing::{info, instrument, warn};

pub use config::{Auth, ChangelogConfig};
pub use error::{ChangelogError, Result};
pub use types::{Entry, PrSnapshot, ReleaseRange};

use crate::aggregator::aggregate;
use crate::cache::RecordCache;
use crate::error::TrackerError;
use crate::github::{GitHubClient, IssueTracker, SEARCH_RESULT_CAP};
use crate::links::IssueLinker;
use crate::pool::classify_all;
use crate::refs::{collect_commits, prepare_repository, resolve_range};
use crate::renderer::render_changelog;
use crate::retry::retry_on_rate_limit;
use crate::types::Issue;
use crate::vcs::{GitCli, Vcs};

/// Generates the changelog for `config` against the git clone in
/// `config.repo_dir` and the GitHub API at `config.api_base`.
///
/// ## Errors
///
/// Fails on unresolvable refs, git failures, a failed search, or an unusable
/// cache directory. Failures for individual pull requests are logged and
/// only drop that pull request.
pub async fn generate_changelog(config: &ChangelogConfig) -> Result<String> {
    let vcs = Arc::new(GitCli::new(&config.repo_dir));
    let tracker = Arc::new(GitHubClient::new(&config.api_base, config.auth.clone()));
    generate_changelog_with(config, vcs, tracker).await
}

/// [`generate_changelog`] with explicit collaborators.
#[instrument(skip_all, fields(repo = %config.repo, to_ref = %config.to_ref))]
pub async fn generate_changelog_with<V, T>(
    config: &ChangelogConfig,
    vcs: Arc<V>,
    tracker: Arc<T>,
) -> Result<String>
where
    V: Vcs + 'static,
    T: IssueTracker + 'static,
{
    if config.fetch {
        prepare_repository(vcs.as_ref()).await?;
    }

    let range = resolve_range(
        vcs.as_ref(),
        &config.to_ref,
        config.from_ref.as_deref(),
        config.with_testing_tags,
    )
    .await?;

    let commits = Arc::new(collect_commits(vcs.as_ref(), &range).await?);

    let issues =
        search_merged(tracker.as_ref(), &config.repo, &range, config.rate_limit_delay).await?;

    let cache = Arc::new(RecordCache::new(
        tracker,
        config.repo.clone(),
        config.cache_dir.clone(),
        config.rate_limit_delay,
    )?);

    let entries = classify_all(issues, cache, vcs, commits, config.jobs).await;
    let buckets = aggregate(entries);

    let linker = IssueLinker::new(config.issues_url());
    Ok(render_changelog(
        config.project_name(),
        &range,
        Local::now().year(),
        &buckets,
        &linker,
    ))
}

/// Walks every search result page for pull requests merged in `range`.
///
/// The search API stops after [`SEARCH_RESULT_CAP`] hits; a larger window is
/// logged as a warning and only the reachable hits are returned.
///
/// ## Errors
///
/// Any tracker error other than a rate limit, which is waited out.
pub async fn search_merged<T: IssueTracker>(
    tracker: &T,
    repo: &str,
    range: &ReleaseRange,
    retry_delay: Duration,
) -> std::result::Result<Vec<Issue>, TrackerError> {
    let mut issues = Vec::new();
    let mut page = 1;

    loop {
        let result = retry_on_rate_limit(retry_delay, || {
            tracker.search_merged_prs(repo, range.from_date, range.to_date, page)
        })
        .await?;

        if page == 1 {
            info!(
                "Found {} PRs merged in {}..{}",
                result.total_count, range.from_date, range.to_date
            );
            if result.total_count > SEARCH_RESULT_CAP {
                warn!(
                    "Search matched {} PRs but only the first {} can be fetched; the changelog will be incomplete",
                    result.total_count, SEARCH_RESULT_CAP
                );
            }
        }

        let more = result.has_more(page);
        issues.extend(result.items);
        if !more {
            break;
        }
        page += 1;
    }

    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::SearchPage;
    use crate::types::{PrNumber, PrSnapshot};
    use chrono::{NaiveDate, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports `total_count` hits but returns a fixed number per page.
    struct CountingTracker {
        total_count: usize,
        per_page: usize,
        pages: AtomicUsize,
    }

    impl IssueTracker for CountingTracker {
        async fn search_merged_prs(
            &self,
            _repo: &str,
            _from: NaiveDate,
            _to: NaiveDate,
            page: usize,
        ) -> std::result::Result<SearchPage, TrackerError> {
            self.pages.fetch_add(1, Ordering::SeqCst);
            let first = (page - 1) * self.per_page;
            Ok(SearchPage {
                total_count: self.total_count,
                items: (first..first + self.per_page)
                    .map(|n| Issue {
                        number: n as PrNumber,
                        updated_at: Utc::now(),
                    })
                    .collect(),
            })
        }

        async fn get_pr(
            &self,
            _repo: &str,
            number: PrNumber,
        ) -> std::result::Result<PrSnapshot, TrackerError> {
            Err(TrackerError::NotFound(format!("pull {number}")))
        }
    }

    fn range() -> ReleaseRange {
        ReleaseRange {
            from_ref: "v1.0".into(),
            to_ref: "v1.1".into(),
            from_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2023, 2, 1).unwrap(),
        }
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn oversized_search_is_reported_as_incomplete() {
        let tracker = CountingTracker {
            total_count: 1500,
            per_page: 100,
            pages: AtomicUsize::new(0),
        };

        let issues = search_merged(&tracker, "owner/repo", &range(), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(issues.len(), SEARCH_RESULT_CAP);
        assert_eq!(tracker.pages.load(Ordering::SeqCst), 10);
        assert!(logs_contain("Search matched 1500 PRs"));
        assert!(logs_contain("the changelog will be incomplete"));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn search_within_the_cap_is_not_reported() {
        let tracker = CountingTracker {
            total_count: 30,
            per_page: 30,
            pages: AtomicUsize::new(0),
        };

        let issues = search_merged(&tracker, "owner/repo", &range(), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(issues.len(), 30);
        assert!(!logs_contain("incomplete"));
    }
}
