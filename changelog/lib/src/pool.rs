//! Concurrent fetch-and-classify workers.
//!
//! A fixed number of workers drain one shared queue of search hits. Each
//! worker keeps its own list of entries; the lists are concatenated once
//! every worker has finished, so no entry list is ever shared.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tracing::{Instrument, Span, debug, error, info, warn};

use crate::cache::RecordCache;
use crate::classifier::classify;
use crate::error::VcsError;
use crate::github::IssueTracker;
use crate::types::{CommitSet, Entry, Issue};
use crate::vcs::Vcs;

type Queue = Arc<Mutex<VecDeque<Issue>>>;

fn next_issue(queue: &Queue) -> Option<Issue> {
    match queue.lock() {
        Ok(mut guard) => guard.pop_front(),
        Err(poisoned) => poisoned.into_inner().pop_front(),
    }
}

/// Fetches, filters and classifies every issue using `jobs` workers.
///
/// A pull request is skipped when it has no merge commit, when the merge
/// commit is unknown to the local repository, or when the merge commit is
/// not in `commits`. Fetch failures and git failures while checking the
/// merge commit are logged as warnings and skip that pull request only.
/// Order of the returned entries is unspecified.
pub async fn classify_all<T, V>(
    issues: Vec<Issue>,
    cache: Arc<RecordCache<T>>,
    vcs: Arc<V>,
    commits: Arc<CommitSet>,
    jobs: usize,
) -> Vec<Entry>
where
    T: IssueTracker + 'static,
    V: Vcs + 'static,
{
    let workers = jobs.max(1).min(issues.len().max(1));
    info!("Processing {} PRs with {} workers", issues.len(), workers);

    let queue: Queue = Arc::new(Mutex::new(issues.into()));
    let handles: Vec<_> = (0..workers)
        .map(|id| {
            let queue = queue.clone();
            let cache = cache.clone();
            let vcs = vcs.clone();
            let commits = commits.clone();
            tokio::spawn(worker(id, queue, cache, vcs, commits).instrument(Span::current()))
        })
        .collect();

    let mut entries = Vec::new();
    for result in join_all(handles).await {
        match result {
            Ok(mut found) => entries.append(&mut found),
            Err(e) => error!("Worker failed: {}", e),
        }
    }
    entries
}

async fn worker<T: IssueTracker, V: Vcs>(
    id: usize,
    queue: Queue,
    cache: Arc<RecordCache<T>>,
    vcs: Arc<V>,
    commits: Arc<CommitSet>,
) -> Vec<Entry> {
    let mut entries = Vec::new();

    while let Some(issue) = next_issue(&queue) {
        let snapshot = match cache.get(issue.number, Some(issue.updated_at)).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Skipping PR #{}: {}", issue.number, e);
                continue;
            }
        };

        let Some(sha) = snapshot.merge_commit_sha.as_deref() else {
            info!("PR #{} has no merge commit, skipping", snapshot.number);
            continue;
        };

        match vcs.resolve_ref(sha).await {
            Ok(_) => {}
            Err(VcsError::NotFound(_)) => {
                info!(
                    "PR #{} merge commit {} is not in the repository, skipping",
                    snapshot.number, sha
                );
                continue;
            }
            Err(e) => {
                warn!(
                    "Skipping PR #{}: unable to check merge commit {}: {}",
                    snapshot.number, sha, e
                );
                continue;
            }
        }

        if !commits.contains(sha) {
            debug!("PR #{} merge commit {} is out of range", snapshot.number, sha);
            continue;
        }

        if let Some(entry) = classify(&snapshot, cache.as_ref()).await {
            entries.push(entry);
        }
    }

    debug!("Worker {} finished with {} entries", id, entries.len());
    entries
}
