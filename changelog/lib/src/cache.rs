//! Disk-backed pull request cache.
//!
//! Each pull request lives in its own `<number>.json` file together with the
//! time it was written. A cached copy is used only when it was written no
//! earlier than the tracker's last update of that pull request. Writes go
//! through a temporary file and a rename, so readers never see a partial
//! record and different keys never share state.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

use crate::classifier::BackportResolver;
use crate::error::CacheError;
use crate::github::IssueTracker;
use crate::retry::retry_on_rate_limit;
use crate::types::{PrNumber, PrSnapshot};

/// A persisted snapshot and the time it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub written_at: DateTime<Utc>,
    pub snapshot: PrSnapshot,
}

impl CacheEntry {
    /// Whether this entry may be served for a pull request last updated at
    /// `known_updated_at`. Without a known update time nothing is fresh.
    pub fn is_fresh(&self, known_updated_at: Option<DateTime<Utc>>) -> bool {
        match known_updated_at {
            Some(updated_at) => self.written_at >= updated_at,
            None => false,
        }
    }
}

/// Cache-or-fetch access to pull request snapshots.
#[derive(Debug)]
pub struct RecordCache<T> {
    tracker: Arc<T>,
    repo: String,
    dir: PathBuf,
    retry_delay: Duration,
}

impl<T: IssueTracker> RecordCache<T> {
    /// Opens (creating if needed) the cache directory.
    ///
    /// ## Errors
    ///
    /// Returns `CacheError::Io` if the directory cannot be created.
    pub fn new(
        tracker: Arc<T>,
        repo: impl Into<String>,
        dir: impl Into<PathBuf>,
        retry_delay: Duration,
    ) -> Result<Self, CacheError> {
        let dir = dir.into();
        create_private_dir(&dir)?;
        Ok(Self {
            tracker,
            repo: repo.into(),
            dir,
            retry_delay,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, number: PrNumber) -> PathBuf {
        self.dir.join(format!("{number}.json"))
    }

    /// Returns the snapshot for `number`, from disk when fresh, otherwise
    /// from the tracker.
    ///
    /// Rate limits are waited out here and never returned.
    ///
    /// ## Errors
    ///
    /// Non rate limit tracker failures and cache write failures.
    #[instrument(skip(self))]
    pub async fn get(
        &self,
        number: PrNumber,
        known_updated_at: Option<DateTime<Utc>>,
    ) -> Result<PrSnapshot, CacheError> {
        match self.load(number) {
            Ok(Some(entry)) if entry.is_fresh(known_updated_at) => {
                debug!("Cache hit for #{}", number);
                return Ok(entry.snapshot);
            }
            Ok(Some(_)) => debug!("Cache entry for #{} is stale", number),
            Ok(None) => debug!("Cache miss for #{}", number),
            Err(e) => warn!("Ignoring unreadable cache entry for #{}: {}", number, e),
        }

        let snapshot = retry_on_rate_limit(self.retry_delay, || {
            self.tracker.get_pr(&self.repo, number)
        })
        .await?;

        self.store(&snapshot)?;
        Ok(snapshot)
    }

    /// Reads the cached entry for `number`, if any.
    pub fn load(&self, number: PrNumber) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.entry_path(number);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Writes `snapshot` stamped with the current time.
    pub fn store(&self, snapshot: &PrSnapshot) -> Result<(), CacheError> {
        let entry = CacheEntry {
            written_at: Utc::now(),
            snapshot: snapshot.clone(),
        };

        let tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer(&mut writer, &entry)?;
            writer.flush()?;
        }
        tmp.persist(self.entry_path(snapshot.number))
            .map_err(|e| CacheError::Io(e.error))?;

        debug!("Cached #{} in {:?}", snapshot.number, self.dir);
        Ok(())
    }
}

impl<T: IssueTracker> BackportResolver for RecordCache<T> {
    async fn resolve_origin(&self, number: PrNumber) -> Result<PrSnapshot, CacheError> {
        self.get(number, None).await
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    if dir.is_dir() {
        return Ok(());
    }
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;
    use crate::github::SearchPage;
    use crate::types::Author;
    use chrono::{Duration as ChronoDuration, NaiveDate};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    fn snapshot(number: PrNumber, title: &str) -> PrSnapshot {
        PrSnapshot {
            number,
            author: Author {
                login: "octocat".into(),
                name: None,
                html_url: "https://github.com/octocat".into(),
            },
            html_url: format!("https://github.com/owner/repo/pull/{number}"),
            title: title.into(),
            body: Some("### Changelog category\nBug Fix".into()),
            merge_commit_sha: Some("abc".into()),
            head_ref: "fix".into(),
            updated_at: Utc::now() - ChronoDuration::days(1),
        }
    }

    /// Tracker returning scripted responses and counting calls.
    #[derive(Default)]
    struct ScriptedTracker {
        responses: Mutex<VecDeque<Result<PrSnapshot, TrackerError>>>,
        calls: AtomicU32,
    }

    impl ScriptedTracker {
        fn with(responses: Vec<Result<PrSnapshot, TrackerError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicU32::new(0),
            })
        }
    }

    impl IssueTracker for ScriptedTracker {
        async fn search_merged_prs(
            &self,
            _repo: &str,
            _from: NaiveDate,
            _to: NaiveDate,
            _page: usize,
        ) -> Result<SearchPage, TrackerError> {
            Ok(SearchPage::default())
        }

        async fn get_pr(&self, _repo: &str, number: PrNumber) -> Result<PrSnapshot, TrackerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TrackerError::NotFound(format!("pull {number}"))))
        }
    }

    fn cache(tracker: Arc<ScriptedTracker>) -> (RecordCache<ScriptedTracker>, TempDir) {
        let temp = TempDir::new().unwrap();
        let cache = RecordCache::new(
            tracker,
            "owner/repo",
            temp.path().join("gh_cache"),
            Duration::from_millis(1),
        )
        .unwrap();
        (cache, temp)
    }

    #[tokio::test]
    async fn miss_fetches_and_persists() {
        let tracker = ScriptedTracker::with(vec![Ok(snapshot(7, "first"))]);
        let (cache, _temp) = cache(tracker.clone());

        let pr = cache.get(7, Some(Utc::now())).await.unwrap();
        assert_eq!(pr.title, "first");
        assert_eq!(tracker.calls.load(Ordering::SeqCst), 1);

        let stored = cache.load(7).unwrap().unwrap();
        assert_eq!(stored.snapshot, pr);
    }

    #[tokio::test]
    async fn fresh_hit_skips_the_tracker() {
        let tracker = ScriptedTracker::with(vec![Ok(snapshot(7, "first"))]);
        let (cache, _temp) = cache(tracker.clone());

        let updated_at = Utc::now() - ChronoDuration::hours(1);
        cache.get(7, Some(updated_at)).await.unwrap();
        let again = cache.get(7, Some(updated_at)).await.unwrap();

        assert_eq!(again.title, "first");
        assert_eq!(tracker.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_hit_refetches() {
        let tracker =
            ScriptedTracker::with(vec![Ok(snapshot(7, "first")), Ok(snapshot(7, "second"))]);
        let (cache, _temp) = cache(tracker.clone());

        cache.get(7, None).await.unwrap();
        let updated_later = Utc::now() + ChronoDuration::hours(1);
        let pr = cache.get(7, Some(updated_later)).await.unwrap();

        assert_eq!(pr.title, "second");
        assert_eq!(tracker.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_update_time_always_refetches() {
        let tracker =
            ScriptedTracker::with(vec![Ok(snapshot(7, "first")), Ok(snapshot(7, "second"))]);
        let (cache, _temp) = cache(tracker.clone());

        cache.get(7, None).await.unwrap();
        let pr = cache.get(7, None).await.unwrap();
        assert_eq!(pr.title, "second");
    }

    #[tokio::test]
    async fn rate_limits_are_retried_not_returned() {
        let tracker = ScriptedTracker::with(vec![
            Err(TrackerError::RateLimited),
            Err(TrackerError::RateLimited),
            Ok(snapshot(9, "after wait")),
        ]);
        let (cache, _temp) = cache(tracker.clone());

        let pr = cache.get(9, None).await.unwrap();
        assert_eq!(pr.title, "after wait");
        assert_eq!(tracker.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_tracker_errors_propagate() {
        let tracker = ScriptedTracker::with(vec![]);
        let (cache, _temp) = cache(tracker);

        let err = cache.get(1, None).await.unwrap_err();
        assert!(matches!(err, CacheError::Tracker(TrackerError::NotFound(_))));
    }

    #[tokio::test]
    async fn corrupt_entry_is_refetched() {
        let tracker = ScriptedTracker::with(vec![Ok(snapshot(3, "fresh"))]);
        let (cache, _temp) = cache(tracker);

        fs::write(cache.dir().join("3.json"), "{ not json").unwrap();
        let pr = cache.get(3, Some(Utc::now())).await.unwrap();
        assert_eq!(pr.title, "fresh");
        assert!(cache.load(3).unwrap().is_some());
    }

    #[tokio::test]
    async fn concurrent_writers_on_different_keys() {
        let responses = (1..=20).map(|n| Ok(snapshot(n, &format!("pr {n}")))).collect();
        let tracker = ScriptedTracker::with(responses);
        let (cache, _temp) = cache(tracker);
        let cache = Arc::new(cache);

        let mut handles = Vec::new();
        for _ in 1..=20 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.get(0, None).await }));
        }
        let mut numbers: Vec<PrNumber> = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap().unwrap().number);
        }
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=20).collect::<Vec<_>>());

        for n in 1..=20 {
            let entry = cache.load(n).unwrap().unwrap();
            assert_eq!(entry.snapshot.title, format!("pr {n}"));
        }
    }

    #[test]
    fn freshness_rule() {
        let now = Utc::now();
        let entry = CacheEntry {
            written_at: now,
            snapshot: snapshot(1, "t"),
        };
        assert!(entry.is_fresh(Some(now)));
        assert!(entry.is_fresh(Some(now - ChronoDuration::seconds(1))));
        assert!(!entry.is_fresh(Some(now + ChronoDuration::seconds(1))));
        assert!(!entry.is_fresh(None));
    }

    #[cfg(unix)]
    #[test]
    fn cache_dir_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let tracker = ScriptedTracker::with(vec![]);
        let (cache, _temp) = cache(tracker);
        let mode = fs::metadata(cache.dir()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
