//! Run configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default repository queried on the issue tracker.
pub const DEFAULT_REPO: &str = "ClickHouse/ClickHouse";

/// Default number of fetch workers.
pub const DEFAULT_JOBS: usize = 10;

/// Fixed delay between attempts after a rate limit response.
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(20);

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_WEB_BASE: &str = "https://github.com";

/// Environment variable overriding the cache directory.
pub const CACHE_DIR_ENV: &str = "CHANGELOG_CACHE_DIR";

/// Credentials for the issue tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    Anonymous,
    Token(String),
    Basic { user: String, password: String },
}

impl Auth {
    /// Builds credentials the way the CLI accepts them: a lone value is a
    /// token, a value plus password is a user login.
    pub fn from_parts(user_or_token: Option<String>, password: Option<String>) -> Self {
        match (user_or_token, password) {
            (Some(user), Some(password)) => Auth::Basic { user, password },
            (Some(token), None) => Auth::Token(token),
            (None, _) => match std::env::var("GITHUB_TOKEN") {
                Ok(token) if !token.is_empty() => Auth::Token(token),
                _ => Auth::Anonymous,
            },
        }
    }
}

/// Everything a changelog run needs to know.
#[derive(Debug, Clone)]
pub struct ChangelogConfig {
    /// `owner/name` of the repository on the tracker.
    pub repo: String,
    /// Project name used in the title line.
    pub project: Option<String>,
    pub to_ref: String,
    pub from_ref: Option<String>,
    pub with_testing_tags: bool,
    pub jobs: usize,
    pub cache_dir: PathBuf,
    pub rate_limit_delay: Duration,
    pub api_base: String,
    pub web_base: String,
    pub auth: Auth,
    /// Local clone the git commands run in.
    pub repo_dir: PathBuf,
    /// Unshallow and fetch tags before resolving refs.
    pub fetch: bool,
}

impl Default for ChangelogConfig {
    fn default() -> Self {
        Self {
            repo: DEFAULT_REPO.to_string(),
            project: None,
            to_ref: "HEAD".to_string(),
            from_ref: None,
            with_testing_tags: false,
            jobs: DEFAULT_JOBS,
            cache_dir: default_cache_dir(),
            rate_limit_delay: DEFAULT_RATE_LIMIT_DELAY,
            api_base: DEFAULT_API_BASE.to_string(),
            web_base: DEFAULT_WEB_BASE.to_string(),
            auth: Auth::Anonymous,
            repo_dir: PathBuf::from("."),
            fetch: true,
        }
    }
}

impl ChangelogConfig {
    /// Project name for the title: explicit, else the name part of `repo`.
    pub fn project_name(&self) -> &str {
        if let Some(project) = self.project.as_deref() {
            return project;
        }
        self.repo.rsplit('/').next().unwrap_or(&self.repo)
    }

    /// Base URL of issue pages, e.g. `https://github.com/owner/repo/issues/`.
    pub fn issues_url(&self) -> String {
        format!("{}/{}/issues/", self.web_base.trim_end_matches('/'), self.repo)
    }
}

/// `$CHANGELOG_CACHE_DIR`, else `<user cache dir>/changelog/gh_cache`.
pub fn default_cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CACHE_DIR_ENV)
        && !dir.is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("changelog")
        .join("gh_cache")
}
