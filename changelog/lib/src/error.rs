//! Error types for changelog generation.
//!
//! Only [`RefResolutionError`] and the unrecoverable backend variants of
//! [`ChangelogError`] ever fail a run. Everything that goes wrong for a
//! single pull request is logged by the pool and drops that pull request.

use thiserror::Error;

/// Errors raised by the local version-control runner.
#[derive(Debug, Error)]
pub enum VcsError {
    /// The ref or commit does not exist in the local repository.
    #[error("ref not found: {0}")]
    NotFound(String),

    /// A git command exited with a non-zero status.
    #[error("`{command}` failed with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The git binary could not be started.
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    /// Git produced output that could not be interpreted.
    #[error("unexpected git output: {0}")]
    InvalidOutput(String),
}

/// Errors raised while resolving the release range.
#[derive(Debug, Error)]
pub enum RefResolutionError {
    /// The requested ref does not exist.
    #[error("git ref `{0}` does not exist")]
    RefNotFound(String),

    /// No tag precedes the target ref once its own tags are excluded.
    #[error("no tag found before `{0}`")]
    NoPriorTag(String),

    /// Any other git failure while resolving.
    #[error(transparent)]
    Vcs(#[from] VcsError),
}

/// Errors raised by the issue tracker client.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Primary or secondary rate limit hit. Callers retry after a delay.
    #[error("issue tracker rate limit exceeded")]
    RateLimited,

    /// The requested object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The API answered with an error status.
    #[error("issue tracker API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transport or decoding failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl TrackerError {
    /// Returns `true` for the rate limit signal.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, TrackerError::RateLimited)
    }
}

/// Errors raised by the pull request record cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// Top level error for a changelog run.
#[derive(Debug, Error)]
pub enum ChangelogError {
    #[error(transparent)]
    RefResolution(#[from] RefResolutionError),

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for changelog operations.
pub type Result<T> = std::result::Result<T, ChangelogError>;
