//! Local version-control access.
//!
//! [`Vcs`] is the seam the pipeline talks to; [`GitCli`] implements it by
//! running the `git` binary in a working directory.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::NaiveDate;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::VcsError;

/// Operations the changelog needs from the local repository.
///
/// Implementations must be `Send + Sync`; fetch workers share one instance.
pub trait Vcs: Send + Sync {
    /// Resolves a ref to a full commit hash.
    ///
    /// ## Errors
    ///
    /// `VcsError::NotFound` if the ref does not name a commit.
    fn resolve_ref(&self, reference: &str) -> impl Future<Output = Result<String, VcsError>> + Send;

    /// Tags pointing at the commit `reference` peels to.
    fn tags_pointing_at(
        &self,
        reference: &str,
    ) -> impl Future<Output = Result<Vec<String>, VcsError>> + Send;

    /// Nearest tag reachable from `reference`, ignoring tags matching any
    /// pattern in `exclude`.
    ///
    /// ## Errors
    ///
    /// `VcsError::NotFound` if no tag qualifies.
    fn describe_nearest_tag(
        &self,
        reference: &str,
        exclude: &[String],
    ) -> impl Future<Output = Result<String, VcsError>> + Send;

    /// Committer date of the commit `reference` peels to.
    fn commit_date(&self, reference: &str)
    -> impl Future<Output = Result<NaiveDate, VcsError>> + Send;

    fn is_shallow(&self) -> impl Future<Output = Result<bool, VcsError>> + Send;

    fn unshallow(&self) -> impl Future<Output = Result<(), VcsError>> + Send;

    fn fetch_tags(&self) -> impl Future<Output = Result<(), VcsError>> + Send;

    /// Commits reachable from `to` but not from `from`.
    fn commits_between(
        &self,
        from: &str,
        to: &str,
    ) -> impl Future<Output = Result<Vec<String>, VcsError>> + Send;
}

/// [`Vcs`] backed by the `git` command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    workdir: PathBuf,
}

impl GitCli {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Runs git and returns trimmed stdout.
    async fn run<I, S>(&self, args: I) -> Result<String, VcsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
        let command = format!("git {}", args.join(" "));
        debug!("Running {}", command);

        let output = Command::new("git")
            .args(&args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(VcsError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Splits command output into non-empty lines.
fn lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

impl Vcs for GitCli {
    #[instrument(skip(self))]
    async fn resolve_ref(&self, reference: &str) -> Result<String, VcsError> {
        let spec = format!("{reference}^{{commit}}");
        match self.run(["rev-parse", "--verify", "--quiet", &spec]).await {
            Ok(hash) if !hash.is_empty() => Ok(hash),
            Ok(_) | Err(VcsError::CommandFailed { .. }) => {
                Err(VcsError::NotFound(reference.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn tags_pointing_at(&self, reference: &str) -> Result<Vec<String>, VcsError> {
        let spec = format!("{reference}^{{}}");
        let output = self.run(["tag", "--points-at", &spec]).await?;
        Ok(lines(&output))
    }

    #[instrument(skip(self))]
    async fn describe_nearest_tag(
        &self,
        reference: &str,
        exclude: &[String],
    ) -> Result<String, VcsError> {
        let mut args = vec![
            "describe".to_string(),
            "--abbrev=0".to_string(),
            "--tags".to_string(),
        ];
        args.extend(exclude.iter().map(|pattern| format!("--exclude={pattern}")));
        args.push(reference.to_string());

        match self.run(&args).await {
            Ok(tag) if !tag.is_empty() => Ok(tag),
            Ok(_) | Err(VcsError::CommandFailed { .. }) => {
                Err(VcsError::NotFound(reference.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn commit_date(&self, reference: &str) -> Result<NaiveDate, VcsError> {
        let spec = format!("{reference}^{{}}");
        let output = self.run(["log", "-1", "--format=format:%cs", &spec]).await?;
        NaiveDate::parse_from_str(&output, "%Y-%m-%d")
            .map_err(|e| VcsError::InvalidOutput(format!("commit date `{output}`: {e}")))
    }

    async fn is_shallow(&self) -> Result<bool, VcsError> {
        let output = self.run(["rev-parse", "--is-shallow-repository"]).await?;
        match output.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(VcsError::InvalidOutput(format!("is-shallow: `{other}`"))),
        }
    }

    async fn unshallow(&self) -> Result<(), VcsError> {
        self.run(["fetch", "--unshallow"]).await.map(|_| ())
    }

    async fn fetch_tags(&self) -> Result<(), VcsError> {
        self.run(["fetch", "--tags"]).await.map(|_| ())
    }

    async fn commits_between(&self, from: &str, to: &str) -> Result<Vec<String>, VcsError> {
        let range = format!("{from}..{to}");
        let output = self.run(["log", "--format=format:%H", &range]).await?;
        Ok(lines(&output))
    }
}
