//! GitHub REST client for merged pull requests.
//!
//! [`IssueTracker`] is the seam the pipeline uses; [`GitHubClient`] talks to
//! the v3 REST API. Rate limits surface as [`TrackerError::RateLimited`] and
//! are retried by the caller, never here.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::config::{Auth, DEFAULT_API_BASE};
use crate::error::TrackerError;
use crate::types::{Author, Issue, PrNumber, PrSnapshot};

/// Search results per page (GitHub maximum).
const PER_PAGE: usize = 100;

/// GitHub search never returns more than this many results.
pub const SEARCH_RESULT_CAP: usize = 1000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = "changelog-lib";

/// Operations the changelog needs from the issue tracker.
pub trait IssueTracker: Send + Sync {
    /// One page of merged pull requests in `repo` merged within
    /// `from..=to`, 1-based `page`, plus the total hit count.
    fn search_merged_prs(
        &self,
        repo: &str,
        from: NaiveDate,
        to: NaiveDate,
        page: usize,
    ) -> impl Future<Output = Result<SearchPage, TrackerError>> + Send;

    /// Full snapshot of one pull request.
    fn get_pr(
        &self,
        repo: &str,
        number: PrNumber,
    ) -> impl Future<Output = Result<PrSnapshot, TrackerError>> + Send;
}

/// One page of search hits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub total_count: usize,
    pub items: Vec<Issue>,
}

impl SearchPage {
    /// Whether another page should be requested after `page`.
    pub fn has_more(&self, page: usize) -> bool {
        let seen = page * PER_PAGE;
        self.items.len() == PER_PAGE && seen < self.total_count.min(SEARCH_RESULT_CAP)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    total_count: usize,
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    number: PrNumber,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    number: PrNumber,
    html_url: String,
    title: String,
    body: Option<String>,
    merge_commit_sha: Option<String>,
    head: HeadRef,
    user: UserRef,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct HeadRef {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct UserRef {
    login: String,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct UserProfile {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubError {
    message: String,
}

/// [`IssueTracker`] over the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    api_base: String,
    auth: Auth,
}

impl Default for GitHubClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE, Auth::Anonymous)
    }
}

impl GitHubClient {
    /// Creates a client for `api_base` (e.g. `https://api.github.com`).
    pub fn new(api_base: impl Into<String>, auth: Auth) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            auth,
        }
    }

    fn request(&self, url: &str) -> RequestBuilder {
        let request = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .timeout(REQUEST_TIMEOUT);

        match &self.auth {
            Auth::Anonymous => request,
            Auth::Token(token) => request.header("Authorization", format!("Bearer {token}")),
            Auth::Basic { user, password } => request.basic_auth(user, Some(password)),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, TrackerError> {
        let response = self.request(url).query(query).send().await?;
        let response = check_status(response, url).await?;
        Ok(response.json().await?)
    }

    /// Profile display name; `None` when the user is gone or has no name.
    async fn user_name(&self, login: &str) -> Result<Option<String>, TrackerError> {
        let url = format!("{}/users/{}", self.api_base, login);
        match self.get_json::<UserProfile>(&url, &[]).await {
            Ok(profile) => Ok(profile.name.filter(|n| !n.trim().is_empty())),
            Err(TrackerError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Maps error statuses to [`TrackerError`], detecting rate limits.
async fn check_status(response: Response, url: &str) -> Result<Response, TrackerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(TrackerError::RateLimited);
    }

    let exhausted = response
        .headers()
        .get("X-RateLimit-Remaining")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u32>().ok())
        == Some(0);
    if status == StatusCode::FORBIDDEN && exhausted {
        return Err(TrackerError::RateLimited);
    }

    if status == StatusCode::NOT_FOUND {
        return Err(TrackerError::NotFound(url.to_string()));
    }

    let text = response.text().await?;
    let message = serde_json::from_str::<GitHubError>(&text)
        .map(|e| e.message)
        .unwrap_or(text);

    // Secondary rate limits come back as a plain 403 with this wording.
    if status == StatusCode::FORBIDDEN && message.to_lowercase().contains("rate limit") {
        return Err(TrackerError::RateLimited);
    }

    Err(TrackerError::Api {
        status: status.as_u16(),
        message,
    })
}

impl IssueTracker for GitHubClient {
    #[instrument(skip(self))]
    async fn search_merged_prs(
        &self,
        repo: &str,
        from: NaiveDate,
        to: NaiveDate,
        page: usize,
    ) -> Result<SearchPage, TrackerError> {
        let url = format!("{}/search/issues", self.api_base);
        let query = format!("type:pr repo:{repo} is:merged merged:{from}..{to}");
        let response: SearchResponse = self
            .get_json(
                &url,
                &[
                    ("q", query),
                    ("sort", "created".to_string()),
                    ("per_page", PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ],
            )
            .await?;

        debug!(
            "Search page {} returned {} of {} results",
            page,
            response.items.len(),
            response.total_count
        );

        Ok(SearchPage {
            total_count: response.total_count,
            items: response
                .items
                .into_iter()
                .map(|item| Issue {
                    number: item.number,
                    updated_at: item.updated_at,
                })
                .collect(),
        })
    }

    #[instrument(skip(self))]
    async fn get_pr(&self, repo: &str, number: PrNumber) -> Result<PrSnapshot, TrackerError> {
        let url = format!("{}/repos/{}/pulls/{}", self.api_base, repo, number);
        let pull: PullResponse = self.get_json(&url, &[]).await?;
        let name = self.user_name(&pull.user.login).await?;

        Ok(PrSnapshot {
            number: pull.number,
            author: Author {
                login: pull.user.login,
                name,
                html_url: pull.user.html_url,
            },
            html_url: pull.html_url,
            title: pull.title,
            body: pull.body,
            merge_commit_sha: pull.merge_commit_sha,
            head_ref: pull.head.name,
            updated_at: pull.updated_at,
        })
    }
}
