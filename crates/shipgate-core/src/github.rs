//! GitHub contributors API boundary.
//!
//! [`GitHubApiClient`] fetches one page of contributors for one repository.
//! [`HttpGitHubClient`] implements it over the REST endpoint
//! `GET /repos/{owner}/{repo}/contributors`, and resolves display names
//! through `GET /users/{login}` because the contributors endpoint carries
//! none. GitHub documents the contributors endpoint
//! as cached ("may return information that is a few hours old"), so callers
//! are free to retry transient failures with backoff.
//!
//! Failures are classified here and nowhere else: authentication and
//! missing repositories are terminal, rate limiting and network trouble are
//! [`GitHubError::Transient`].

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, LINK, RETRY_AFTER, USER_AGENT};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::remote::RepositoryIdentity;

/// Public GitHub API root.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Largest page size the contributors endpoint accepts.
pub const MAX_PAGE_SIZE: usize = 100;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the GitHub API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GitHubError {
    /// The token was rejected (401, or 403 without rate-limit headers).
    #[error("GitHub rejected the credentials for {repository} (HTTP {status}): {message}")]
    Authentication {
        /// Repository being fetched.
        repository: String,
        /// HTTP status code.
        status: u16,
        /// Message from the response body.
        message: String,
    },

    /// The repository does not exist or is not visible to the token.
    #[error("repository {repository} not found on GitHub")]
    RepositoryNotFound {
        /// Repository being fetched.
        repository: String,
    },

    /// Rate limiting, server errors, or network failures.
    #[error("transient GitHub failure for {repository}: {message}")]
    Transient {
        /// Repository being fetched.
        repository: String,
        /// What went wrong.
        message: String,
        /// Server-requested wait before the next attempt, if any.
        retry_after: Option<Duration>,
    },

    /// The HTTP client could not be set up.
    #[error("failed to set up the GitHub HTTP client: {message}")]
    Client {
        /// What the HTTP stack reported.
        message: String,
    },

    /// A response that could not be interpreted.
    #[error("unexpected GitHub response for {repository}: {message}")]
    InvalidResponse {
        /// Repository being fetched.
        repository: String,
        /// What was wrong with it.
        message: String,
    },
}

impl GitHubError {
    /// Whether retrying the same request may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Server-requested delay attached to a transient failure.
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Result alias for GitHub API calls.
pub type GitHubResult<T> = Result<T, GitHubError>;

/// One contributor entry as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContributorEntry {
    /// GitHub login.
    pub login: String,
    /// Display name, when the upstream data carries one.
    #[serde(default)]
    pub name: Option<String>,
    /// Number of commits attributed to the login.
    pub contributions: u64,
}

/// One page of contributors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContributorPage {
    /// Entries on this page.
    pub records: Vec<ContributorEntry>,
    /// Whether the server advertised a further page.
    pub has_more: bool,
}

/// Paginated access to a repository's contributors.
///
/// Implementations must be shareable across threads: the aggregator
/// fetches several repositories concurrently.
pub trait GitHubApiClient: Sync {
    /// Fetch page `page` (1-based) of contributors for `identity`.
    fn list_contributors(
        &self,
        identity: &RepositoryIdentity,
        auth_token: Option<&str>,
        page: u32,
    ) -> GitHubResult<ContributorPage>;

    /// Display name of the user `login`, seen as a contributor of `identity`.
    ///
    /// `None` when the user set no name. The default knows no names.
    fn user_name(
        &self,
        _identity: &RepositoryIdentity,
        _login: &str,
        _auth_token: Option<&str>,
    ) -> GitHubResult<Option<String>> {
        Ok(None)
    }

    /// Entries requested per page. A shorter page ends pagination.
    fn page_size(&self) -> usize {
        MAX_PAGE_SIZE
    }
}

impl<C: GitHubApiClient + ?Sized> GitHubApiClient for &C {
    fn list_contributors(
        &self,
        identity: &RepositoryIdentity,
        auth_token: Option<&str>,
        page: u32,
    ) -> GitHubResult<ContributorPage> {
        (**self).list_contributors(identity, auth_token, page)
    }

    fn user_name(
        &self,
        identity: &RepositoryIdentity,
        login: &str,
        auth_token: Option<&str>,
    ) -> GitHubResult<Option<String>> {
        (**self).user_name(identity, login, auth_token)
    }

    fn page_size(&self) -> usize {
        (**self).page_size()
    }
}

/// Bounded exponential backoff for transient failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubled for each further one.
    pub base_delay: Duration,
    /// Upper bound for any single delay, including `Retry-After` values.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy with `max_attempts` attempts and the default delays.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Delay before the attempt following failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let delay = retry_after.unwrap_or_else(|| {
            let exponent = attempt.saturating_sub(1).min(16);
            self.base_delay.saturating_mul(1 << exponent)
        });
        delay.min(self.max_delay)
    }
}

/// [`GitHubApiClient`] over the GitHub REST API.
#[derive(Debug, Clone)]
pub struct HttpGitHubClient {
    client: Client,
    api_url: String,
    page_size: usize,
}

impl HttpGitHubClient {
    /// Client for `api_url` (e.g. [`DEFAULT_API_URL`] or a GitHub Enterprise root).
    ///
    /// `page_size` is clamped to `1..=100`.
    pub fn new(api_url: &str, page_size: usize, timeout: Duration) -> GitHubResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GitHubError::Client {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        })
    }

    fn contributors_url(&self, identity: &RepositoryIdentity) -> String {
        format!(
            "{}/repos/{}/{}/contributors",
            self.api_url,
            identity.owner(),
            identity.name()
        )
    }

    fn user_url(&self, login: &str) -> String {
        format!("{}/users/{login}", self.api_url)
    }

    fn get(&self, url: String, auth_token: Option<&str>) -> RequestBuilder {
        let request = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, concat!("shipgate/", env!("CARGO_PKG_VERSION")));
        match auth_token.filter(|t| !t.is_empty()) {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }
}

impl GitHubApiClient for HttpGitHubClient {
    #[instrument(skip(self, auth_token), fields(repository = %identity, authenticated = auth_token.is_some()))]
    fn list_contributors(
        &self,
        identity: &RepositoryIdentity,
        auth_token: Option<&str>,
        page: u32,
    ) -> GitHubResult<ContributorPage> {
        let response = self
            .get(self.contributors_url(identity), auth_token)
            .query(&[("per_page", self.page_size), ("page", page as usize)])
            .send()
            .map_err(|e| send_failure(identity, &e))?;

        let status = response.status();
        debug!(status = status.as_u16(), page, "contributors response");
        if status == StatusCode::NO_CONTENT {
            // Empty repositories answer 204 with no body
            return Ok(ContributorPage::default());
        }
        if !status.is_success() || status == StatusCode::ACCEPTED {
            return Err(classify_failure(identity, response));
        }

        let has_more = has_next_link(response.headers());
        let records: Vec<ContributorEntry> =
            response.json().map_err(|e| GitHubError::InvalidResponse {
                repository: identity.to_string(),
                message: format!("failed to parse contributors: {e}"),
            })?;

        Ok(ContributorPage { records, has_more })
    }

    #[instrument(skip(self, identity, auth_token), fields(repository = %identity))]
    fn user_name(
        &self,
        identity: &RepositoryIdentity,
        login: &str,
        auth_token: Option<&str>,
    ) -> GitHubResult<Option<String>> {
        let response = self
            .get(self.user_url(login), auth_token)
            .send()
            .map_err(|e| send_failure(identity, &e))?;

        let status = response.status();
        debug!(status = status.as_u16(), "user response");
        if status == StatusCode::NOT_FOUND {
            // Deleted accounts still show up in contributor lists
            return Ok(None);
        }
        if !status.is_success() || status == StatusCode::ACCEPTED {
            return Err(classify_failure(identity, response));
        }

        let profile: UserProfile = response.json().map_err(|e| GitHubError::InvalidResponse {
            repository: identity.to_string(),
            message: format!("failed to parse user {login}: {e}"),
        })?;
        Ok(profile.display_name())
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}

/// The part of `GET /users/{login}` shipgate reads.
#[derive(Debug, Deserialize)]
struct UserProfile {
    #[serde(default)]
    name: Option<String>,
}

impl UserProfile {
    fn display_name(self) -> Option<String> {
        self.name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
    }
}

/// A request that never got a response; the network may recover.
fn send_failure(identity: &RepositoryIdentity, err: &reqwest::Error) -> GitHubError {
    GitHubError::Transient {
        repository: identity.to_string(),
        message: err.to_string(),
        retry_after: None,
    }
}

fn classify_failure(identity: &RepositoryIdentity, response: Response) -> GitHubError {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.text().unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    classify_status(identity, status, &headers, message)
}

fn classify_status(
    identity: &RepositoryIdentity,
    status: StatusCode,
    headers: &HeaderMap,
    message: String,
) -> GitHubError {
    let repository = identity.to_string();
    let retry_after = retry_after(headers);
    let rate_limited = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0")
        || message.to_ascii_lowercase().contains("rate limit");

    match status {
        StatusCode::NOT_FOUND => GitHubError::RepositoryNotFound { repository },
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS if rate_limited => {
            GitHubError::Transient {
                repository,
                message,
                retry_after,
            }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GitHubError::Authentication {
            repository,
            status: status.as_u16(),
            message,
        },
        StatusCode::TOO_MANY_REQUESTS | StatusCode::ACCEPTED => GitHubError::Transient {
            repository,
            message,
            retry_after,
        },
        s if s.is_server_error() => GitHubError::Transient {
            repository,
            message,
            retry_after,
        },
        _ => GitHubError::InvalidResponse {
            repository,
            message,
        },
    }
}

/// Pull the `message` field out of a GitHub error body.
fn error_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.message)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Whether a `Link` header advertises a `rel="next"` page.
fn has_next_link(headers: &HeaderMap) -> bool {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|link| {
            link.split(';')
                .skip(1)
                .any(|param| param.trim().replace(' ', "") == "rel=\"next\"")
        })
}
