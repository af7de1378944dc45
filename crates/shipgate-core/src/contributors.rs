//! Contributor aggregation across one or more GitHub repositories.
//!
//! [`ContributorsAggregator::fetch_all`] walks every page of every
//! repository, then merges the records in a single serial pass:
//!
//! - records are keyed by login; contribution counts are summed
//! - the first repository (in input order) to mention a login is kept as
//!   its provenance
//! - a missing display name is looked up per login when enabled, and
//!   otherwise falls back to the login
//!
//! The resulting [`ProjectContributorsSnapshot`] is ordered by descending
//! contribution count, ties broken by ascending login.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::github::{
    ContributorEntry, ContributorPage, GitHubApiClient, GitHubError, GitHubResult, RetryPolicy,
};
use crate::remote::RepositoryIdentity;

/// Hard stop for pagination against a server that never reports a last page.
const MAX_PAGES: u32 = 1_000;

/// How often a retry backoff checks whether the run was aborted.
const ABORT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors from contributor aggregation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContributorsError {
    /// The API failed for one repository; `attempts` counts the tries made.
    #[error("failed to fetch contributors of {repository} after {attempts} attempt(s)")]
    Api {
        /// Repository whose fetch failed.
        repository: RepositoryIdentity,
        /// Number of attempts made for the failing page.
        attempts: u32,
        /// The final API error.
        #[source]
        source: GitHubError,
    },
}

impl ContributorsError {
    /// The underlying API error.
    pub const fn api_error(&self) -> &GitHubError {
        match self {
            Self::Api { source, .. } => source,
        }
    }
}

/// Result alias for contributor aggregation.
pub type ContributorsResult<T> = Result<T, ContributorsError>;

/// A single contributor of the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorRecord {
    /// GitHub login; unique within a snapshot.
    pub login: String,
    /// Display name, or the login when upstream had none.
    pub name: String,
    /// Commits attributed to the login across all aggregated repositories.
    pub contributions: u64,
    /// First repository the login was seen in.
    pub repository: RepositoryIdentity,
}

impl ContributorRecord {
    /// Build a record from an API entry, applying the display-name fallback.
    pub fn from_entry(entry: ContributorEntry, repository: &RepositoryIdentity) -> Self {
        let name = entry
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| entry.login.clone());
        Self {
            login: entry.login,
            name,
            contributions: entry.contributions,
            repository: repository.clone(),
        }
    }
}

/// Deduplicated, ranked contributors of a project.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ProjectContributorsSnapshot {
    contributors: Vec<ContributorRecord>,
}

impl ProjectContributorsSnapshot {
    /// Merge `records` by login and order the result.
    ///
    /// Records are processed in iteration order: the first record for a
    /// login fixes its repository, later ones add their counts.
    pub fn from_records(records: impl IntoIterator<Item = ContributorRecord>) -> Self {
        let mut by_login: HashMap<String, ContributorRecord> = HashMap::new();
        for record in records {
            match by_login.entry(record.login.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
                Entry::Occupied(mut slot) => {
                    let existing = slot.get_mut();
                    existing.contributions = existing.contributions.saturating_add(record.contributions);
                    if existing.name == existing.login && record.name != record.login {
                        existing.name = record.name;
                    }
                }
            }
        }
        Self::from_unique(by_login.into_values().collect())
    }

    /// Order already-unique records. Callers guarantee logins don't repeat.
    pub(crate) fn from_unique(mut contributors: Vec<ContributorRecord>) -> Self {
        contributors.sort_by(|a, b| {
            b.contributions
                .cmp(&a.contributions)
                .then_with(|| a.login.cmp(&b.login))
        });
        Self { contributors }
    }

    /// Contributors in ranking order.
    pub fn contributors(&self) -> &[ContributorRecord] {
        &self.contributors
    }

    /// Look up a contributor by login.
    pub fn get(&self, login: &str) -> Option<&ContributorRecord> {
        self.contributors.iter().find(|c| c.login == login)
    }

    /// Number of distinct contributors.
    pub fn len(&self) -> usize {
        self.contributors.len()
    }

    /// Whether the snapshot has no contributors.
    pub fn is_empty(&self) -> bool {
        self.contributors.is_empty()
    }

    /// Sum of all contribution counts.
    pub fn total_contributions(&self) -> u64 {
        self.contributors
            .iter()
            .fold(0u64, |acc, c| acc.saturating_add(c.contributions))
    }
}

/// Drives a [`GitHubApiClient`] across repositories and merges the results.
#[derive(Debug)]
pub struct ContributorsAggregator<C> {
    client: C,
    retry: RetryPolicy,
    resolve_names: bool,
}

/// Why a repository fetch stopped before its last page.
enum Halt {
    Failed(ContributorsError),
    /// Another repository failed first.
    Cancelled,
}

impl From<ContributorsError> for Halt {
    fn from(err: ContributorsError) -> Self {
        Self::Failed(err)
    }
}

/// State shared by the workers of one [`ContributorsAggregator::fetch_all`] call.
struct FetchRun<'a> {
    auth_token: Option<&'a str>,
    abort: AtomicBool,
    names: Mutex<HashMap<String, Option<String>>>,
}

impl<'a> FetchRun<'a> {
    fn new(auth_token: Option<&'a str>) -> Self {
        Self {
            auth_token,
            abort: AtomicBool::new(false),
            names: Mutex::new(HashMap::new()),
        }
    }

    fn aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    fn cancel_others(&self) {
        self.abort.store(true, Ordering::Release);
    }

    /// Sleep for `delay` unless the run is aborted meanwhile.
    ///
    /// Returns `false` when the run was aborted.
    fn pause(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            if self.aborted() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(ABORT_POLL_INTERVAL));
        }
    }

    fn cached_name(&self, login: &str) -> Option<Option<String>> {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(login)
            .cloned()
    }

    fn cache_name(&self, login: &str, name: Option<String>) {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(login.to_string(), name);
    }
}

impl<C: GitHubApiClient> ContributorsAggregator<C> {
    /// Aggregator with the default retry policy (3 attempts).
    pub fn new(client: C) -> Self {
        Self::with_retry_policy(client, RetryPolicy::default())
    }

    /// Aggregator with a custom retry policy.
    pub const fn with_retry_policy(client: C, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            resolve_names: false,
        }
    }

    /// Look up display names the contributors listing left out.
    ///
    /// Costs one [`GitHubApiClient::user_name`] call per distinct login.
    #[must_use]
    pub fn resolving_names(mut self, enabled: bool) -> Self {
        self.resolve_names = enabled;
        self
    }

    /// Fetch and merge the contributors of every repository in `identities`.
    ///
    /// Repositories are fetched concurrently; the merge happens afterwards
    /// in input order, so results don't depend on thread timing. Repeated
    /// identities are fetched once. A terminal failure in one repository
    /// stops the others before their next request, and the first failure
    /// in input order is returned.
    #[instrument(skip(self, identities, auth_token), fields(repositories = identities.len(), authenticated = auth_token.is_some()))]
    pub fn fetch_all(
        &self,
        identities: &[RepositoryIdentity],
        auth_token: Option<&str>,
    ) -> ContributorsResult<ProjectContributorsSnapshot> {
        let mut unique: Vec<&RepositoryIdentity> = Vec::with_capacity(identities.len());
        for identity in identities {
            if unique.contains(&identity) {
                debug!(repository = %identity, "skipping repeated repository");
            } else {
                unique.push(identity);
            }
        }

        let run = FetchRun::new(auth_token);
        let outcomes: Vec<Result<Vec<ContributorRecord>, Halt>> = thread::scope(|scope| {
            let run = &run;
            let handles: Vec<_> = unique
                .iter()
                .map(|identity| scope.spawn(move || self.fetch_repository(identity, run)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        });

        let mut all_records = Vec::new();
        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(records) => all_records.extend(records),
                Err(Halt::Failed(err)) => {
                    first_error.get_or_insert(err);
                }
                // Only happens after some repository failed
                Err(Halt::Cancelled) => {}
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        let snapshot = ProjectContributorsSnapshot::from_records(all_records);
        info!(
            contributors = snapshot.len(),
            contributions = snapshot.total_contributions(),
            "aggregated contributors"
        );
        Ok(snapshot)
    }

    /// Fetch every page of one repository.
    #[instrument(skip(self, run), fields(repository = %identity))]
    fn fetch_repository(
        &self,
        identity: &RepositoryIdentity,
        run: &FetchRun<'_>,
    ) -> Result<Vec<ContributorRecord>, Halt> {
        let page_size = self.client.page_size();
        let mut records = Vec::new();

        for page in 1..=MAX_PAGES {
            let ContributorPage {
                records: entries,
                has_more,
            } = self.with_retries(identity, run, || {
                self.client.list_contributors(identity, run.auth_token, page)
            })?;
            let count = entries.len();
            for mut entry in entries {
                if self.resolve_names && entry.name.is_none() {
                    entry.name = self.display_name(identity, &entry.login, run)?;
                }
                records.push(ContributorRecord::from_entry(entry, identity));
            }
            debug!(page, count, has_more, "fetched contributors page");

            if !has_more || count < page_size {
                return Ok(records);
            }
        }

        warn!(max_pages = MAX_PAGES, "stopped paginating at page limit");
        Ok(records)
    }

    /// Display name of `login`, looked up once per run.
    fn display_name(
        &self,
        identity: &RepositoryIdentity,
        login: &str,
        run: &FetchRun<'_>,
    ) -> Result<Option<String>, Halt> {
        if let Some(name) = run.cached_name(login) {
            return Ok(name);
        }
        let name = self.with_retries(identity, run, || {
            self.client.user_name(identity, login, run.auth_token)
        })?;
        run.cache_name(login, name.clone());
        Ok(name)
    }

    /// Run one API call, retrying transient failures with bounded backoff.
    ///
    /// A final failure aborts the rest of the run.
    fn with_retries<T>(
        &self,
        identity: &RepositoryIdentity,
        run: &FetchRun<'_>,
        mut call: impl FnMut() -> GitHubResult<T>,
    ) -> Result<T, Halt> {
        let mut attempt = 1;
        loop {
            if run.aborted() {
                debug!("another repository failed, stopping");
                return Err(Halt::Cancelled);
            }
            match call() {
                Ok(result) => return Ok(result),
                Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_after(attempt, err.retry_after());
                    warn!(
                        error = %err,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "transient GitHub failure, retrying"
                    );
                    if !run.pause(delay) {
                        return Err(Halt::Cancelled);
                    }
                    attempt += 1;
                }
                Err(err) => {
                    run.cancel_others();
                    return Err(ContributorsError::Api {
                        repository: identity.clone(),
                        attempts: attempt,
                        source: err,
                    }
                    .into());
                }
            }
        }
    }
}
