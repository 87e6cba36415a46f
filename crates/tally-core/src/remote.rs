use std::time::Duration;

use anyhow::{Context, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_BASE_URL: &str = "https://jsonplaceholder.typicode.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub user_id: u64,
    pub id: u64,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub name: String,
    #[serde(default)]
    pub catch_phrase: String,
    #[serde(default)]
    pub bs: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub website: String,
    pub company: Company,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub posts: String,
    pub users: String,
}

impl Endpoints {
    pub fn from_base_url(base_url: &str) -> anyhow::Result<Self> {
        let base = base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(anyhow!("api base URL is empty"));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(anyhow!("api base URL must be http(s): {base}"));
        }
        Ok(Self {
            posts: format!("{base}/posts"),
            users: format!("{base}/users"),
        })
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            posts: format!("{DEFAULT_BASE_URL}/posts"),
            users: format!("{DEFAULT_BASE_URL}/users"),
        }
    }
}

pub fn build_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("tally/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed building HTTP client")
}

/// One GET against `url`, decoded as JSON. Non-success statuses are errors.
#[instrument(skip(client))]
pub async fn fetch_resource<T>(client: &reqwest::Client, url: &str) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .with_context(|| format!("failed requesting {url}"))?;

    let status = response.status();
    if !status.is_success() {
        warn!(url, status = %status, "resource returned non-success status");
        return Err(anyhow!("{url} returned HTTP {status}"));
    }

    let body = response
        .text()
        .await
        .with_context(|| format!("failed reading response body for {url}"))?;

    serde_json::from_str(&body).with_context(|| format!("failed parsing response from {url}"))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FetchState<T> {
    #[default]
    Idle,
    Loading,
    Success(T),
    Error(String),
}

impl<T> FetchState<T> {
    pub fn label(&self) -> &'static str {
        match self {
            FetchState::Idle => "idle",
            FetchState::Loading => "loading",
            FetchState::Success(_) => "success",
            FetchState::Error(_) => "error",
        }
    }
}

/// Identifies one request issued by [`ResourceFetcher::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

/// Loading/success/error lifecycle for one remote collection.
///
/// Only the most recently issued request may settle the state; a response
/// for an older ticket is dropped.
#[derive(Debug)]
pub struct ResourceFetcher<T> {
    client: reqwest::Client,
    url: String,
    state: FetchState<T>,
    generation: u64,
}

impl<T> ResourceFetcher<T>
where
    T: DeserializeOwned,
{
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            state: FetchState::Idle,
            generation: 0,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> &FetchState<T> {
        &self.state
    }

    pub fn data(&self) -> Option<&T> {
        match &self.state {
            FetchState::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            FetchState::Error(message) => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, FetchState::Loading)
    }

    /// Enters `Loading` and discards whatever was loaded before.
    pub fn begin(&mut self) -> FetchTicket {
        self.generation += 1;
        self.state = FetchState::Loading;
        debug!(url = %self.url, generation = self.generation, "fetch started");
        FetchTicket(self.generation)
    }

    /// Returns `false` when `ticket` has been superseded and the result was
    /// dropped.
    pub fn complete(&mut self, ticket: FetchTicket, result: anyhow::Result<T>) -> bool {
        if ticket.0 != self.generation {
            warn!(
                url = %self.url,
                ticket = ticket.0,
                current = self.generation,
                "dropping stale fetch result"
            );
            return false;
        }

        self.state = match result {
            Ok(data) => {
                info!(url = %self.url, "fetch succeeded");
                FetchState::Success(data)
            }
            Err(error) => {
                let message = format!("{error:#}");
                warn!(url = %self.url, error = %message, "fetch failed");
                FetchState::Error(message)
            }
        };
        true
    }

    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn refetch(&mut self) {
        let ticket = self.begin();
        let result = fetch_resource::<T>(&self.client, &self.url).await;
        self.complete(ticket, result);
    }
}
