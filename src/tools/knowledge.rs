//! External knowledge lookup behind the `wikipedia_search` tool.
//!
//! [`KnowledgeSource`] is an enum over backends in the same way
//! [`LlmProvider`](crate::llm::LlmProvider) is: the live MediaWiki client for
//! real runs and a fixed, in-process source for tests and offline use.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::WikipediaConfig;

use super::ToolError;

/// One lookup hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub title: String,
    pub summary: String,
    pub url: String,
}

const MISSING_SUMMARY: &str = "Could not fetch summary";

#[derive(Debug, Clone)]
pub enum KnowledgeSource {
    Wikipedia(WikipediaClient),
    Fixed(FixedKnowledge),
}

impl KnowledgeSource {
    /// Ordered results for `query`, at most `limit` of them.
    pub async fn lookup(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeEntry>, ToolError> {
        match self {
            KnowledgeSource::Wikipedia(c) => c.lookup(query, limit).await,
            KnowledgeSource::Fixed(f) => f.lookup(query, limit),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            KnowledgeSource::Wikipedia(_) => "wikipedia",
            KnowledgeSource::Fixed(_) => "fixed",
        }
    }
}

// ── MediaWiki ─────────────────────────────────────────────────────────────────

/// Client for the MediaWiki action API (`api.php`).
///
/// One `generator=search` request returns titles, intro extracts and page
/// URLs together, so a lookup is a single round-trip.
#[derive(Debug, Clone)]
pub struct WikipediaClient {
    client: Client,
    api_base_url: String,
}

impl WikipediaClient {
    pub fn new(api_base_url: String, timeout_seconds: u64) -> Result<Self, ToolError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ToolError::Lookup(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, api_base_url })
    }

    pub fn from_config(config: &WikipediaConfig) -> Result<Self, ToolError> {
        Self::new(config.api_base_url.clone(), config.timeout_seconds)
    }

    async fn lookup(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeEntry>, ToolError> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let limit_param = limit.to_string();
        let params = [
            ("action", "query"),
            ("format", "json"),
            ("formatversion", "2"),
            ("generator", "search"),
            ("gsrsearch", query),
            ("gsrlimit", limit_param.as_str()),
            ("prop", "extracts|info"),
            ("exintro", "1"),
            ("explaintext", "1"),
            ("exlimit", "max"),
            ("inprop", "url"),
        ];

        debug!(query, limit, "wikipedia lookup");
        let response = self
            .client
            .get(&self.api_base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| ToolError::Lookup(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "wikipedia lookup rejected");
            return Err(ToolError::Lookup(format!("HTTP {}: {}", status.as_u16(), body.trim())));
        }

        let parsed = response
            .json::<SearchResponse>()
            .await
            .map_err(|e| ToolError::Lookup(format!("failed to parse response body: {e}")))?;

        Ok(entries_from_pages(parsed.query.map(|q| q.pages).unwrap_or_default(), limit))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<QueryBody>,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    title: String,
    /// Position in the search ranking; pages come back keyed by id.
    #[serde(default)]
    index: u32,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    fullurl: Option<String>,
}

fn entries_from_pages(mut pages: Vec<Page>, limit: usize) -> Vec<KnowledgeEntry> {
    pages.sort_by_key(|p| p.index);
    pages
        .into_iter()
        .take(limit)
        .map(|p| KnowledgeEntry {
            summary: p
                .extract
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| MISSING_SUMMARY.to_string()),
            url: p.fullurl.unwrap_or_default(),
            title: p.title,
        })
        .collect()
}

// ── Fixed ─────────────────────────────────────────────────────────────────────

/// Canned results, optionally failing every lookup. Records received queries.
#[derive(Debug, Clone, Default)]
pub struct FixedKnowledge {
    entries: Vec<KnowledgeEntry>,
    fault: Option<String>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl FixedKnowledge {
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self { entries, ..Default::default() }
    }

    /// A source whose every lookup fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { fault: Some(message.into()), ..Default::default() }
    }

    /// Queries received so far, oldest first.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    fn lookup(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeEntry>, ToolError> {
        if let Ok(mut q) = self.queries.lock() {
            q.push(query.to_string());
        }
        if let Some(fault) = &self.fault {
            return Err(ToolError::Lookup(fault.clone()));
        }
        Ok(self.entries.iter().take(limit).cloned().collect())
    }
}
