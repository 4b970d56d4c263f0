//! arXiv paper source
//!
//! Queries the arXiv export API and parses its Atom feed with `quick-xml`.
//! Requests are spaced by `min_interval_ms` to respect arXiv's usage policy.

use crate::error::{retry_after_secs, snippet, ProviderError};
use async_trait::async_trait;
use research_core::{CapabilityError, Paper, PaperSource};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const USER_AGENT: &str = concat!("research-pipeline/", env!("CARGO_PKG_VERSION"));

/// arXiv source configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArxivConfig {
    /// Query endpoint
    pub base_url: String,
    /// Whole-request timeout
    pub request_timeout_secs: u64,
    /// Minimum spacing between consecutive requests
    pub min_interval_ms: u64,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            base_url: "http://export.arxiv.org/api/query".to_string(),
            request_timeout_secs: 30,
            min_interval_ms: 3_000,
        }
    }
}

/// Paper source backed by the arXiv API
pub struct ArxivPaperSource {
    client: reqwest::Client,
    config: ArxivConfig,
    last_request: Mutex<Option<Instant>>,
}

impl ArxivPaperSource {
    /// Create new source
    ///
    /// # Errors
    /// `ProviderError::Client` if the HTTP client cannot be built
    pub fn new(config: ArxivConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .map_err(ProviderError::Client)?;

        Ok(Self {
            client,
            config,
            last_request: Mutex::new(None),
        })
    }

    /// Search arXiv, best match first
    ///
    /// # Errors
    /// Any transport, status or feed-parsing failure
    pub async fn fetch(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<Paper>, ProviderError> {
        let query = query.trim();
        if query.is_empty() || max_results == 0 {
            return Ok(Vec::new());
        }

        self.pace().await;
        tracing::debug!(query, max_results, "arXiv search");

        let timeout_secs = self.config.request_timeout_secs;
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&query_params(query, max_results))
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, timeout_secs))?;

        let status = response.status();
        let retry_after = retry_after_secs(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, timeout_secs))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: snippet(&body),
                retry_after_secs: retry_after,
            });
        }

        let papers = parse_feed(&body)?;
        tracing::debug!(count = papers.len(), "arXiv search returned");
        Ok(papers)
    }

    /// Wait until `min_interval_ms` has passed since the previous request
    async fn pace(&self) {
        let interval = Duration::from_millis(self.config.min_interval_ms);
        // Held across the sleep so concurrent callers queue up
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[async_trait]
impl PaperSource for ArxivPaperSource {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Paper>, CapabilityError> {
        self.fetch(query, max_results).await.map_err(CapabilityError::from)
    }
}

/// Query string parameters for a relevance-ranked search
#[must_use]
pub fn query_params(query: &str, max_results: usize) -> Vec<(&'static str, String)> {
    vec![
        ("search_query", format!("all:{query}")),
        ("start", "0".to_string()),
        ("max_results", max_results.to_string()),
        ("sortBy", "relevance".to_string()),
        ("sortOrder", "descending".to_string()),
    ]
}

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    published: String,
    #[serde(rename = "author", default)]
    authors: Vec<Author>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@title", default)]
    title: Option<String>,
}

/// Parse an arXiv Atom feed into papers
///
/// # Errors
/// `ProviderError::Parse` on malformed XML or an arXiv error entry
pub fn parse_feed(xml: &str) -> Result<Vec<Paper>, ProviderError> {
    let feed: Feed =
        quick_xml::de::from_str(xml).map_err(|e| ProviderError::Parse(format!("Atom feed: {e}")))?;

    // arXiv reports query errors as a single entry under /api/errors
    if let Some(error) = feed.entries.iter().find(|e| e.id.contains("/api/errors")) {
        return Err(ProviderError::Parse(format!(
            "arXiv error: {}",
            collapse_whitespace(&error.summary)
        )));
    }

    Ok(feed
        .entries
        .into_iter()
        .filter_map(into_paper)
        .collect())
}

fn into_paper(entry: Entry) -> Option<Paper> {
    let id = arxiv_id(&entry.id);
    if id.is_empty() {
        return None;
    }

    let authors = entry
        .authors
        .iter()
        .map(|a| collapse_whitespace(&a.name))
        .filter(|n| !n.is_empty())
        .collect();
    let published = entry.published.trim().chars().take(10).collect::<String>();
    let pdf_url = entry
        .links
        .iter()
        .find(|l| l.title.as_deref() == Some("pdf"))
        .map(|l| l.href.clone());

    let paper = Paper::new(
        id,
        collapse_whitespace(&entry.title),
        collapse_whitespace(&entry.summary),
    )
    .with_authors(authors)
    .with_published(published);

    Some(match pdf_url {
        Some(url) => paper.with_pdf_url(url),
        None => paper,
    })
}

/// Trailing path segment of an entry id URL (`http://arxiv.org/abs/2101.00001v2` → `2101.00001v2`)
#[must_use]
pub fn arxiv_id(entry_id: &str) -> String {
    let trimmed = entry_id.trim().trim_end_matches('/');
    match trimmed.find("/abs/") {
        Some(pos) => trimmed[pos + 5..].to_string(),
        None => trimmed.rsplit('/').next().unwrap_or_default().to_string(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
