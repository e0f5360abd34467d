//! DuckDuckGo web search
//!
//! Uses the JavaScript-free HTML endpoint, which needs no API key. Results are
//! scraped from the returned page.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use url::Url;

use ragflow_core::{Error, Result, SearchHit, WebSearch};

const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Web search backed by DuckDuckGo with safe search off
pub struct DuckDuckGoSearch {
    client: Client,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        })
    }

    /// Point the search at another HTML endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("q", query), ("kp", "-2"), ("kl", "wt-wt")])
            .send()
            .await
            .map_err(|e| Error::WebSearch(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::WebSearch(format!("DuckDuckGo returned {}", status)));
        }

        let html = response
            .text()
            .await
            .map_err(|e| Error::WebSearch(format!("Failed to read response: {}", e)))?;

        let hits = parse_results(&html, max_results)?;
        tracing::debug!(query, hits = hits.len(), "web search finished");
        Ok(hits)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::WebSearch(format!("Invalid selector {}: {}", css, e)))
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join("")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Result links go through a `/l/?uddg=<target>` redirect
fn resolve_href(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    match Url::parse(&absolute) {
        Ok(url) if url.path() == "/l/" => url
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, target)| target.into_owned())
            .unwrap_or(absolute),
        _ => absolute,
    }
}

/// Extract organic results from a DuckDuckGo HTML page
pub(crate) fn parse_results(html: &str, max_results: usize) -> Result<Vec<SearchHit>> {
    let document = Html::parse_document(html);
    let result_selector = selector("div.result")?;
    let link_selector = selector("a.result__a")?;
    let snippet_selector = selector(".result__snippet")?;

    let mut hits = Vec::new();
    for result in document.select(&result_selector) {
        if hits.len() >= max_results {
            break;
        }
        if result.value().classes().any(|class| class == "result--ad") {
            continue;
        }

        let Some(link) = result.select(&link_selector).next() else {
            continue;
        };
        let href = link.value().attr("href").map(resolve_href).unwrap_or_default();
        let body = result
            .select(&snippet_selector)
            .next()
            .map(element_text)
            .unwrap_or_default();

        if body.is_empty() {
            continue;
        }

        hits.push(SearchHit {
            title: element_text(link),
            href,
            body,
        });
    }

    Ok(hits)
}
