//! src/campaign/content.rs

use crate::error::error_chain_fmt;
use crate::telemetry::spawn_blocking_with_tracing;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use std::time::Duration;

/// Sentence boundary used to cut the preview out of the article body.
pub const PREVIEW_DELIMITER: &str = ". ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleContent {
    pub title: String,
    pub preview: String,
}

#[derive(thiserror::Error)]
pub enum ExtractionError {
    #[error("Failed to fetch the page.")]
    Fetch(#[source] anyhow::Error),
    #[error("{0}")]
    Parse(String),
    #[error("{0}")]
    ContentShape(String),
}

impl std::fmt::Debug for ExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, url: &Url) -> Result<ArticleContent, ExtractionError>;
}

/// Pulls title and preview out of a blog post with two CSS selectors.
pub struct HtmlContentExtractor {
    http_client: Client,
    title_selector: String,
    content_selector: String,
}

impl HtmlContentExtractor {
    pub fn new(
        title_selector: String,
        content_selector: String,
        timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        // fail at startup, not on the first campaign
        parse_selector(&title_selector).map_err(anyhow::Error::msg)?;
        parse_selector(&content_selector).map_err(anyhow::Error::msg)?;
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build the HTTP client for content extraction.")?;
        Ok(Self {
            http_client,
            title_selector,
            content_selector,
        })
    }

    #[tracing::instrument(name = "Fetch campaign page", skip(self))]
    async fn fetch_html(&self, url: &Url) -> Result<String, ExtractionError> {
        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to GET {}", url))
            .map_err(ExtractionError::Fetch)?;
        response
            .text()
            .await
            .map_err(|e| ExtractionError::Parse(format!("the page body is not readable text: {}", e)))
    }
}

#[async_trait]
impl ContentExtractor for HtmlContentExtractor {
    #[tracing::instrument(name = "Extract article content", skip(self, url), fields(url = %url))]
    async fn extract(&self, url: &Url) -> Result<ArticleContent, ExtractionError> {
        let html = self.fetch_html(url).await?;
        let title_selector = self.title_selector.clone();
        let content_selector = self.content_selector.clone();
        // `Html` is neither `Send` nor cheap to build, keep it on the blocking pool
        spawn_blocking_with_tracing(move || parse_article(&html, &title_selector, &content_selector))
            .await
            .map_err(|e| ExtractionError::Parse(format!("the parsing task failed: {}", e)))?
    }
}

fn parse_selector(selector: &str) -> Result<Selector, String> {
    Selector::parse(selector).map_err(|e| format!("`{}` is not a valid selector: {:?}", selector, e))
}

fn parse_article(
    html: &str,
    title_selector: &str,
    content_selector: &str,
) -> Result<ArticleContent, ExtractionError> {
    let title_selector = parse_selector(title_selector).map_err(ExtractionError::Parse)?;
    let content_selector = parse_selector(content_selector).map_err(ExtractionError::Parse)?;
    let document = Html::parse_document(html);

    let title = select_text(&document, &title_selector).ok_or_else(|| {
        ExtractionError::Parse("the page has no title element".to_string())
    })?;
    if title.is_empty() {
        return Err(ExtractionError::ContentShape(
            "the page title is empty".to_string(),
        ));
    }
    let body = select_text(&document, &content_selector).ok_or_else(|| {
        ExtractionError::Parse("the page has no content element".to_string())
    })?;
    let preview = derive_preview(&body)?;

    Ok(ArticleContent { title, preview })
}

/// Text of the first element matching `selector`, whitespace collapsed.
///
/// Text nodes are joined before collapsing, so inline markup such as
/// `Dog<em>s</em>` keeps reading as one word.
fn select_text(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).next().map(|element| {
        element
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    })
}

/// First sentence of the article body.
///
/// Text without any sentence boundary is rejected instead of being mailed
/// out whole or as an empty preview.
pub fn derive_preview(body: &str) -> Result<String, ExtractionError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ExtractionError::ContentShape(
            "the page body has no text".to_string(),
        ));
    }
    match body.split_once(PREVIEW_DELIMITER) {
        Some((first, _)) if !first.trim().is_empty() => Ok(first.trim().to_string()),
        Some(_) => Err(ExtractionError::ContentShape(
            "the first sentence of the page body is empty".to_string(),
        )),
        None => Err(ExtractionError::ContentShape(format!(
            "the page body has no `{}` sentence boundary",
            PREVIEW_DELIMITER
        ))),
    }
}
