//! Narration source abstraction
//!
//! The session only needs item metadata and a streaming URL; the HTTP surface
//! additionally proxies library browsing and submission. Both go through
//! [`NarrationSource`] so tests can substitute an in-memory source.

pub mod generation;
pub mod http;

use async_trait::async_trait;
use podwave_common::narration::{LibraryFilter, Submission, TaskStatus};
use podwave_common::{ItemId, NarrationItem};
use thiserror::Error;
use url::Url;

pub use generation::wait_for_generation;
pub use http::HttpNarrationSource;

/// Narration API failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Unknown or deleted narration
    #[error("Narration not found: {0}")]
    NotFound(String),

    /// Network-class failure: connect, timeout, 5xx
    #[error("Narration API unavailable: {0}")]
    Transient(String),

    /// Any other non-success response
    #[error("Narration API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body did not have the expected shape
    #[error("Malformed response: {0}")]
    Decode(String),

    /// Rejected before reaching the API
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl SourceError {
    /// Variant name, recorded as the reason for fetch failures
    pub fn kind_name(&self) -> &'static str {
        match self {
            SourceError::NotFound(_) => "NotFound",
            SourceError::Transient(_) => "Transient",
            SourceError::Api { .. } => "Api",
            SourceError::Decode(_) => "Decode",
            SourceError::InvalidRequest(_) => "InvalidRequest",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }
}

/// Read/write access to the narration catalogue
#[async_trait]
pub trait NarrationSource: Send + Sync + 'static {
    /// Current metadata and generation status of one narration
    async fn fetch_status(&self, id: &ItemId) -> Result<NarrationItem, SourceError>;

    /// URL the audio resource should load; no network access
    fn streaming_url(&self, id: &ItemId) -> String;

    async fn fetch_trending(&self) -> Result<Vec<NarrationItem>, SourceError>;

    async fn fetch_library(
        &self,
        filter: &LibraryFilter,
    ) -> Result<Vec<NarrationItem>, SourceError>;

    /// Submit pasted text for narration
    async fn create_from_text(&self, text: &str) -> Result<Submission, SourceError>;

    /// Submit a web page for narration
    async fn create_from_url(&self, url: &str) -> Result<Submission, SourceError>;

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, SourceError>;

    async fn delete(&self, id: &ItemId) -> Result<(), SourceError>;
}

/// Reject blank text before it reaches the API
pub fn validate_text(text: &str) -> Result<&str, SourceError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SourceError::InvalidRequest("Text must not be empty".to_string()));
    }
    Ok(text)
}

/// Only absolute http(s) page URLs can be narrated
pub fn validate_page_url(url: &str) -> Result<&str, SourceError> {
    let url = url.trim();
    let parsed = Url::parse(url)
        .map_err(|e| SourceError::InvalidRequest(format!("Invalid URL {}: {}", url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SourceError::InvalidRequest(format!("Not an http(s) URL: {}", url)));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(SourceError::InvalidRequest(format!("URL has no host: {}", url)));
    }
    Ok(url)
}
