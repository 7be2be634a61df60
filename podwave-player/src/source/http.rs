//! Narration API client
//!
//! JSON over HTTP against the narration backend. Paths are relative to the
//! configured base URL (for example `http://localhost:8000/api`).

use std::time::Duration;

use async_trait::async_trait;
use podwave_common::config::PlayerConfig;
use podwave_common::narration::{Listing, LibraryFilter, Submission, TaskStatus};
use podwave_common::{ItemId, NarrationItem};
use reqwest::{header, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{validate_page_url, validate_text, NarrationSource, SourceError};

const USER_AGENT: &str = concat!("podwave-player/", env!("CARGO_PKG_VERSION"));

/// Submission acknowledgement as the API returns it
#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(default = "default_true")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    task_id: String,
    story_narration_id: ItemId,
}

fn default_true() -> bool {
    true
}

/// Error payloads carry either `message` or `detail`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    detail: Option<String>,
}

/// Narration API client
pub struct HttpNarrationSource {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpNarrationSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                SourceError::InvalidRequest(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn from_config(config: &PlayerConfig) -> Result<Self, SourceError> {
        info!("Narration API: {}", config.api_base_url);
        Self::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = %method, url = %url, "Narration API request");
        self.http_client
            .request(method, url)
            .header(header::ACCEPT, "application/json")
    }

    /// Send and map transport failures and non-success statuses
    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, SourceError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Transient(format!("Timed out requesting {}", what))
            } else {
                SourceError::Transient(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = error_message(response).await;
        Err(match status {
            StatusCode::NOT_FOUND => SourceError::NotFound(what.to_string()),
            StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
                SourceError::Transient(format!("HTTP {}: {}", status.as_u16(), message))
            }
            s if s.is_server_error() => {
                SourceError::Transient(format!("HTTP {}: {}", s.as_u16(), message))
            }
            s => SourceError::Api {
                status: s.as_u16(),
                message,
            },
        })
    }

    async fn json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, SourceError> {
        let response = self.send(request, what).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::Decode(format!("{}: {}", what, e)))
    }

    async fn submit(&self, path: &str, body: serde_json::Value) -> Result<Submission, SourceError> {
        let ack: CreateResponse = self
            .json(self.request(Method::POST, path).json(&body), "narration submission")
            .await?;

        if !ack.success {
            return Err(SourceError::Api {
                status: StatusCode::OK.as_u16(),
                message: ack.message.unwrap_or_else(|| "Submission rejected".to_string()),
            });
        }

        info!(task_id = %ack.task_id, item_id = %ack.story_narration_id, "Narration submitted");
        Ok(Submission {
            task_id: ack.task_id,
            item_id: ack.story_narration_id,
        })
    }
}

/// Best-effort human message from an error response
async fn error_message(response: Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.message.or(body.detail))
        .or_else(|| Some(text.trim().to_string()).filter(|t| !t.is_empty() && t.len() < 512))
        .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()))
}

#[async_trait]
impl NarrationSource for HttpNarrationSource {
    async fn fetch_status(&self, id: &ItemId) -> Result<NarrationItem, SourceError> {
        let what = format!("narration {}", id);
        self.json(self.request(Method::GET, &format!("/story-narration/{}/", id)), &what)
            .await
    }

    fn streaming_url(&self, id: &ItemId) -> String {
        format!("{}/story-narration/{}/stream/", self.base_url, id)
    }

    async fn fetch_trending(&self) -> Result<Vec<NarrationItem>, SourceError> {
        let listing: Listing<NarrationItem> = self
            .json(self.request(Method::GET, "/story-narration/trending/"), "trending narrations")
            .await?;
        Ok(listing.into_items())
    }

    async fn fetch_library(
        &self,
        filter: &LibraryFilter,
    ) -> Result<Vec<NarrationItem>, SourceError> {
        let request = self
            .request(Method::GET, "/story-narration/")
            .query(&filter.query_pairs());
        let listing: Listing<NarrationItem> = self.json(request, "narration library").await?;
        Ok(listing.into_items())
    }

    async fn create_from_text(&self, text: &str) -> Result<Submission, SourceError> {
        let text = validate_text(text)?;
        self.submit("/story-narration/create", json!({ "content_text": text }))
            .await
    }

    async fn create_from_url(&self, url: &str) -> Result<Submission, SourceError> {
        let url = validate_page_url(url)?;
        self.submit("/story-narration/create-from-url/", json!({ "url": url }))
            .await
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, SourceError> {
        let task_id = task_id.trim();
        if task_id.is_empty() || task_id.contains('/') {
            return Err(SourceError::InvalidRequest(format!("Bad task id: {:?}", task_id)));
        }
        let what = format!("task {}", task_id);
        self.json(self.request(Method::GET, &format!("/task-status/{}/", task_id)), &what)
            .await
    }

    async fn delete(&self, id: &ItemId) -> Result<(), SourceError> {
        let what = format!("narration {}", id);
        self.send(self.request(Method::DELETE, &format!("/story-narration/{}/", id)), &what)
            .await?;
        info!(item_id = %id, "Narration deleted");
        Ok(())
    }
}
