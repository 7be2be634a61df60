//! Narration domain types
//!
//! Types describing generated narration items as the remote narration API
//! reports them, plus the listing/submission shapes shared between the
//! player service and its clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::human_time::format_clock;
use crate::Error;

/// Opaque narration identifier
///
/// Deployments of the narration API use either integer keys or UUIDs.
/// Serialized untagged: a JSON number or a UUID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Numeric(i64),
    Uuid(Uuid),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Numeric(id) => write!(f, "{}", id),
            ItemId::Uuid(id) => write!(f, "{}", id.hyphenated()),
        }
    }
}

impl FromStr for ItemId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<i64>() {
            return Ok(ItemId::Numeric(id));
        }
        Uuid::parse_str(s)
            .map(ItemId::Uuid)
            .map_err(|_| Error::InvalidInput(format!("Not a narration id: {:?}", s)))
    }
}

impl From<i64> for ItemId {
    fn from(id: i64) -> Self {
        ItemId::Numeric(id)
    }
}

impl From<Uuid> for ItemId {
    fn from(id: Uuid) -> Self {
        ItemId::Uuid(id)
    }
}

/// Generation status of a narration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NarrationStatus {
    Pending,
    Processing,
    #[serde(alias = "completed")]
    Done,
    Failed,
}

impl NarrationStatus {
    /// True once generation has finished, successfully or not
    pub fn is_terminal(self) -> bool {
        matches!(self, NarrationStatus::Done | NarrationStatus::Failed)
    }

    /// Name the narration API uses in query strings
    pub fn wire_name(self) -> &'static str {
        match self {
            NarrationStatus::Pending => "pending",
            NarrationStatus::Processing => "processing",
            NarrationStatus::Done => "completed",
            NarrationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for NarrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NarrationStatus::Pending => write!(f, "pending"),
            NarrationStatus::Processing => write!(f, "processing"),
            NarrationStatus::Done => write!(f, "done"),
            NarrationStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for NarrationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(NarrationStatus::Pending),
            "processing" => Ok(NarrationStatus::Processing),
            "done" | "completed" => Ok(NarrationStatus::Done),
            "failed" => Ok(NarrationStatus::Failed),
            other => Err(Error::InvalidInput(format!("Unknown narration status: {}", other))),
        }
    }
}

/// One generated narration
///
/// Field aliases accept the remote API's naming (`duration`, `image`,
/// `completed`), so the same type reads the raw payload and is served back
/// to clients in normalized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationItem {
    pub id: ItemId,

    #[serde(default)]
    pub title: String,

    /// Page the narrated text was taken from (None for pasted text)
    #[serde(default, alias = "url")]
    pub source_url: Option<String>,

    #[serde(default, alias = "cover_image", alias = "image")]
    pub cover_image_url: Option<String>,

    /// Estimated listening time in seconds
    #[serde(default, alias = "duration", alias = "read_time")]
    pub estimated_duration_seconds: Option<f64>,

    pub status: NarrationStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl NarrationItem {
    /// Audio exists only for finished narrations
    pub fn is_playable(&self) -> bool {
        self.status == NarrationStatus::Done
    }

    /// Estimated duration as a `M:SS` clock string, if known
    pub fn display_duration(&self) -> Option<String> {
        self.estimated_duration_seconds.map(format_clock)
    }
}

/// Library listing filter
///
/// All fields are optional; unset fields are omitted from the query string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NarrationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordering: Option<String>,
}

impl LibraryFilter {
    /// Query parameters for the set fields, in a stable order
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(search) = self.search.as_ref().filter(|s| !s.trim().is_empty()) {
            pairs.push(("search", search.trim().to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.wire_name().to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(page_size) = self.page_size {
            pairs.push(("page_size", page_size.to_string()));
        }
        if let Some(ordering) = &self.ordering {
            pairs.push(("ordering", ordering.clone()));
        }
        pairs
    }
}

/// Paginated listing as returned by the narration API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Listing payload: some endpoints paginate, others return a bare array
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Paginated(Page<T>),
    Bare(Vec<T>),
}

impl<T> Listing<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            Listing::Paginated(page) => page.results,
            Listing::Bare(items) => items,
        }
    }
}

/// Handle returned when a narration is submitted for generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Background generation task id
    pub task_id: String,
    /// Id of the narration that will hold the audio
    pub item_id: ItemId,
}

/// State of a background generation task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Started,
    Success,
    Failure,
}

/// Generation task status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: String,
    pub status: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
