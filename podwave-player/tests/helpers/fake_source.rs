//! In-memory narration catalogue

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use podwave_common::narration::{LibraryFilter, Submission, TaskState, TaskStatus};
use podwave_common::{ItemId, NarrationItem};
use podwave_player::source::{NarrationSource, SourceError};

#[derive(Default)]
struct Catalogue {
    items: HashMap<ItemId, NarrationItem>,
    delays: HashMap<ItemId, Duration>,
    fetches: HashMap<ItemId, usize>,
    /// Responses returned before falling back to `items`
    scripted: HashMap<ItemId, VecDeque<Result<NarrationItem, SourceError>>>,
    submissions: Vec<String>,
}

#[derive(Default)]
pub struct FakeSource {
    catalogue: Mutex<Catalogue>,
    fail_listings: AtomicBool,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, item: NarrationItem) {
        self.catalogue.lock().unwrap().items.insert(item.id, item);
    }

    /// Delay every `fetch_status` for `id`
    pub fn set_delay(&self, id: i64, delay: Duration) {
        self.catalogue
            .lock()
            .unwrap()
            .delays
            .insert(ItemId::Numeric(id), delay);
    }

    /// Queue responses for `id`, consumed one per fetch
    pub fn script(&self, id: i64, responses: Vec<Result<NarrationItem, SourceError>>) {
        self.catalogue
            .lock()
            .unwrap()
            .scripted
            .insert(ItemId::Numeric(id), responses.into());
    }

    pub fn fetch_count(&self, id: i64) -> usize {
        self.catalogue
            .lock()
            .unwrap()
            .fetches
            .get(&ItemId::Numeric(id))
            .copied()
            .unwrap_or(0)
    }

    pub fn set_fail_listings(&self, fail: bool) {
        self.fail_listings.store(fail, Ordering::SeqCst);
    }

    /// Text and URLs submitted so far
    pub fn submissions(&self) -> Vec<String> {
        self.catalogue.lock().unwrap().submissions.clone()
    }

    fn listing(&self) -> Result<Vec<NarrationItem>, SourceError> {
        if self.fail_listings.load(Ordering::SeqCst) {
            return Err(SourceError::Transient("listing unavailable".to_string()));
        }
        let mut items: Vec<_> = self.catalogue.lock().unwrap().items.values().cloned().collect();
        items.sort_by_key(|item| item.id.to_string());
        Ok(items)
    }

    fn submit(&self, what: &str) -> Submission {
        self.catalogue.lock().unwrap().submissions.push(what.to_string());
        Submission {
            task_id: "task-1".to_string(),
            item_id: ItemId::Numeric(100),
        }
    }
}

#[async_trait]
impl NarrationSource for FakeSource {
    async fn fetch_status(&self, id: &ItemId) -> Result<NarrationItem, SourceError> {
        let delay = {
            let mut catalogue = self.catalogue.lock().unwrap();
            *catalogue.fetches.entry(*id).or_insert(0) += 1;
            catalogue.delays.get(id).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut catalogue = self.catalogue.lock().unwrap();
        if let Some(response) = catalogue.scripted.get_mut(id).and_then(|queue| queue.pop_front()) {
            return response;
        }
        catalogue
            .items
            .get(id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(id.to_string()))
    }

    fn streaming_url(&self, id: &ItemId) -> String {
        format!("https://cdn.example/{}/stream", id)
    }

    async fn fetch_trending(&self) -> Result<Vec<NarrationItem>, SourceError> {
        self.listing()
    }

    async fn fetch_library(
        &self,
        filter: &LibraryFilter,
    ) -> Result<Vec<NarrationItem>, SourceError> {
        let items = self.listing()?;
        Ok(match filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(search) => {
                let search = search.to_lowercase();
                items
                    .into_iter()
                    .filter(|item| item.title.to_lowercase().contains(&search))
                    .collect()
            }
            None => items,
        })
    }

    async fn create_from_text(&self, text: &str) -> Result<Submission, SourceError> {
        let text = podwave_player::source::validate_text(text)?;
        Ok(self.submit(text))
    }

    async fn create_from_url(&self, url: &str) -> Result<Submission, SourceError> {
        let url = podwave_player::source::validate_page_url(url)?;
        Ok(self.submit(url))
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, SourceError> {
        if task_id != "task-1" {
            return Err(SourceError::NotFound(task_id.to_string()));
        }
        Ok(TaskStatus {
            task_id: task_id.to_string(),
            status: TaskState::Started,
            result: None,
            error: None,
        })
    }

    async fn delete(&self, id: &ItemId) -> Result<(), SourceError> {
        self.catalogue
            .lock()
            .unwrap()
            .items
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SourceError::NotFound(id.to_string()))
    }
}
