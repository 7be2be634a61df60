//! Test helpers for podwave-player integration tests
//!
//! - FakeResource: scriptable in-memory audio resource
//! - FakeSource: in-memory narration catalogue with per-item delays
//! - build_session: a session wired to both fakes

#![allow(dead_code)]

pub mod fake_resource;
pub mod fake_source;

use std::sync::Arc;
use std::time::Duration;

use podwave_common::events::EventBus;
use podwave_common::narration::NarrationStatus;
use podwave_common::{ItemId, NarrationItem};
use podwave_player::audio::{AudioResource, ResourceError, ResourceFactory};
use podwave_player::source::NarrationSource;
use podwave_player::PlaybackSession;

pub use fake_resource::FakeResource;
pub use fake_source::FakeSource;

/// A finished narration
pub fn done_item(id: i64, title: &str) -> NarrationItem {
    NarrationItem {
        id: ItemId::Numeric(id),
        title: title.to_string(),
        source_url: None,
        cover_image_url: None,
        estimated_duration_seconds: Some(600.0),
        status: NarrationStatus::Done,
        error_message: None,
        created_at: None,
    }
}

/// Factory handing out the same fake resource, counting creations
pub fn factory_for(resource: &Arc<FakeResource>) -> ResourceFactory {
    let resource = Arc::clone(resource);
    Box::new(move || -> Result<Arc<dyn AudioResource>, ResourceError> {
        resource.record_creation();
        Ok(resource.clone() as Arc<dyn AudioResource>)
    })
}

/// Session over the two fakes at 1x
pub fn build_session(source: &Arc<FakeSource>, resource: &Arc<FakeResource>) -> PlaybackSession {
    let source: Arc<dyn NarrationSource> = source.clone();
    PlaybackSession::new(
        source,
        factory_for(resource),
        Arc::new(EventBus::new(64)),
        1.0,
    )
}

/// Catalogue with the narrations the tests use most
pub fn standard_source() -> Arc<FakeSource> {
    let source = FakeSource::new();
    source.insert(done_item(1, "Remote Work"));
    source.insert(done_item(2, "Mindfulness Hacks"));
    source.insert(done_item(42, "The Future of AI"));
    Arc::new(source)
}

/// Wait until `check` holds for the session snapshot, or panic
pub async fn wait_for_state<F>(session: &PlaybackSession, check: F)
where
    F: Fn(&podwave_common::events::PlaybackState) -> bool,
{
    let mut rx = session.subscribe();
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if check(&*rx.borrow_and_update()) {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    })
    .await;
    assert!(result.is_ok(), "state never reached: {:?}", session.snapshot());
}
