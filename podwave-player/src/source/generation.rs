//! Waiting for a submitted narration to finish generating

use std::time::Duration;

use podwave_common::narration::NarrationStatus;
use podwave_common::{ItemId, NarrationItem};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::NarrationSource;
use crate::error::{Error, Result};

/// Poll `fetch_status` until the narration is done or failed.
///
/// Transient fetch errors are logged and polling continues; any other source
/// error ends the wait. Returns [`Error::GenerationTimedOut`] once `timeout`
/// has elapsed without a terminal status.
pub async fn wait_for_generation<S>(
    source: &S,
    id: &ItemId,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<NarrationItem>
where
    S: NarrationSource + ?Sized,
{
    let deadline = Instant::now() + timeout;

    loop {
        match source.fetch_status(id).await {
            Ok(item) => match item.status {
                NarrationStatus::Done => {
                    info!(item_id = %id, "Narration ready");
                    return Ok(item);
                }
                NarrationStatus::Failed => {
                    let message = item
                        .error_message
                        .unwrap_or_else(|| "Generation failed".to_string());
                    warn!(item_id = %id, "Narration generation failed: {}", message);
                    return Err(Error::GenerationFailed {
                        id: id.to_string(),
                        message,
                    });
                }
                status => debug!(item_id = %id, "Narration still {}", status),
            },
            Err(e) if e.is_transient() => {
                warn!(item_id = %id, "Status poll failed, retrying: {}", e);
            }
            Err(e) => return Err(e.into()),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(Error::GenerationTimedOut(id.to_string()));
        }
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}
