use std::sync::Arc;

use async_trait::async_trait;
use derive_new::new;

use kernel::model::reservation::event::SessionEvent;
use kernel::publisher::EventPublisher;
use shared::error::AppResult;

use crate::redis::RedisClient;

/// Channel the surrounding platform (notifications, loyalty) subscribes to.
const SESSION_EVENTS_CHANNEL: &str = "lounge.session-events";

#[derive(new)]
pub struct EventPublisherImpl {
    redis: Arc<RedisClient>,
}

#[async_trait]
impl EventPublisher for EventPublisherImpl {
    async fn publish(&self, event: &SessionEvent) -> AppResult<()> {
        let payload = serde_json::to_string(event)?;
        self.redis.publish(SESSION_EVENTS_CHANNEL, &payload).await?;
        tracing::debug!(
            reservation_id = %event.reservation_id(),
            "published session event"
        );
        Ok(())
    }
}
