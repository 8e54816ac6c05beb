use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::reservation::event::SessionEvent;

/// Outbound sink for domain events. Fire-and-forget from the core's point of
/// view: publishing happens after the unit of work commits and a failure
/// never rolls the transition back.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &SessionEvent) -> AppResult<()>;
}
