use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::error::AppResult;

use crate::model::{
    id::{CustomerId, ReservationId, RoomId},
    reservation::Reservation,
    room::Room,
};

/// Persistence boundary for the reservation aggregate. `add`/`update` take
/// the room alongside the reservation when a transition changed effective
/// occupancy; the implementation persists both in one transaction, which is
/// the unit of work every use case commits through.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn add(&self, reservation: &Reservation, room: Option<&Room>) -> AppResult<()>;
    async fn update(&self, reservation: &Reservation, room: Option<&Room>) -> AppResult<()>;
    async fn find_by_id(&self, reservation_id: ReservationId) -> AppResult<Option<Reservation>>;
    /// Same as `find_by_id` with the member roster and billing segments
    /// loaded; required before any membership or billing mutation.
    async fn find_with_members(
        &self,
        reservation_id: ReservationId,
    ) -> AppResult<Option<Reservation>>;
    /// The reservation currently holding this customer, if any. Backs the
    /// one-active-engagement-per-customer rule.
    async fn find_active_or_reserved_by_customer(
        &self,
        customer_id: &CustomerId,
    ) -> AppResult<Option<Reservation>>;
    /// Open reservations for a room; backs the no-double-booking rule.
    async fn find_active_or_reserved_for_room(
        &self,
        room_id: RoomId,
    ) -> AppResult<Vec<Reservation>>;
    async fn find_active_sessions(&self) -> AppResult<Vec<Reservation>>;
    async fn find_by_access_code(&self, code: &str) -> AppResult<Option<Reservation>>;
    /// Whether a code is held by any currently active session.
    async fn access_code_in_use(&self, code: &str) -> AppResult<bool>;
    /// `Reserved` reservations whose no-show window has elapsed at `now`.
    async fn find_expired_reserved(&self, now: DateTime<Utc>) -> AppResult<Vec<Reservation>>;
}
