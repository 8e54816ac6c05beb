use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::id::{CustomerId, ReservationId, RoomId};
use crate::model::reservation::{PlayerMode, ReservationStatus, SessionMember};

/// Notices raised by the aggregate on lifecycle transitions and handed to the
/// outbound event publisher once the unit of work has committed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SessionEvent {
    RoomReserved {
        reservation: ReservationSnapshot,
    },
    SessionStarted {
        reservation: ReservationSnapshot,
    },
    SessionEnded {
        reservation: ReservationSnapshot,
    },
    ReservationCancelled {
        reservation: ReservationSnapshot,
        previous_status: ReservationStatus,
    },
}

impl SessionEvent {
    pub fn reservation_id(&self) -> ReservationId {
        match self {
            Self::RoomReserved { reservation }
            | Self::SessionStarted { reservation }
            | Self::SessionEnded { reservation }
            | Self::ReservationCancelled { reservation, .. } => reservation.id,
        }
    }
}

/// Immutable copy of the aggregate state at the moment an event was raised.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationSnapshot {
    pub id: ReservationId,
    pub room_id: RoomId,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
    pub access_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub hourly_rate: f64,
    pub player_mode: PlayerMode,
    pub total_cost: Option<f64>,
    pub status: ReservationStatus,
    pub notes: Option<String>,
    pub members: Vec<SessionMember>,
}
