use chrono::{DateTime, Utc};
use garde::Validate;
use kernel::model::{
    id::{ReservationId, RoomId},
    reservation::{MemberRole, PlayerMode, Reservation, ReservationStatus, SessionMember},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReservationStatusName {
    Reserved,
    Active,
    Completed,
    Cancelled,
}

impl From<ReservationStatus> for ReservationStatusName {
    fn from(value: ReservationStatus) -> Self {
        match value {
            ReservationStatus::Reserved => Self::Reserved,
            ReservationStatus::Active => Self::Active,
            ReservationStatus::Completed => Self::Completed,
            ReservationStatus::Cancelled => Self::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayerModeName {
    Single,
    Multiplayer,
}

impl From<PlayerMode> for PlayerModeName {
    fn from(value: PlayerMode) -> Self {
        match value {
            PlayerMode::Single => Self::Single,
            PlayerMode::Multiplayer => Self::Multiplayer,
        }
    }
}

impl From<PlayerModeName> for PlayerMode {
    fn from(value: PlayerModeName) -> Self {
        match value {
            PlayerModeName::Single => Self::Single,
            PlayerModeName::Multiplayer => Self::Multiplayer,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemberRoleName {
    Owner,
    Member,
}

impl From<MemberRole> for MemberRoleName {
    fn from(value: MemberRole) -> Self {
        match value {
            MemberRole::Owner => Self::Owner,
            MemberRole::Member => Self::Member,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReservationRequest {
    #[garde(skip)]
    pub room_id: RoomId,
    #[garde(length(min = 1))]
    pub customer_id: String,
    #[garde(skip)]
    pub customer_name: Option<String>,
    /// Defaults to the room's current rate when omitted.
    #[garde(skip)]
    pub hourly_rate: Option<f64>,
    #[garde(skip)]
    pub notes: Option<String>,
    /// Admin-created reservations bypass the one-engagement-per-customer rule.
    #[garde(skip)]
    #[serde(default)]
    pub created_by_admin: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalkInRequest {
    #[garde(skip)]
    pub room_id: RoomId,
    /// Omitted for an ownerless walk-in; the first joiner becomes owner.
    #[garde(inner(length(min = 1)))]
    pub customer_id: Option<String>,
    #[garde(skip)]
    pub customer_name: Option<String>,
    #[garde(skip)]
    pub hourly_rate: Option<f64>,
    #[garde(skip)]
    #[serde(default = "default_player_mode")]
    pub player_mode: PlayerModeName,
    #[garde(skip)]
    pub notes: Option<String>,
}

fn default_player_mode() -> PlayerModeName {
    PlayerModeName::Single
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinSessionRequest {
    #[garde(length(min = 4, max = 4))]
    pub access_code: String,
    #[garde(length(min = 1))]
    pub customer_id: String,
    #[garde(skip)]
    pub customer_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LeaveSessionRequest {
    #[garde(length(min = 1))]
    pub customer_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssignCustomerRequest {
    #[garde(length(min = 1))]
    pub customer_id: String,
    #[garde(skip)]
    pub customer_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePlayerModeRequest {
    #[garde(skip)]
    pub player_mode: PlayerModeName,
    /// Rate for the new billing segment; defaults to the reservation's
    /// snapshot rate when omitted.
    #[garde(skip)]
    pub hourly_rate: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMemberResponse {
    pub customer_id: String,
    pub customer_name: Option<String>,
    pub joined_at: DateTime<Utc>,
    pub role: MemberRoleName,
}

impl From<&SessionMember> for SessionMemberResponse {
    fn from(value: &SessionMember) -> Self {
        Self {
            customer_id: value.customer_id.to_string(),
            customer_name: value.customer_name.clone(),
            joined_at: value.joined_at,
            role: value.role.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResponse {
    pub id: ReservationId,
    pub room_id: RoomId,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub access_code: Option<String>,
    pub status: ReservationStatusName,
    pub player_mode: PlayerModeName,
    pub created_at: DateTime<Utc>,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub hourly_rate: f64,
    pub rounded_hours: f64,
    pub total_cost: Option<f64>,
    pub notes: Option<String>,
    pub members: Vec<SessionMemberResponse>,
}

impl From<&Reservation> for ReservationResponse {
    fn from(value: &Reservation) -> Self {
        Self {
            id: value.id(),
            room_id: value.room_id(),
            customer_id: value.customer_id().map(ToString::to_string),
            customer_name: value.customer_name().map(ToString::to_string),
            access_code: value.access_code().map(|c| c.as_str().to_string()),
            status: value.status().into(),
            player_mode: value.player_mode().into(),
            created_at: value.created_at(),
            actual_start_time: value.actual_start_time(),
            end_time: value.end_time(),
            hourly_rate: value.hourly_rate(),
            rounded_hours: value.rounded_hours(),
            total_cost: value.total_cost(),
            notes: value.notes().map(ToString::to_string),
            members: value.members().iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsResponse {
    pub items: Vec<ReservationResponse>,
}

impl From<Vec<Reservation>> for SessionsResponse {
    fn from(value: Vec<Reservation>) -> Self {
        Self {
            items: value.iter().map(ReservationResponse::from).collect(),
        }
    }
}
