use garde::Validate;
use kernel::model::{
    id::RoomId,
    room::{event::CreateRoom, Room, RoomStatus},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoomStatusName {
    Available,
    Occupied,
    Maintenance,
}

impl From<RoomStatus> for RoomStatusName {
    fn from(value: RoomStatus) -> Self {
        match value {
            RoomStatus::Available => Self::Available,
            RoomStatus::Occupied => Self::Occupied,
            RoomStatus::Maintenance => Self::Maintenance,
        }
    }
}

impl From<RoomStatusName> for RoomStatus {
    fn from(value: RoomStatusName) -> Self {
        match value {
            RoomStatusName::Available => Self::Available,
            RoomStatusName::Occupied => Self::Occupied,
            RoomStatusName::Maintenance => Self::Maintenance,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    #[garde(length(min = 1))]
    pub name: String,
    #[garde(range(min = 0.01))]
    pub hourly_rate: f64,
}

impl From<CreateRoomRequest> for CreateRoom {
    fn from(value: CreateRoomRequest) -> Self {
        let CreateRoomRequest { name, hourly_rate } = value;
        CreateRoom { name, hourly_rate }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoomStatusRequest {
    pub status: RoomStatusName,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomResponse {
    pub id: RoomId,
    pub name: String,
    pub hourly_rate: f64,
    pub status: RoomStatusName,
}

impl From<Room> for RoomResponse {
    fn from(value: Room) -> Self {
        let Room {
            id,
            name,
            hourly_rate,
            status,
        } = value;
        Self {
            id,
            name,
            hourly_rate,
            status: status.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomsResponse {
    pub items: Vec<RoomResponse>,
}

impl From<Vec<Room>> for RoomsResponse {
    fn from(value: Vec<Room>) -> Self {
        Self {
            items: value.into_iter().map(RoomResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreatedResponse {
    pub room_id: RoomId,
}
