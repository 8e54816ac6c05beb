use std::str::FromStr;

use kernel::model::{
    id::RoomId,
    room::{Room, RoomStatus},
};
use shared::error::{AppError, AppResult};
use uuid::Uuid;

#[derive(sqlx::FromRow)]
pub struct RoomRow {
    pub room_id: Uuid,
    pub name: String,
    pub hourly_rate: f64,
    pub status: String,
}

impl RoomRow {
    pub fn into_room(self) -> AppResult<Room> {
        let RoomRow {
            room_id,
            name,
            hourly_rate,
            status,
        } = self;
        Ok(Room {
            id: RoomId::from(room_id),
            name,
            hourly_rate,
            status: RoomStatus::from_str(&status).map_err(|_| {
                AppError::ConversionEntityError(format!(
                    "unexpected room status {status:?}"
                ))
            })?,
        })
    }
}
