use async_trait::async_trait;
use derive_new::new;

use kernel::model::{
    id::RoomId,
    room::{event::CreateRoom, Room, RoomStatus},
};
use kernel::repository::room::RoomRepository;
use shared::error::{AppError, AppResult};

use crate::database::{model::room::RoomRow, ConnectionPool};

#[derive(new)]
pub struct RoomRepositoryImpl {
    db: ConnectionPool,
}

#[async_trait]
impl RoomRepository for RoomRepositoryImpl {
    async fn create(&self, event: CreateRoom) -> AppResult<RoomId> {
        let room_id = RoomId::new();
        sqlx::query(
            r#"
                INSERT INTO rooms (room_id, name, hourly_rate, status)
                VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(room_id.raw())
        .bind(&event.name)
        .bind(event.hourly_rate)
        .bind(RoomStatus::Available.to_string())
        .execute(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        Ok(room_id)
    }

    async fn find_all(&self) -> AppResult<Vec<Room>> {
        let rows: Vec<RoomRow> = sqlx::query_as(
            r#"
                SELECT room_id, name, hourly_rate, status
                FROM rooms
                ORDER BY name
            "#,
        )
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        rows.into_iter().map(RoomRow::into_room).collect()
    }

    async fn find_by_id(&self, room_id: RoomId) -> AppResult<Option<Room>> {
        let row: Option<RoomRow> = sqlx::query_as(
            r#"
                SELECT room_id, name, hourly_rate, status
                FROM rooms
                WHERE room_id = $1
            "#,
        )
        .bind(room_id.raw())
        .fetch_optional(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        row.map(RoomRow::into_room).transpose()
    }

    async fn update_status(&self, room_id: RoomId, status: RoomStatus) -> AppResult<()> {
        let res = sqlx::query("UPDATE rooms SET status = $2 WHERE room_id = $1")
            .bind(room_id.raw())
            .bind(status.to_string())
            .execute(self.db.inner_ref())
            .await
            .map_err(AppError::SpecificOperationError)?;
        if res.rows_affected() < 1 {
            return Err(AppError::NoRowsAffectedError(format!(
                "room {room_id} does not exist"
            )));
        }
        Ok(())
    }
}
