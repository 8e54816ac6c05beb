use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use derive_new::new;
use sqlx::PgConnection;

use kernel::model::{
    id::{CustomerId, ReservationId, RoomId},
    reservation::{Reservation, RESERVATION_EXPIRATION_MINUTES},
    room::Room,
};
use kernel::repository::reservation::ReservationRepository;
use shared::error::{AppError, AppResult};

use crate::database::{
    model::reservation::{
        ReservationRow, SessionMemberRow, SessionSegmentRow, STATUS_ACTIVE, STATUS_RESERVED,
    },
    ConnectionPool,
};

#[derive(new)]
pub struct ReservationRepositoryImpl {
    db: ConnectionPool,
}

#[async_trait]
impl ReservationRepository for ReservationRepositoryImpl {
    async fn add(&self, reservation: &Reservation, room: Option<&Room>) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query(
            r#"
                INSERT INTO reservations (
                    reservation_id, room_id, customer_id, customer_name,
                    access_code, access_code_generated_at, created_at,
                    actual_start_time, end_time, hourly_rate, player_mode,
                    total_cost, status, notes
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(reservation.id().raw())
        .bind(reservation.room_id().raw())
        .bind(reservation.customer_id().map(CustomerId::as_str))
        .bind(reservation.customer_name())
        .bind(reservation.access_code().map(|c| c.as_str()))
        .bind(reservation.access_code_generated_at())
        .bind(reservation.created_at())
        .bind(reservation.actual_start_time())
        .bind(reservation.end_time())
        .bind(reservation.hourly_rate())
        .bind(reservation.player_mode().to_string())
        .bind(reservation.total_cost())
        .bind(reservation.status().to_string())
        .bind(reservation.notes())
        .execute(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;

        sync_members(&mut tx, reservation).await?;
        sync_segments(&mut tx, reservation).await?;
        if let Some(room) = room {
            mirror_room_status(&mut tx, room).await?;
        }
        tx.commit().await.map_err(AppError::TransactionError)
    }

    async fn update(&self, reservation: &Reservation, room: Option<&Room>) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let res = sqlx::query(
            r#"
                UPDATE reservations
                SET customer_id = $2,
                    customer_name = $3,
                    access_code = $4,
                    access_code_generated_at = $5,
                    actual_start_time = $6,
                    end_time = $7,
                    player_mode = $8,
                    total_cost = $9,
                    status = $10,
                    notes = $11
                WHERE reservation_id = $1
            "#,
        )
        .bind(reservation.id().raw())
        .bind(reservation.customer_id().map(CustomerId::as_str))
        .bind(reservation.customer_name())
        .bind(reservation.access_code().map(|c| c.as_str()))
        .bind(reservation.access_code_generated_at())
        .bind(reservation.actual_start_time())
        .bind(reservation.end_time())
        .bind(reservation.player_mode().to_string())
        .bind(reservation.total_cost())
        .bind(reservation.status().to_string())
        .bind(reservation.notes())
        .execute(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;
        if res.rows_affected() < 1 {
            return Err(AppError::NoRowsAffectedError(format!(
                "reservation {} does not exist",
                reservation.id()
            )));
        }

        sync_members(&mut tx, reservation).await?;
        sync_segments(&mut tx, reservation).await?;
        if let Some(room) = room {
            mirror_room_status(&mut tx, room).await?;
        }
        tx.commit().await.map_err(AppError::TransactionError)
    }

    async fn find_by_id(&self, reservation_id: ReservationId) -> AppResult<Option<Reservation>> {
        let row: Option<ReservationRow> = sqlx::query_as(
            r#"
                SELECT
                    reservation_id, room_id, customer_id, customer_name,
                    access_code, access_code_generated_at, created_at,
                    actual_start_time, end_time, hourly_rate, player_mode,
                    total_cost, status, notes
                FROM reservations
                WHERE reservation_id = $1
            "#,
        )
        .bind(reservation_id.raw())
        .fetch_optional(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        row.map(|r| r.into_reservation(Vec::new(), Vec::new()))
            .transpose()
    }

    async fn find_with_members(
        &self,
        reservation_id: ReservationId,
    ) -> AppResult<Option<Reservation>> {
        let row: Option<ReservationRow> = sqlx::query_as(
            r#"
                SELECT
                    reservation_id, room_id, customer_id, customer_name,
                    access_code, access_code_generated_at, created_at,
                    actual_start_time, end_time, hourly_rate, player_mode,
                    total_cost, status, notes
                FROM reservations
                WHERE reservation_id = $1
            "#,
        )
        .bind(reservation_id.raw())
        .fetch_optional(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        match row {
            None => Ok(None),
            Some(row) => self.hydrate(row).await.map(Some),
        }
    }

    async fn find_active_or_reserved_by_customer(
        &self,
        customer_id: &CustomerId,
    ) -> AppResult<Option<Reservation>> {
        let row: Option<ReservationRow> = sqlx::query_as(
            r#"
                SELECT
                    reservation_id, room_id, customer_id, customer_name,
                    access_code, access_code_generated_at, created_at,
                    actual_start_time, end_time, hourly_rate, player_mode,
                    total_cost, status, notes
                FROM reservations
                WHERE customer_id = $1 AND status IN ($2, $3)
                LIMIT 1
            "#,
        )
        .bind(customer_id.as_str())
        .bind(STATUS_ACTIVE)
        .bind(STATUS_RESERVED)
        .fetch_optional(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        row.map(|r| r.into_reservation(Vec::new(), Vec::new()))
            .transpose()
    }

    // Not scoped to the current day: any open reservation blocks the room,
    // and the no-show sweep keeps stale Reserved rows from lingering.
    async fn find_active_or_reserved_for_room(
        &self,
        room_id: RoomId,
    ) -> AppResult<Vec<Reservation>> {
        let rows: Vec<ReservationRow> = sqlx::query_as(
            r#"
                SELECT
                    reservation_id, room_id, customer_id, customer_name,
                    access_code, access_code_generated_at, created_at,
                    actual_start_time, end_time, hourly_rate, player_mode,
                    total_cost, status, notes
                FROM reservations
                WHERE room_id = $1 AND status IN ($2, $3)
                ORDER BY created_at
            "#,
        )
        .bind(room_id.raw())
        .bind(STATUS_ACTIVE)
        .bind(STATUS_RESERVED)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        rows.into_iter()
            .map(|r| r.into_reservation(Vec::new(), Vec::new()))
            .collect()
    }

    async fn find_active_sessions(&self) -> AppResult<Vec<Reservation>> {
        let rows: Vec<ReservationRow> = sqlx::query_as(
            r#"
                SELECT
                    reservation_id, room_id, customer_id, customer_name,
                    access_code, access_code_generated_at, created_at,
                    actual_start_time, end_time, hourly_rate, player_mode,
                    total_cost, status, notes
                FROM reservations
                WHERE status = $1
                ORDER BY actual_start_time
            "#,
        )
        .bind(STATUS_ACTIVE)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            sessions.push(self.hydrate(row).await?);
        }
        Ok(sessions)
    }

    async fn find_by_access_code(&self, code: &str) -> AppResult<Option<Reservation>> {
        let row: Option<ReservationRow> = sqlx::query_as(
            r#"
                SELECT
                    reservation_id, room_id, customer_id, customer_name,
                    access_code, access_code_generated_at, created_at,
                    actual_start_time, end_time, hourly_rate, player_mode,
                    total_cost, status, notes
                FROM reservations
                WHERE access_code = $1 AND status = $2
            "#,
        )
        .bind(code)
        .bind(STATUS_ACTIVE)
        .fetch_optional(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        match row {
            None => Ok(None),
            Some(row) => self.hydrate(row).await.map(Some),
        }
    }

    async fn access_code_in_use(&self, code: &str) -> AppResult<bool> {
        let in_use: bool = sqlx::query_scalar(
            r#"
                SELECT EXISTS (
                    SELECT 1 FROM reservations
                    WHERE access_code = $1 AND status = $2
                )
            "#,
        )
        .bind(code)
        .bind(STATUS_ACTIVE)
        .fetch_one(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        Ok(in_use)
    }

    async fn find_expired_reserved(&self, now: DateTime<Utc>) -> AppResult<Vec<Reservation>> {
        let cutoff = now - Duration::minutes(RESERVATION_EXPIRATION_MINUTES);
        let rows: Vec<ReservationRow> = sqlx::query_as(
            r#"
                SELECT
                    reservation_id, room_id, customer_id, customer_name,
                    access_code, access_code_generated_at, created_at,
                    actual_start_time, end_time, hourly_rate, player_mode,
                    total_cost, status, notes
                FROM reservations
                WHERE status = $1 AND created_at <= $2
                ORDER BY created_at
            "#,
        )
        .bind(STATUS_RESERVED)
        .bind(cutoff)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        rows.into_iter()
            .map(|r| r.into_reservation(Vec::new(), Vec::new()))
            .collect()
    }
}

impl ReservationRepositoryImpl {
    async fn hydrate(&self, row: ReservationRow) -> AppResult<Reservation> {
        let members: Vec<SessionMemberRow> = sqlx::query_as(
            r#"
                SELECT reservation_id, customer_id, customer_name, joined_at, role
                FROM session_members
                WHERE reservation_id = $1
                ORDER BY joined_at
            "#,
        )
        .bind(row.reservation_id)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        let segments: Vec<SessionSegmentRow> = sqlx::query_as(
            r#"
                SELECT reservation_id, player_mode, hourly_rate, start_time, end_time
                FROM session_segments
                WHERE reservation_id = $1
                ORDER BY start_time
            "#,
        )
        .bind(row.reservation_id)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        row.into_reservation(members, segments)
    }
}

async fn sync_members(conn: &mut PgConnection, reservation: &Reservation) -> AppResult<()> {
    sqlx::query("DELETE FROM session_members WHERE reservation_id = $1")
        .bind(reservation.id().raw())
        .execute(&mut *conn)
        .await
        .map_err(AppError::SpecificOperationError)?;
    for member in reservation.members() {
        sqlx::query(
            r#"
                INSERT INTO session_members
                    (reservation_id, customer_id, customer_name, joined_at, role)
                VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(member.reservation_id.raw())
        .bind(member.customer_id.as_str())
        .bind(member.customer_name.as_deref())
        .bind(member.joined_at)
        .bind(member.role.to_string())
        .execute(&mut *conn)
        .await
        .map_err(AppError::SpecificOperationError)?;
    }
    Ok(())
}

async fn sync_segments(conn: &mut PgConnection, reservation: &Reservation) -> AppResult<()> {
    sqlx::query("DELETE FROM session_segments WHERE reservation_id = $1")
        .bind(reservation.id().raw())
        .execute(&mut *conn)
        .await
        .map_err(AppError::SpecificOperationError)?;
    for segment in reservation.segments() {
        sqlx::query(
            r#"
                INSERT INTO session_segments
                    (reservation_id, player_mode, hourly_rate, start_time, end_time)
                VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(segment.reservation_id.raw())
        .bind(segment.player_mode.to_string())
        .bind(segment.hourly_rate)
        .bind(segment.start_time)
        .bind(segment.end_time)
        .execute(&mut *conn)
        .await
        .map_err(AppError::SpecificOperationError)?;
    }
    Ok(())
}

async fn mirror_room_status(conn: &mut PgConnection, room: &Room) -> AppResult<()> {
    let res = sqlx::query("UPDATE rooms SET status = $2 WHERE room_id = $1")
        .bind(room.id.raw())
        .bind(room.status.to_string())
        .execute(&mut *conn)
        .await
        .map_err(AppError::SpecificOperationError)?;
    if res.rows_affected() < 1 {
        return Err(AppError::NoRowsAffectedError(format!(
            "room {} does not exist",
            room.id
        )));
    }
    Ok(())
}
