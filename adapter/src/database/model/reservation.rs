use std::str::FromStr;

use chrono::{DateTime, Utc};
use kernel::model::{
    id::{CustomerId, ReservationId, RoomId},
    reservation::{
        access_code::AccessCode, MemberRole, PlayerMode, Reservation, ReservationRecord,
        SessionMember, SessionSegment,
    },
};
use shared::error::{AppError, AppResult};
use uuid::Uuid;

#[derive(sqlx::FromRow)]
pub struct ReservationRow {
    pub reservation_id: Uuid,
    pub room_id: Uuid,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub access_code: Option<String>,
    pub access_code_generated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub hourly_rate: f64,
    pub player_mode: String,
    pub total_cost: Option<f64>,
    pub status: String,
    pub notes: Option<String>,
}

#[derive(sqlx::FromRow)]
pub struct SessionMemberRow {
    pub reservation_id: Uuid,
    pub customer_id: String,
    pub customer_name: Option<String>,
    pub joined_at: DateTime<Utc>,
    pub role: String,
}

#[derive(sqlx::FromRow)]
pub struct SessionSegmentRow {
    pub reservation_id: Uuid,
    pub player_mode: String,
    pub hourly_rate: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl ReservationRow {
    /// Rehydrates the aggregate from the joined rows. Statuses and codes are
    /// stored as text, so conversion can fail on corrupt data.
    pub fn into_reservation(
        self,
        members: Vec<SessionMemberRow>,
        segments: Vec<SessionSegmentRow>,
    ) -> AppResult<Reservation> {
        let ReservationRow {
            reservation_id,
            room_id,
            customer_id,
            customer_name,
            access_code,
            access_code_generated_at,
            created_at,
            actual_start_time,
            end_time,
            hourly_rate,
            player_mode,
            total_cost,
            status,
            notes,
        } = self;
        let members = members
            .into_iter()
            .map(SessionMemberRow::into_member)
            .collect::<AppResult<Vec<_>>>()?;
        let segments = segments
            .into_iter()
            .map(SessionSegmentRow::into_segment)
            .collect::<AppResult<Vec<_>>>()?;
        let record = ReservationRecord {
            id: ReservationId::from(reservation_id),
            room_id: RoomId::from(room_id),
            customer_id: customer_id.map(CustomerId::new),
            customer_name,
            access_code: access_code
                .as_deref()
                .map(AccessCode::parse)
                .transpose()
                .map_err(|e| AppError::ConversionEntityError(e.to_string()))?,
            access_code_generated_at,
            members,
            segments,
            created_at,
            actual_start_time,
            end_time,
            hourly_rate,
            player_mode: parse_enum(&player_mode)?,
            total_cost,
            status: parse_enum(&status)?,
            notes,
        };
        Ok(record.into())
    }
}

impl SessionMemberRow {
    pub fn into_member(self) -> AppResult<SessionMember> {
        let SessionMemberRow {
            reservation_id,
            customer_id,
            customer_name,
            joined_at,
            role,
        } = self;
        Ok(SessionMember {
            reservation_id: ReservationId::from(reservation_id),
            customer_id: CustomerId::new(customer_id),
            customer_name,
            joined_at,
            role: parse_enum::<MemberRole>(&role)?,
        })
    }
}

impl SessionSegmentRow {
    pub fn into_segment(self) -> AppResult<SessionSegment> {
        let SessionSegmentRow {
            reservation_id,
            player_mode,
            hourly_rate,
            start_time,
            end_time,
        } = self;
        Ok(SessionSegment {
            reservation_id: ReservationId::from(reservation_id),
            player_mode: parse_enum::<PlayerMode>(&player_mode)?,
            hourly_rate,
            start_time,
            end_time,
        })
    }
}

fn parse_enum<T: FromStr>(value: &str) -> AppResult<T> {
    T::from_str(value).map_err(|_| {
        AppError::ConversionEntityError(format!(
            "unexpected value {value:?} for {}",
            std::any::type_name::<T>()
        ))
    })
}

// Stored status names used by queries that filter on status; they are the
// strum Display renderings of ReservationStatus.
pub const STATUS_RESERVED: &str = "Reserved";
pub const STATUS_ACTIVE: &str = "Active";

#[cfg(test)]
mod tests {
    use kernel::model::reservation::ReservationStatus;

    use super::*;

    #[test]
    fn status_filter_names_match_the_stored_rendering() {
        assert_eq!(ReservationStatus::Reserved.to_string(), STATUS_RESERVED);
        assert_eq!(ReservationStatus::Active.to_string(), STATUS_ACTIVE);
    }

    #[test]
    fn rows_rehydrate_into_the_aggregate() {
        let id = Uuid::new_v4();
        let row = ReservationRow {
            reservation_id: id,
            room_id: Uuid::new_v4(),
            customer_id: Some("cust-1".into()),
            customer_name: Some("Mika".into()),
            access_code: Some("7711".into()),
            access_code_generated_at: Some(Utc::now()),
            created_at: Utc::now(),
            actual_start_time: Some(Utc::now()),
            end_time: None,
            hourly_rate: 80.0,
            player_mode: "Single".into(),
            total_cost: None,
            status: "Active".into(),
            notes: None,
        };
        let members = vec![SessionMemberRow {
            reservation_id: id,
            customer_id: "cust-1".into(),
            customer_name: Some("Mika".into()),
            joined_at: Utc::now(),
            role: "Owner".into(),
        }];
        let reservation = row.into_reservation(members, Vec::new()).unwrap();
        assert_eq!(reservation.status(), ReservationStatus::Active);
        assert_eq!(reservation.access_code().unwrap().as_str(), "7711");
        assert_eq!(reservation.members().len(), 1);
    }

    #[test]
    fn corrupt_status_is_a_conversion_error() {
        let row = ReservationRow {
            reservation_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            customer_id: None,
            customer_name: None,
            access_code: None,
            access_code_generated_at: None,
            created_at: Utc::now(),
            actual_start_time: None,
            end_time: None,
            hourly_rate: 80.0,
            player_mode: "Single".into(),
            total_cost: None,
            status: "Paused".into(),
            notes: None,
        };
        let err = row.into_reservation(Vec::new(), Vec::new()).unwrap_err();
        assert!(matches!(err, AppError::ConversionEntityError(_)));
    }
}
