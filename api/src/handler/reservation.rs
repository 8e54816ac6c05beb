use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use garde::Validate;

use kernel::model::{
    id::{CustomerId, ReservationId, RoomId},
    reservation::{
        access_code::{AccessCode, RandomDigits},
        Reservation, ReservationStatus,
    },
    room::Room,
};
use kernel::repository::reservation::ReservationRepository;
use registry::AppRegistry;
use shared::error::{AppError, AppResult};

use crate::model::reservation::{
    AssignCustomerRequest, ChangePlayerModeRequest, CreateReservationRequest, CreateWalkInRequest,
    JoinSessionRequest, LeaveSessionRequest, ReservationResponse, SessionsResponse,
};

/// How many candidate codes to try before giving up; 100 codes exist in
/// total, so exhaustion means the lounge is effectively full.
const ACCESS_CODE_ATTEMPTS: usize = 10;

pub async fn create_reservation(
    State(registry): State<AppRegistry>,
    Json(req): Json<CreateReservationRequest>,
) -> AppResult<(StatusCode, Json<ReservationResponse>)> {
    req.validate(&())?;
    let CreateReservationRequest {
        room_id,
        customer_id,
        customer_name,
        hourly_rate,
        notes,
        created_by_admin,
    } = req;

    let room = find_room(&registry, room_id).await?;
    require_room_free(registry.reservation_repository().as_ref(), &room).await?;
    let customer_id = CustomerId::new(customer_id);
    if !created_by_admin {
        require_no_open_engagement(registry.reservation_repository().as_ref(), &customer_id)
            .await?;
    }

    let mut reservation = Reservation::reserve(
        room.id,
        customer_id,
        customer_name,
        hourly_rate.unwrap_or(room.hourly_rate),
        notes,
        Utc::now(),
    )?;
    registry
        .reservation_repository()
        .add(&reservation, None)
        .await?;
    publish_events(&registry, &mut reservation).await;

    Ok((StatusCode::CREATED, Json((&reservation).into())))
}

pub async fn create_walk_in(
    State(registry): State<AppRegistry>,
    Json(req): Json<CreateWalkInRequest>,
) -> AppResult<(StatusCode, Json<ReservationResponse>)> {
    req.validate(&())?;
    let CreateWalkInRequest {
        room_id,
        customer_id,
        customer_name,
        hourly_rate,
        player_mode,
        notes,
    } = req;

    let mut room = find_room(&registry, room_id).await?;
    require_room_free(registry.reservation_repository().as_ref(), &room).await?;

    let code = allocate_access_code(registry.reservation_repository().as_ref()).await?;
    let now = Utc::now();
    let rate = hourly_rate.unwrap_or(room.hourly_rate);
    let mut reservation = match customer_id {
        Some(customer_id) => {
            let customer_id = CustomerId::new(customer_id);
            require_no_open_engagement(registry.reservation_repository().as_ref(), &customer_id)
                .await?;
            Reservation::walk_in(
                room.id,
                customer_id,
                customer_name,
                rate,
                player_mode.into(),
                notes,
                code,
                now,
            )?
        }
        None => Reservation::walk_in_without_owner(
            room.id,
            rate,
            player_mode.into(),
            notes,
            code,
            now,
        )?,
    };

    room.set_occupied();
    registry
        .reservation_repository()
        .add(&reservation, Some(&room))
        .await?;
    publish_events(&registry, &mut reservation).await;

    Ok((StatusCode::CREATED, Json((&reservation).into())))
}

pub async fn start_session(
    State(registry): State<AppRegistry>,
    Path(reservation_id): Path<ReservationId>,
) -> AppResult<Json<ReservationResponse>> {
    let mut reservation = find_reservation(&registry, reservation_id).await?;
    let mut room = find_room(&registry, reservation.room_id()).await?;

    let code = allocate_access_code(registry.reservation_repository().as_ref()).await?;
    reservation.start_session(code, Utc::now())?;
    room.set_occupied();
    registry
        .reservation_repository()
        .update(&reservation, Some(&room))
        .await?;
    publish_events(&registry, &mut reservation).await;

    Ok(Json((&reservation).into()))
}

pub async fn end_session(
    State(registry): State<AppRegistry>,
    Path(reservation_id): Path<ReservationId>,
) -> AppResult<Json<ReservationResponse>> {
    let mut reservation = find_reservation(&registry, reservation_id).await?;
    let mut room = find_room(&registry, reservation.room_id()).await?;

    reservation.end_session(Utc::now())?;
    room.set_available();
    registry
        .reservation_repository()
        .update(&reservation, Some(&room))
        .await?;
    publish_events(&registry, &mut reservation).await;

    Ok(Json((&reservation).into()))
}

pub async fn cancel_reservation(
    State(registry): State<AppRegistry>,
    Path(reservation_id): Path<ReservationId>,
) -> AppResult<Json<ReservationResponse>> {
    let mut reservation = find_reservation(&registry, reservation_id).await?;
    let was_active = reservation.status() == ReservationStatus::Active;

    reservation.cancel()?;
    // The room only needs freeing if the session actually occupied it.
    let room = if was_active {
        let mut room = find_room(&registry, reservation.room_id()).await?;
        room.set_available();
        Some(room)
    } else {
        None
    };
    registry
        .reservation_repository()
        .update(&reservation, room.as_ref())
        .await?;
    publish_events(&registry, &mut reservation).await;

    Ok(Json((&reservation).into()))
}

pub async fn join_session(
    State(registry): State<AppRegistry>,
    Json(req): Json<JoinSessionRequest>,
) -> AppResult<Json<ReservationResponse>> {
    req.validate(&())?;
    let JoinSessionRequest {
        access_code,
        customer_id,
        customer_name,
    } = req;

    let mut reservation = registry
        .reservation_repository()
        .find_by_access_code(&access_code)
        .await?
        .ok_or_else(|| {
            AppError::EntityNotFound("no active session with that access code".into())
        })?;
    reservation.add_member(CustomerId::new(customer_id), customer_name, Utc::now())?;
    registry
        .reservation_repository()
        .update(&reservation, None)
        .await?;

    Ok(Json((&reservation).into()))
}

pub async fn leave_session(
    State(registry): State<AppRegistry>,
    Path(reservation_id): Path<ReservationId>,
    Json(req): Json<LeaveSessionRequest>,
) -> AppResult<Json<ReservationResponse>> {
    req.validate(&())?;
    let mut reservation = find_reservation(&registry, reservation_id).await?;
    reservation.remove_member(&CustomerId::new(req.customer_id))?;
    registry
        .reservation_repository()
        .update(&reservation, None)
        .await?;

    Ok(Json((&reservation).into()))
}

pub async fn assign_customer(
    State(registry): State<AppRegistry>,
    Path(reservation_id): Path<ReservationId>,
    Json(req): Json<AssignCustomerRequest>,
) -> AppResult<Json<ReservationResponse>> {
    req.validate(&())?;
    let AssignCustomerRequest {
        customer_id,
        customer_name,
    } = req;

    let mut reservation = find_reservation(&registry, reservation_id).await?;
    reservation.assign_customer(CustomerId::new(customer_id), customer_name, Utc::now())?;
    registry
        .reservation_repository()
        .update(&reservation, None)
        .await?;

    Ok(Json((&reservation).into()))
}

pub async fn change_player_mode(
    State(registry): State<AppRegistry>,
    Path(reservation_id): Path<ReservationId>,
    Json(req): Json<ChangePlayerModeRequest>,
) -> AppResult<Json<ReservationResponse>> {
    req.validate(&())?;
    let ChangePlayerModeRequest {
        player_mode,
        hourly_rate,
    } = req;

    let mut reservation = find_reservation(&registry, reservation_id).await?;
    let rate = hourly_rate.unwrap_or_else(|| reservation.hourly_rate());
    reservation.change_player_mode(player_mode.into(), rate, Utc::now())?;
    registry
        .reservation_repository()
        .update(&reservation, None)
        .await?;

    Ok(Json((&reservation).into()))
}

pub async fn show_reservation(
    State(registry): State<AppRegistry>,
    Path(reservation_id): Path<ReservationId>,
) -> AppResult<Json<ReservationResponse>> {
    let reservation = find_reservation(&registry, reservation_id).await?;
    Ok(Json((&reservation).into()))
}

pub async fn show_active_sessions(
    State(registry): State<AppRegistry>,
) -> AppResult<Json<SessionsResponse>> {
    registry
        .reservation_repository()
        .find_active_sessions()
        .await
        .map(SessionsResponse::from)
        .map(Json)
}

async fn find_reservation(
    registry: &AppRegistry,
    reservation_id: ReservationId,
) -> AppResult<Reservation> {
    registry
        .reservation_repository()
        .find_with_members(reservation_id)
        .await?
        .ok_or_else(|| {
            AppError::EntityNotFound(format!("reservation {reservation_id} not found"))
        })
}

async fn find_room(registry: &AppRegistry, room_id: RoomId) -> AppResult<Room> {
    registry
        .room_repository()
        .find_by_id(room_id)
        .await?
        .ok_or_else(|| AppError::EntityNotFound(format!("room {room_id} not found")))
}

async fn require_room_free(repo: &dyn ReservationRepository, room: &Room) -> AppResult<()> {
    if !room.is_physically_available() {
        return Err(AppError::ResourceConflict(format!(
            "room {} is {}",
            room.id, room.status
        )));
    }
    let open = repo.find_active_or_reserved_for_room(room.id).await?;
    if !open.is_empty() {
        return Err(AppError::ResourceConflict(format!(
            "room {} already has an open reservation",
            room.id
        )));
    }
    Ok(())
}

async fn require_no_open_engagement(
    repo: &dyn ReservationRepository,
    customer_id: &CustomerId,
) -> AppResult<()> {
    if let Some(existing) = repo
        .find_active_or_reserved_by_customer(customer_id)
        .await?
    {
        return Err(AppError::ResourceConflict(format!(
            "customer {customer_id} already holds reservation {}",
            existing.id()
        )));
    }
    Ok(())
}

/// Draws candidate codes until one is not held by an active session. Runs
/// inside the same request as the transition it accompanies, so the code
/// handed out is valid at commit time.
async fn allocate_access_code(repo: &dyn ReservationRepository) -> AppResult<AccessCode> {
    let mut digits = RandomDigits;
    for _ in 0..ACCESS_CODE_ATTEMPTS {
        let code = AccessCode::generate(&mut digits);
        if !repo.access_code_in_use(code.as_str()).await? {
            return Ok(code);
        }
    }
    Err(AppError::ResourceConflict(
        "could not allocate a unique access code; too many active sessions".into(),
    ))
}

/// Dispatches the events queued by the transition that just committed.
/// Publishing is fire-and-forget: a sink failure is logged, never surfaced.
pub async fn publish_events(registry: &AppRegistry, reservation: &mut Reservation) {
    for event in reservation.take_events() {
        if let Err(e) = registry.event_publisher().publish(&event).await {
            tracing::warn!(
                error.cause_chain = ?e,
                reservation_id = %event.reservation_id(),
                "failed to publish session event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::DateTime;
    use kernel::model::room::RoomStatus;

    use super::*;

    /// In-memory repository scripting the lookups the guards depend on.
    #[derive(Default)]
    struct StubReservationRepository {
        // The first N code draws report a collision.
        colliding_draws: usize,
        draws: AtomicUsize,
        room_reservations: usize,
        customer_engaged: bool,
    }

    fn open_reservation() -> Reservation {
        Reservation::reserve(
            RoomId::new(),
            CustomerId::new("cust-1"),
            None,
            100.0,
            None,
            Utc::now(),
        )
        .unwrap()
    }

    fn free_room() -> Room {
        Room {
            id: RoomId::new(),
            name: "PS Room 1".into(),
            hourly_rate: 80.0,
            status: RoomStatus::Available,
        }
    }

    #[async_trait]
    impl ReservationRepository for StubReservationRepository {
        async fn add(&self, _: &Reservation, _: Option<&Room>) -> AppResult<()> {
            Ok(())
        }

        async fn update(&self, _: &Reservation, _: Option<&Room>) -> AppResult<()> {
            Ok(())
        }

        async fn find_by_id(&self, _: ReservationId) -> AppResult<Option<Reservation>> {
            Ok(None)
        }

        async fn find_with_members(&self, _: ReservationId) -> AppResult<Option<Reservation>> {
            Ok(None)
        }

        async fn find_active_or_reserved_by_customer(
            &self,
            _: &CustomerId,
        ) -> AppResult<Option<Reservation>> {
            Ok(self.customer_engaged.then(open_reservation))
        }

        async fn find_active_or_reserved_for_room(
            &self,
            _: RoomId,
        ) -> AppResult<Vec<Reservation>> {
            Ok((0..self.room_reservations)
                .map(|_| open_reservation())
                .collect())
        }

        async fn find_active_sessions(&self) -> AppResult<Vec<Reservation>> {
            Ok(Vec::new())
        }

        async fn find_by_access_code(&self, _: &str) -> AppResult<Option<Reservation>> {
            Ok(None)
        }

        async fn access_code_in_use(&self, _: &str) -> AppResult<bool> {
            let draw = self.draws.fetch_add(1, Ordering::SeqCst);
            Ok(draw < self.colliding_draws)
        }

        async fn find_expired_reserved(
            &self,
            _: DateTime<Utc>,
        ) -> AppResult<Vec<Reservation>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn code_allocation_retries_past_colliding_draws() {
        let repo = StubReservationRepository {
            colliding_draws: 3,
            ..Default::default()
        };
        let code = allocate_access_code(&repo).await.unwrap();
        assert_eq!(repo.draws.load(Ordering::SeqCst), 4);
        assert_eq!(code.as_str().len(), 4);
    }

    #[tokio::test]
    async fn code_allocation_fails_once_candidates_are_exhausted() {
        let repo = StubReservationRepository {
            colliding_draws: usize::MAX,
            ..Default::default()
        };
        let err = allocate_access_code(&repo).await.unwrap_err();
        assert!(matches!(err, AppError::ResourceConflict(_)));
        assert_eq!(repo.draws.load(Ordering::SeqCst), ACCESS_CODE_ATTEMPTS);
    }

    #[tokio::test]
    async fn rooms_with_an_open_reservation_reject_new_engagements() {
        let repo = StubReservationRepository {
            room_reservations: 1,
            ..Default::default()
        };
        let err = require_room_free(&repo, &free_room()).await.unwrap_err();
        assert!(matches!(err, AppError::ResourceConflict(_)));

        let repo = StubReservationRepository::default();
        assert!(require_room_free(&repo, &free_room()).await.is_ok());
    }

    #[tokio::test]
    async fn rooms_under_maintenance_are_rejected() {
        let repo = StubReservationRepository::default();
        let mut room = free_room();
        room.status = RoomStatus::Maintenance;
        let err = require_room_free(&repo, &room).await.unwrap_err();
        assert!(matches!(err, AppError::ResourceConflict(_)));
    }

    #[tokio::test]
    async fn customers_hold_at_most_one_open_engagement() {
        let repo = StubReservationRepository {
            customer_engaged: true,
            ..Default::default()
        };
        let err = require_no_open_engagement(&repo, &CustomerId::new("cust-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ResourceConflict(_)));

        let repo = StubReservationRepository::default();
        assert!(
            require_no_open_engagement(&repo, &CustomerId::new("cust-1"))
                .await
                .is_ok()
        );
    }
}
