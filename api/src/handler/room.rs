use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use garde::Validate;

use kernel::model::id::RoomId;
use registry::AppRegistry;
use shared::error::{AppError, AppResult};

use crate::model::room::{
    CreateRoomRequest, RoomCreatedResponse, RoomResponse, RoomsResponse, UpdateRoomStatusRequest,
};

pub async fn register_room(
    State(registry): State<AppRegistry>,
    Json(req): Json<CreateRoomRequest>,
) -> AppResult<(StatusCode, Json<RoomCreatedResponse>)> {
    req.validate(&())?;
    let room_id = registry.room_repository().create(req.into()).await?;
    Ok((StatusCode::CREATED, Json(RoomCreatedResponse { room_id })))
}

pub async fn show_room_list(
    State(registry): State<AppRegistry>,
) -> AppResult<Json<RoomsResponse>> {
    registry
        .room_repository()
        .find_all()
        .await
        .map(RoomsResponse::from)
        .map(Json)
}

pub async fn show_room(
    State(registry): State<AppRegistry>,
    Path(room_id): Path<RoomId>,
) -> AppResult<Json<RoomResponse>> {
    registry
        .room_repository()
        .find_by_id(room_id)
        .await
        .and_then(|room| match room {
            Some(room) => Ok(Json(room.into())),
            None => Err(AppError::EntityNotFound(format!("room {room_id} not found"))),
        })
}

/// Operator surface for taking a room in and out of maintenance. Occupancy
/// driven by session transitions never goes through here.
pub async fn update_room_status(
    State(registry): State<AppRegistry>,
    Path(room_id): Path<RoomId>,
    Json(req): Json<UpdateRoomStatusRequest>,
) -> AppResult<StatusCode> {
    registry
        .room_repository()
        .update_status(room_id, req.status.into())
        .await
        .map(|_| StatusCode::OK)
}
