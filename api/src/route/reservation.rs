use axum::{
    routing::{get, post},
    Router,
};
use registry::AppRegistry;

use crate::handler::reservation::{
    assign_customer, cancel_reservation, change_player_mode, create_reservation, create_walk_in,
    end_session, join_session, leave_session, show_active_sessions, show_reservation,
    start_session,
};

pub fn build_reservation_routers() -> Router<AppRegistry> {
    let reservation_routers = Router::new()
        .route("/", post(create_reservation))
        .route("/walk-in", post(create_walk_in))
        .route("/:reservation_id", get(show_reservation))
        .route("/:reservation_id/start", post(start_session))
        .route("/:reservation_id/end", post(end_session))
        .route("/:reservation_id/cancel", post(cancel_reservation))
        .route("/:reservation_id/leave", post(leave_session))
        .route("/:reservation_id/assign-customer", post(assign_customer))
        .route("/:reservation_id/player-mode", post(change_player_mode));

    let session_routers = Router::new()
        .route("/", get(show_active_sessions))
        .route("/join", post(join_session));

    Router::new()
        .nest("/reservations", reservation_routers)
        .nest("/sessions", session_routers)
}
