use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::reservations::{
        CreateReservationRequest, FulfillReservationRequest, Fulfillment, ReservationList,
        ReservationListQuery,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Reservation,
    response::ApiResponse,
    services::reservation_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_reservations).post(create_reservation))
        .route("/{id}/cancel", post(cancel_reservation))
        .route("/{id}/fulfill", post(fulfill_reservation))
}

#[utoipa::path(
    get,
    path = "/api/reservations",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 25"),
        ("status" = Option<String>, Query, description = "pending, fulfilled, cancelled or expired"),
    ),
    responses(
        (status = 200, description = "List reservations", body = ApiResponse<ReservationList>),
        (status = 403, description = "Librarian only")
    ),
    security(("bearer_auth" = [])),
    tag = "Reservations"
)]
pub async fn list_reservations(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ReservationListQuery>,
) -> AppResult<Json<ApiResponse<ReservationList>>> {
    let resp = reservation_service::list_reservations(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/reservations",
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Reservation placed", body = ApiResponse<Reservation>),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Duplicate pending reservation or open loan")
    ),
    security(("bearer_auth" = [])),
    tag = "Reservations"
)]
pub async fn create_reservation(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateReservationRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Reservation>>)> {
    let resp = reservation_service::create_reservation(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/reservations/{id}/cancel",
    params(("id" = Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation cancelled", body = ApiResponse<Reservation>),
        (status = 409, description = "Reservation is no longer pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Reservations"
)]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Reservation>>> {
    let resp = reservation_service::cancel_reservation(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/reservations/{id}/fulfill",
    params(("id" = Uuid, Path, description = "Reservation ID")),
    request_body = FulfillReservationRequest,
    responses(
        (status = 200, description = "Reservation fulfilled and loan created", body = ApiResponse<Fulfillment>),
        (status = 409, description = "Reservation is no longer pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Reservations"
)]
pub async fn fulfill_reservation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<FulfillReservationRequest>,
) -> AppResult<Json<ApiResponse<Fulfillment>>> {
    let resp = reservation_service::fulfill_reservation(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
