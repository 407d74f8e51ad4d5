//! Views scoped to the authenticated reader.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::{activity::ActivityFeed, fines::FineList, loans::LoanList, reservations::ReservationList},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::Pagination,
    services::{activity_service, fine_service, loan_service, reservation_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reservations", get(my_reservations))
        .route("/loans", get(my_loans))
        .route("/fines", get(my_fines))
        .route("/activity", get(my_activity))
}

#[utoipa::path(
    get,
    path = "/api/me/reservations",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 25"),
    ),
    responses((status = 200, description = "My reservations", body = ApiResponse<ReservationList>)),
    security(("bearer_auth" = [])),
    tag = "Me"
)]
pub async fn my_reservations(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ReservationList>>> {
    let resp = reservation_service::list_my_reservations(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/me/loans",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 25"),
    ),
    responses((status = 200, description = "My loans", body = ApiResponse<LoanList>)),
    security(("bearer_auth" = [])),
    tag = "Me"
)]
pub async fn my_loans(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<LoanList>>> {
    let resp = loan_service::list_my_loans(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/me/fines",
    responses((status = 200, description = "My fines", body = ApiResponse<FineList>)),
    security(("bearer_auth" = [])),
    tag = "Me"
)]
pub async fn my_fines(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<FineList>>> {
    let resp = fine_service::list_my_fines(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/me/activity",
    responses((status = 200, description = "Reservations and loans, newest first", body = ApiResponse<ActivityFeed>)),
    security(("bearer_auth" = [])),
    tag = "Me"
)]
pub async fn my_activity(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<ActivityFeed>>> {
    let resp = activity_service::my_activity(&state, &user).await?;
    Ok(Json(resp))
}
