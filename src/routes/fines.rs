use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use chrono::Utc;

use crate::{
    dto::fines::{CycleReport, FineList, SweepQuery},
    error::AppResult,
    middleware::auth::{AuthUser, ensure_librarian},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    scheduler::run_sweep_cycle,
    services::fine_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_fines))
        .route("/sweep", post(sweep))
}

#[utoipa::path(
    get,
    path = "/api/fines",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 25"),
    ),
    responses(
        (status = 200, description = "List fines", body = ApiResponse<FineList>),
        (status = 403, description = "Librarian only")
    ),
    security(("bearer_auth" = [])),
    tag = "Fines"
)]
pub async fn list_fines(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<FineList>>> {
    let resp = fine_service::list_fines(&state, &user, pagination).await?;
    Ok(Json(resp))
}

/// Runs the daily cycle on demand.
#[utoipa::path(
    post,
    path = "/api/fines/sweep",
    params(
        ("as_of" = Option<String>, Query, description = "RFC 3339 instant to evaluate at, default now"),
    ),
    responses(
        (status = 200, description = "Cycle report", body = ApiResponse<CycleReport>),
        (status = 403, description = "Librarian only")
    ),
    security(("bearer_auth" = [])),
    tag = "Fines"
)]
pub async fn sweep(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<SweepQuery>,
) -> AppResult<Json<ApiResponse<CycleReport>>> {
    ensure_librarian(&user)?;
    let as_of = params.as_of.unwrap_or_else(Utc::now);
    tracing::info!(actor = %user.user_id, as_of = %as_of, "manual sweep requested");
    let report = run_sweep_cycle(&state, as_of).await?;
    Ok(Json(ApiResponse::success(
        "Sweep finished",
        report,
        Some(Meta::empty()),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Uri;
    use chrono::TimeZone;

    #[test]
    fn sweep_accepts_a_bare_request() {
        let uri: Uri = "http://localhost/api/fines/sweep".parse().unwrap();
        let Query(params) = Query::<SweepQuery>::try_from_uri(&uri).unwrap();
        assert!(params.as_of.is_none());
    }

    #[test]
    fn sweep_reads_as_of_from_the_query() {
        let uri: Uri = "http://localhost/api/fines/sweep?as_of=2025-01-11T00:00:00Z"
            .parse()
            .unwrap();
        let Query(params) = Query::<SweepQuery>::try_from_uri(&uri).unwrap();
        assert_eq!(
            params.as_of,
            Some(Utc.with_ymd_and_hms(2025, 1, 11, 0, 0, 0).unwrap())
        );
    }
}
