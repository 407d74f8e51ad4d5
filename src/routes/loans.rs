use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        fines::FineList,
        loans::{CreateLoanRequest, LoanList, LoanListQuery},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Loan,
    response::ApiResponse,
    services::{fine_service, loan_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_loans).post(create_loan))
        .route("/{id}", get(get_loan))
        .route("/{id}/return", post(return_loan))
        .route("/{id}/conclude", post(conclude_loan))
        .route("/{id}/fines", get(list_loan_fines))
}

#[utoipa::path(
    get,
    path = "/api/loans",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 25"),
        ("status" = Option<String>, Query, description = "active, overdue, returned or concluded"),
    ),
    responses(
        (status = 200, description = "List loans", body = ApiResponse<LoanList>),
        (status = 403, description = "Librarian only")
    ),
    security(("bearer_auth" = [])),
    tag = "Loans"
)]
pub async fn list_loans(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<LoanListQuery>,
) -> AppResult<Json<ApiResponse<LoanList>>> {
    let resp = loan_service::list_loans(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/loans",
    request_body = CreateLoanRequest,
    responses(
        (status = 201, description = "Loan created", body = ApiResponse<Loan>),
        (status = 409, description = "Reader already holds an open loan of the book")
    ),
    security(("bearer_auth" = [])),
    tag = "Loans"
)]
pub async fn create_loan(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateLoanRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Loan>>)> {
    let resp = loan_service::create_loan(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/loans/{id}",
    params(("id" = Uuid, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Get loan", body = ApiResponse<Loan>),
        (status = 404, description = "Loan not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Loans"
)]
pub async fn get_loan(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Loan>>> {
    let resp = loan_service::get_loan(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/loans/{id}/return",
    params(("id" = Uuid, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan returned", body = ApiResponse<Loan>),
        (status = 409, description = "Loan is already closed")
    ),
    security(("bearer_auth" = [])),
    tag = "Loans"
)]
pub async fn return_loan(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Loan>>> {
    let resp = loan_service::return_loan(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/loans/{id}/conclude",
    params(("id" = Uuid, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan concluded", body = ApiResponse<Loan>),
        (status = 409, description = "Loan is already concluded")
    ),
    security(("bearer_auth" = [])),
    tag = "Loans"
)]
pub async fn conclude_loan(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Loan>>> {
    let resp = loan_service::conclude_loan(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/loans/{id}/fines",
    params(("id" = Uuid, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Fines of the loan", body = ApiResponse<FineList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Fines"
)]
pub async fn list_loan_fines(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<FineList>>> {
    let resp = fine_service::list_loan_fines(&state, &user, id).await?;
    Ok(Json(resp))
}
