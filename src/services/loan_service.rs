use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{self, AuditEvent},
    domain::LoanStatus,
    dto::loans::{CreateLoanRequest, LoanDetail, LoanList, LoanListQuery},
    entity::{
        books::Entity as Books,
        loans::{ActiveModel as LoanActive, Column as LoanCol, Entity as Loans},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_librarian, ensure_owner_or_librarian},
    models::Loan,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::{
        availability_service::count_holds,
        lookup::{book_label, books_by_id, fined_loans, user_label, users_by_id},
        reservation_service::has_open_loan,
    },
    state::AppState,
};

/// Lends a copy directly, without a reservation. Librarian only.
///
/// Like reservations, no availability guard is applied; an overbooking is only
/// logged.
pub async fn create_loan(
    state: &AppState,
    actor: &AuthUser,
    payload: CreateLoanRequest,
) -> AppResult<ApiResponse<Loan>> {
    ensure_librarian(actor)?;
    let now = Utc::now();
    if let Some(due) = payload.due_date {
        if due <= now {
            return Err(AppError::Validation("due_date must be in the future".into()));
        }
    }

    let txn = state.orm.begin().await?;

    let book = Books::find_by_id(payload.book_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Book"))?;
    Users::find_by_id(payload.user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    if has_open_loan(&txn, payload.user_id, payload.book_id).await? {
        return Err(AppError::Conflict(
            "Reader already holds an active or overdue loan of this book".into(),
        ));
    }

    let due_date = payload
        .due_date
        .unwrap_or_else(|| state.policy.due_date_from(now));
    let loan = LoanActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(payload.user_id),
        book_id: Set(payload.book_id),
        reservation_id: Set(None),
        status: Set(LoanStatus::Active),
        created_at: Set(now.into()),
        due_date: Set(due_date.into()),
        returned_at: Set(None),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let (open_loans, pending) = count_holds(&txn, payload.book_id).await?;
    if open_loans + pending > book.total_copies.max(0) as u64 {
        tracing::debug!(
            book_id = %payload.book_id,
            total_copies = book.total_copies,
            open_loans,
            pending,
            "loan created beyond available copies"
        );
    }

    txn.commit().await?;

    tracing::info!(loan_id = %loan.id, book_id = %loan.book_id, user_id = %loan.user_id, "loan created");
    audit::record(
        &state.pool,
        AuditEvent::new(
            Some(actor.user_id),
            "loan_create",
            "loans",
            serde_json::json!({ "loan_id": loan.id, "user_id": loan.user_id, "book_id": loan.book_id }),
        ),
    )
    .await;

    Ok(ApiResponse::success(
        "Loan created",
        Loan::from(loan),
        Some(Meta::empty()),
    ))
}

/// Records the physical return of the copy.
pub async fn return_loan(
    state: &AppState,
    actor: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Loan>> {
    let loan = close_loan(state, actor, id, LoanStatus::Returned).await?;
    Ok(ApiResponse::success("Loan returned", loan, Some(Meta::empty())))
}

/// Closes the loan record. Also stamps `returned_at` when it was never set.
pub async fn conclude_loan(
    state: &AppState,
    actor: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Loan>> {
    let loan = close_loan(state, actor, id, LoanStatus::Concluded).await?;
    Ok(ApiResponse::success("Loan concluded", loan, Some(Meta::empty())))
}

// Takes the same row lock as the fine sweep, so a loan is never fined after it closed.
async fn close_loan(
    state: &AppState,
    actor: &AuthUser,
    id: Uuid,
    target: LoanStatus,
) -> AppResult<Loan> {
    ensure_librarian(actor)?;
    let now = Utc::now();
    let txn = state.orm.begin().await?;

    let existing = Loans::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Loan"))?;
    let next = existing.status.transition_to(target)?;
    let returned_at = existing.returned_at.unwrap_or_else(|| now.into());

    let mut active: LoanActive = existing.into();
    active.status = Set(next);
    active.returned_at = Set(Some(returned_at));
    active.updated_at = Set(now.into());
    let loan = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(loan_id = %loan.id, status = %loan.status, "loan closed");
    audit::record(
        &state.pool,
        AuditEvent::new(
            Some(actor.user_id),
            "loan_close",
            "loans",
            serde_json::json!({ "loan_id": loan.id, "status": loan.status }),
        ),
    )
    .await;

    Ok(Loan::from(loan))
}

/// Moves every active loan whose due date is before `as_of` to overdue.
/// Must run before the fine sweep of the same cycle.
pub async fn mark_overdue_loans(state: &AppState, as_of: DateTime<Utc>) -> AppResult<u64> {
    let result = Loans::update_many()
        .col_expr(LoanCol::Status, Expr::value(LoanStatus::Overdue))
        .col_expr(LoanCol::UpdatedAt, Expr::value(as_of))
        .filter(LoanCol::Status.eq(LoanStatus::Active))
        .filter(LoanCol::DueDate.lt(as_of))
        .exec(&state.orm)
        .await?;

    if result.rows_affected > 0 {
        tracing::info!(count = result.rows_affected, as_of = %as_of, "loans marked overdue");
    }
    Ok(result.rows_affected)
}

pub async fn get_loan(state: &AppState, actor: &AuthUser, id: Uuid) -> AppResult<ApiResponse<Loan>> {
    let loan = Loans::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Loan"))?;
    ensure_owner_or_librarian(actor, loan.user_id)?;

    Ok(ApiResponse::success("Loan", Loan::from(loan), Some(Meta::empty())))
}

pub async fn list_loans(
    state: &AppState,
    actor: &AuthUser,
    query: LoanListQuery,
) -> AppResult<ApiResponse<LoanList>> {
    ensure_librarian(actor)?;
    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(LoanCol::Status.eq(status));
    }
    list_where(state, condition, Pagination::new(query.page, query.per_page)).await
}

pub async fn list_my_loans(
    state: &AppState,
    actor: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<LoanList>> {
    let condition = Condition::all().add(LoanCol::UserId.eq(actor.user_id));
    list_where(state, condition, pagination).await
}

async fn list_where(
    state: &AppState,
    condition: Condition,
    pagination: Pagination,
) -> AppResult<ApiResponse<LoanList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = Loans::find()
        .filter(condition)
        .order_by_desc(LoanCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let users = users_by_id(&state.orm, rows.iter().map(|l| l.user_id)).await?;
    let books = books_by_id(&state.orm, rows.iter().map(|l| l.book_id)).await?;
    let fined = fined_loans(&state.orm, rows.iter().map(|l| l.id)).await?;

    let items = rows
        .into_iter()
        .map(|row| {
            let (user_name, user_email) = user_label(&users, row.user_id);
            let (book_title, book_author) = book_label(&books, row.book_id);
            let has_fine = fined.contains(&row.id);
            LoanDetail {
                loan: Loan::from(row),
                user_name,
                user_email,
                book_title,
                book_author,
                has_fine,
            }
        })
        .collect();

    Ok(ApiResponse::success(
        "Loans",
        LoanList { items },
        Some(Meta::new(page, limit, total)),
    ))
}
