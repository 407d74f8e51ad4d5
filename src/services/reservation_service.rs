use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{self, AuditEvent},
    domain::{LoanStatus, ReservationStatus},
    dto::reservations::{
        CreateReservationRequest, FulfillReservationRequest, Fulfillment, ReservationDetail,
        ReservationList, ReservationListQuery,
    },
    entity::{
        books::Entity as Books,
        loans::{ActiveModel as LoanActive, Column as LoanCol, Entity as Loans},
        reservations::{
            ActiveModel as ResActive, Column as ResCol, Entity as Reservations, Model as ResModel,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_librarian, ensure_owner_or_librarian},
    models::{Loan, Reservation},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::{
        availability_service::count_holds,
        lookup::{book_label, books_by_id, user_label, users_by_id},
    },
    state::AppState,
};

/// Places a pending reservation for the caller.
///
/// Availability is not checked: a reservation may be placed when
/// every copy is already held. The book row lock serializes creations for the
/// same book and the partial unique index on pending `(user_id, book_id)` is
/// the final guard against duplicates.
pub async fn create_reservation(
    state: &AppState,
    user: &AuthUser,
    payload: CreateReservationRequest,
) -> AppResult<ApiResponse<Reservation>> {
    let book_id = payload.book_id;
    let txn = state.orm.begin().await?;

    let book = Books::find_by_id(book_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Book"))?;

    let pending = Reservations::find()
        .filter(
            Condition::all()
                .add(ResCol::UserId.eq(user.user_id))
                .add(ResCol::BookId.eq(book_id))
                .add(ResCol::Status.eq(ReservationStatus::Pending)),
        )
        .count(&txn)
        .await?;
    if pending > 0 {
        return Err(AppError::Conflict(
            "You already have a pending reservation for this book".into(),
        ));
    }

    if has_open_loan(&txn, user.user_id, book_id).await? {
        return Err(AppError::Conflict(
            "You hold an active or overdue loan of this book; return it before reserving again"
                .into(),
        ));
    }

    let now = Utc::now();
    let reservation = ResActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        book_id: Set(book_id),
        status: Set(ReservationStatus::Pending),
        created_at: Set(now.into()),
        expires_at: Set(state.policy.reservation_expiry_from(now).into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await
    .map_err(|err| match AppError::from(err) {
        AppError::Conflict(_) => AppError::Conflict(
            "You already have a pending reservation for this book".into(),
        ),
        other => other,
    })?;

    let (open_loans, pending) = count_holds(&txn, book_id).await?;
    if open_loans + pending > book.total_copies.max(0) as u64 {
        tracing::debug!(
            book_id = %book_id,
            total_copies = book.total_copies,
            open_loans,
            pending,
            "reservation accepted beyond available copies"
        );
    }

    txn.commit().await?;

    tracing::info!(reservation_id = %reservation.id, book_id = %book_id, user_id = %user.user_id, "reservation created");
    audit::record(
        &state.pool,
        AuditEvent::new(
            Some(user.user_id),
            "reservation_create",
            "reservations",
            serde_json::json!({ "reservation_id": reservation.id, "book_id": book_id }),
        ),
    )
    .await;

    Ok(ApiResponse::success(
        "Reservation created",
        Reservation::from(reservation),
        Some(Meta::empty()),
    ))
}

pub async fn cancel_reservation(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Reservation>> {
    let txn = state.orm.begin().await?;

    let existing = lock_reservation(&txn, id).await?;
    ensure_owner_or_librarian(user, existing.user_id)?;
    let next = existing.status.transition_to(ReservationStatus::Cancelled)?;

    let mut active: ResActive = existing.into();
    active.status = Set(next);
    active.updated_at = Set(Utc::now().into());
    let reservation = active.update(&txn).await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        AuditEvent::new(
            Some(user.user_id),
            "reservation_cancel",
            "reservations",
            serde_json::json!({ "reservation_id": reservation.id }),
        ),
    )
    .await;

    Ok(ApiResponse::success(
        "Reservation cancelled",
        Reservation::from(reservation),
        Some(Meta::empty()),
    ))
}

/// Turns a pending reservation into an active loan.
///
/// The status change and the loan insert share one transaction: either both
/// are committed or neither is.
pub async fn fulfill_reservation(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: FulfillReservationRequest,
) -> AppResult<ApiResponse<Fulfillment>> {
    ensure_librarian(user)?;
    let now = Utc::now();
    let txn = state.orm.begin().await?;

    let existing = lock_reservation(&txn, id).await?;
    if existing.user_id != payload.user_id || existing.book_id != payload.book_id {
        return Err(AppError::Validation(
            "user_id and book_id must match the reservation".into(),
        ));
    }
    let next = existing.status.transition_to(ReservationStatus::Fulfilled)?;
    if existing.expires_at.with_timezone(&Utc) < now {
        return Err(AppError::Conflict(format!(
            "reservation expired at {}",
            existing.expires_at.with_timezone(&Utc)
        )));
    }
    if has_open_loan(&txn, existing.user_id, existing.book_id).await? {
        return Err(AppError::Conflict(
            "Reader already holds an active or overdue loan of this book".into(),
        ));
    }

    let (user_id, book_id) = (existing.user_id, existing.book_id);
    let mut active: ResActive = existing.into();
    active.status = Set(next);
    active.updated_at = Set(now.into());
    let reservation = active.update(&txn).await?;

    let loan = LoanActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        book_id: Set(book_id),
        reservation_id: Set(Some(reservation.id)),
        status: Set(LoanStatus::Active),
        created_at: Set(now.into()),
        due_date: Set(state.policy.due_date_from(now).into()),
        returned_at: Set(None),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    tracing::info!(reservation_id = %reservation.id, loan_id = %loan.id, "reservation fulfilled");
    audit::record(
        &state.pool,
        AuditEvent::new(
            Some(user.user_id),
            "reservation_fulfill",
            "reservations",
            serde_json::json!({ "reservation_id": reservation.id, "loan_id": loan.id }),
        ),
    )
    .await;

    Ok(ApiResponse::success(
        "Reservation fulfilled",
        Fulfillment {
            reservation: Reservation::from(reservation),
            loan: Loan::from(loan),
        },
        Some(Meta::empty()),
    ))
}

/// Moves every pending reservation whose `expires_at` is before `as_of` to expired.
pub async fn expire_reservations(state: &AppState, as_of: DateTime<Utc>) -> AppResult<u64> {
    let result = Reservations::update_many()
        .col_expr(ResCol::Status, Expr::value(ReservationStatus::Expired))
        .col_expr(ResCol::UpdatedAt, Expr::value(as_of))
        .filter(ResCol::Status.eq(ReservationStatus::Pending))
        .filter(ResCol::ExpiresAt.lt(as_of))
        .exec(&state.orm)
        .await?;

    if result.rows_affected > 0 {
        tracing::info!(count = result.rows_affected, as_of = %as_of, "reservations expired");
    }
    Ok(result.rows_affected)
}

pub async fn list_reservations(
    state: &AppState,
    user: &AuthUser,
    query: ReservationListQuery,
) -> AppResult<ApiResponse<ReservationList>> {
    ensure_librarian(user)?;
    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(ResCol::Status.eq(status));
    }
    list_where(state, condition, Pagination::new(query.page, query.per_page)).await
}

pub async fn list_my_reservations(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReservationList>> {
    let condition = Condition::all().add(ResCol::UserId.eq(user.user_id));
    list_where(state, condition, pagination).await
}

async fn list_where(
    state: &AppState,
    condition: Condition,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReservationList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = Reservations::find()
        .filter(condition)
        .order_by_desc(ResCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let users = users_by_id(&state.orm, rows.iter().map(|r| r.user_id)).await?;
    let books = books_by_id(&state.orm, rows.iter().map(|r| r.book_id)).await?;

    let items = rows
        .into_iter()
        .map(|row| {
            let (user_name, user_email) = user_label(&users, row.user_id);
            let (book_title, book_author) = book_label(&books, row.book_id);
            ReservationDetail {
                reservation: Reservation::from(row),
                user_name,
                user_email,
                book_title,
                book_author,
            }
        })
        .collect();

    Ok(ApiResponse::success(
        "Reservations",
        ReservationList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

async fn lock_reservation<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<ResModel> {
    Reservations::find_by_id(id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Reservation"))
}

pub(crate) async fn has_open_loan<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    book_id: Uuid,
) -> AppResult<bool> {
    let open = Loans::find()
        .filter(
            Condition::all()
                .add(LoanCol::UserId.eq(user_id))
                .add(LoanCol::BookId.eq(book_id))
                .add(LoanCol::Status.is_in(LoanStatus::OPEN)),
        )
        .count(conn)
        .await?;
    Ok(open > 0)
}
