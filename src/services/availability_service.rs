use sea_orm::{
    AccessMode, ColumnTrait, ConnectionTrait, EntityTrait, IsolationLevel, PaginatorTrait,
    QueryFilter, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    domain::{LoanStatus, ReservationStatus, available_copies},
    dto::books::Availability,
    entity::{
        books::Entity as Books,
        loans::{Column as LoanCol, Entity as Loans},
        reservations::{Column as ResCol, Entity as Reservations},
    },
    error::{AppError, AppResult},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Copies of `book_id` not held by an open loan or a pending reservation.
///
/// All three reads run in one read-only repeatable-read transaction, so the
/// result comes from a single snapshot and can undercount but never overcount.
pub async fn compute_availability(state: &AppState, book_id: Uuid) -> AppResult<i64> {
    let txn = state
        .orm
        .begin_with_config(
            Some(IsolationLevel::RepeatableRead),
            Some(AccessMode::ReadOnly),
        )
        .await?;
    let available = availability_in(&txn, book_id).await?;
    txn.commit().await?;
    Ok(available)
}

pub async fn get_availability(
    state: &AppState,
    book_id: Uuid,
) -> AppResult<ApiResponse<Availability>> {
    let available_copies = compute_availability(state, book_id).await?;
    Ok(ApiResponse::success(
        "Availability",
        Availability {
            book_id,
            available_copies,
        },
        Some(Meta::empty()),
    ))
}

/// Same computation against a caller-supplied connection or transaction.
pub(crate) async fn availability_in<C: ConnectionTrait>(conn: &C, book_id: Uuid) -> AppResult<i64> {
    let book = Books::find_by_id(book_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Book"))?;
    let (open_loans, pending) = count_holds(conn, book_id).await?;
    Ok(available_copies(book.total_copies, open_loans, pending))
}

/// `(open loans, pending reservations)` for a book.
pub(crate) async fn count_holds<C: ConnectionTrait>(conn: &C, book_id: Uuid) -> AppResult<(u64, u64)> {
    let open_loans = Loans::find()
        .filter(LoanCol::BookId.eq(book_id))
        .filter(LoanCol::Status.is_in(LoanStatus::OPEN))
        .count(conn)
        .await?;
    let pending = Reservations::find()
        .filter(ResCol::BookId.eq(book_id))
        .filter(ResCol::Status.eq(ReservationStatus::Pending))
        .count(conn)
        .await?;
    Ok((open_loans, pending))
}
