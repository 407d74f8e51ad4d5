use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::{
    dto::activity::{ActivityFeed, ActivityItem},
    entity::{
        loans::{Column as LoanCol, Entity as Loans},
        reservations::{Column as ResCol, Entity as Reservations},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Loan, Reservation},
    response::{ApiResponse, Meta},
    services::lookup::{book_label, books_by_id, fined_loans},
    state::AppState,
};

/// The caller's reservations and loans, newest first.
pub async fn my_activity(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<ActivityFeed>> {
    let reservations = Reservations::find()
        .filter(ResCol::UserId.eq(user.user_id))
        .order_by_desc(ResCol::CreatedAt)
        .all(&state.orm)
        .await?;
    let loans = Loans::find()
        .filter(LoanCol::UserId.eq(user.user_id))
        .order_by_desc(LoanCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let books = books_by_id(
        &state.orm,
        reservations
            .iter()
            .map(|r| r.book_id)
            .chain(loans.iter().map(|l| l.book_id)),
    )
    .await?;
    let fined = fined_loans(&state.orm, loans.iter().map(|l| l.id)).await?;

    let mut items: Vec<ActivityItem> = Vec::with_capacity(reservations.len() + loans.len());
    for row in reservations {
        let (book_title, book_author) = book_label(&books, row.book_id);
        items.push(ActivityItem::Reservation {
            reservation: Reservation::from(row),
            book_title,
            book_author,
        });
    }
    for row in loans {
        let (book_title, book_author) = book_label(&books, row.book_id);
        let has_fine = fined.contains(&row.id);
        items.push(ActivityItem::Loan {
            loan: Loan::from(row),
            book_title,
            book_author,
            has_fine,
        });
    }
    items.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

    Ok(ApiResponse::success(
        "Activity",
        ActivityFeed { items },
        Some(Meta::empty()),
    ))
}
