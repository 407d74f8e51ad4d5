use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    dto::reviews::{CreateReviewRequest, ReviewDetail, ReviewList},
    entity::{
        books::Entity as Books,
        reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_owner_or_librarian},
    models::Review,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::lookup::{user_label, users_by_id},
    state::AppState,
};

/// Every review currently carries the top rating.
pub const DEFAULT_RATING: i16 = 5;

pub async fn create_review(
    state: &AppState,
    user: &AuthUser,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    Books::find_by_id(payload.book_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Book"))?;

    let comment = payload
        .comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let review = ReviewActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        book_id: Set(payload.book_id),
        rating: Set(DEFAULT_RATING),
        comment: Set(comment),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|err| match AppError::from(err) {
        AppError::Conflict(_) => AppError::Conflict("You already reviewed this book".into()),
        other => other,
    })?;

    Ok(ApiResponse::success(
        "Review created",
        Review::from(review),
        Some(Meta::empty()),
    ))
}

pub async fn list_book_reviews(
    state: &AppState,
    book_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReviewList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = Reviews::find()
        .filter(ReviewCol::BookId.eq(book_id))
        .order_by_desc(ReviewCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let users = users_by_id(&state.orm, rows.iter().map(|r| r.user_id)).await?;

    let items = rows
        .into_iter()
        .map(|row| {
            let (user_name, _) = user_label(&users, row.user_id);
            ReviewDetail {
                review: Review::from(row),
                user_name,
            }
        })
        .collect();

    Ok(ApiResponse::success(
        "Reviews",
        ReviewList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn delete_review(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let review = Reviews::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Review"))?;
    ensure_owner_or_librarian(user, review.user_id)?;
    review.delete(&state.orm).await?;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
