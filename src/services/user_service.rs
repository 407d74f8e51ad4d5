use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, QueryOrder, QuerySelect, Set};
use uuid::Uuid;

use crate::{
    audit::{self, AuditEvent},
    dto::users::{CreateUserRequest, UpdateUserRequest, UserList},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_librarian, ensure_owner_or_librarian},
    models::User,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::auth_service::hash_password,
    state::AppState,
};

pub async fn create_user(
    state: &AppState,
    actor: &AuthUser,
    payload: CreateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_librarian(actor)?;
    payload.validate()?;

    let password_hash = hash_password(&payload.password)?;
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(payload.email.trim().to_lowercase()),
        password_hash: Set(password_hash),
        name: Set(payload.name.trim().to_string()),
        role: Set(payload.role),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|err| match AppError::from(err) {
        AppError::Conflict(_) => AppError::Conflict("Email is already taken".into()),
        other => other,
    })?;

    audit::record(
        &state.pool,
        AuditEvent::new(
            Some(actor.user_id),
            "user_create",
            "users",
            serde_json::json!({ "user_id": user.id, "role": user.role }),
        ),
    )
    .await;

    Ok(ApiResponse::success(
        "User created",
        User::from(user),
        Some(Meta::empty()),
    ))
}

pub async fn list_users(
    state: &AppState,
    actor: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    ensure_librarian(actor)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Users::find().order_by_asc(UserCol::Name);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(User::from)
        .collect();

    Ok(ApiResponse::success(
        "Users",
        UserList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_user(state: &AppState, actor: &AuthUser, id: Uuid) -> AppResult<ApiResponse<User>> {
    ensure_owner_or_librarian(actor, id)?;
    let user = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    Ok(ApiResponse::success("User", User::from(user), Some(Meta::empty())))
}

pub async fn update_user(
    state: &AppState,
    actor: &AuthUser,
    id: Uuid,
    payload: UpdateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_owner_or_librarian(actor, id)?;
    payload.validate()?;

    let existing = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let mut active: UserActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(email) = payload.email {
        active.email = Set(email.trim().to_lowercase());
    }
    let user = active.update(&state.orm).await.map_err(|err| match AppError::from(err) {
        AppError::Conflict(_) => AppError::Conflict("Email is already taken".into()),
        other => other,
    })?;

    Ok(ApiResponse::success("User updated", User::from(user), Some(Meta::empty())))
}
