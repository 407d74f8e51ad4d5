use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::{self, AuditEvent},
    domain::Role,
    dto::auth::{Claims, LoginRequest, LoginResponse, Principal},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    state::{AppState, JwtSettings},
};

#[derive(FromRow)]
struct CredentialRow {
    id: Uuid,
    email: String,
    name: String,
    password_hash: String,
    role: String,
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

pub fn issue_token(
    jwt: &JwtSettings,
    user_id: Uuid,
    email: &str,
    name: &str,
    role: Role,
) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(jwt.ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        role: role.to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::Validation("email and password are required".into()));
    }

    let user = sqlx::query_as::<_, CredentialRow>(
        "SELECT id, email, name, password_hash, role FROM users WHERE email = $1",
    )
    .bind(email.trim())
    .fetch_optional(&state.pool)
    .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::Unauthorized("Invalid email or password".into())),
    };

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;

    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::Unauthorized("Invalid email or password".into()));
    }

    let role = Role::parse(&user.role)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Unknown role {}", user.role)))?;
    let token = issue_token(&state.jwt, user.id, &user.email, &user.name, role)?;

    audit::record(
        &state.pool,
        AuditEvent::new(
            Some(user.id),
            "user_login",
            "users",
            serde_json::json!({ "user_id": user.id }),
        ),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse {
            token: format!("Bearer {}", token),
        },
        Some(Meta::empty()),
    ))
}

pub fn current_principal(user: &AuthUser) -> ApiResponse<Principal> {
    ApiResponse::success(
        "Token is valid",
        Principal {
            user_id: user.user_id,
            role: user.role,
        },
        Some(Meta::empty()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::decode_token;

    #[test]
    fn issued_token_decodes_to_same_principal() {
        let jwt = JwtSettings {
            secret: "test-secret".into(),
            ttl_hours: 1,
        };
        let id = Uuid::new_v4();
        let token = issue_token(&jwt, id, "ana@library.org", "Ana", Role::Librarian).unwrap();
        let user = decode_token(&token, &jwt.secret).unwrap();
        assert_eq!(user.user_id, id);
        assert_eq!(user.role, Role::Librarian);
        assert!(decode_token(&token, "other-secret").is_err());
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter2").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(
            Argon2::default()
                .verify_password(b"hunter2", &parsed)
                .is_ok()
        );
        assert!(Argon2::default().verify_password(b"nope", &parsed).is_err());
    }
}
