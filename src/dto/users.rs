use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{domain::Role, error::AppError, models::User};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(AppError::Validation("password must not be empty".into()));
        }
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.is_none() && self.email.is_none() {
            return Err(AppError::Validation(
                "at least one of name or email is required".into(),
            ));
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("name must not be empty".into()));
            }
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserList {
    pub items: Vec<User>,
}

fn validate_email(email: &str) -> Result<(), AppError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!("invalid email: {email}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.into(),
            password: "secret".into(),
            name: "Ada".into(),
            role: Role::Reader,
        }
    }

    #[test]
    fn rejects_malformed_email() {
        assert!(request("reader@library.org").validate().is_ok());
        assert!(request("reader").validate().is_err());
        assert!(request("@library.org").validate().is_err());
        assert!(request("reader@library").validate().is_err());
    }

    #[test]
    fn update_needs_a_field() {
        let empty = UpdateUserRequest {
            name: None,
            email: None,
        };
        assert!(empty.validate().is_err());
        let rename = UpdateUserRequest {
            name: Some("Grace".into()),
            email: None,
        };
        assert!(rename.validate().is_ok());
    }
}
