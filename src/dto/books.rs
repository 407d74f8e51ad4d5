use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Book, Category},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBookRequest {
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub year: i32,
    pub synopsis: String,
    pub cover_image: Option<String>,
    pub total_copies: i32,
    #[serde(default)]
    pub categories: Vec<Uuid>,
}

impl CreateBookRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text("title", &self.title)?;
        require_text("author", &self.author)?;
        require_text("publisher", &self.publisher)?;
        require_text("synopsis", &self.synopsis)?;
        require_copies(self.total_copies)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateBookRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub year: Option<i32>,
    pub synopsis: Option<String>,
    pub cover_image: Option<String>,
    pub total_copies: Option<i32>,
    /// Replaces the book's categories when present.
    pub categories: Option<Vec<Uuid>>,
}

impl UpdateBookRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let fields = [
            self.title.is_some(),
            self.author.is_some(),
            self.publisher.is_some(),
            self.year.is_some(),
            self.synopsis.is_some(),
            self.cover_image.is_some(),
            self.total_copies.is_some(),
            self.categories.is_some(),
        ];
        if !fields.contains(&true) {
            return Err(AppError::Validation("no fields to update".into()));
        }
        for (field, value) in [
            ("title", &self.title),
            ("author", &self.author),
            ("publisher", &self.publisher),
            ("synopsis", &self.synopsis),
        ] {
            if let Some(value) = value {
                require_text(field, value)?;
            }
        }
        if let Some(copies) = self.total_copies {
            require_copies(copies)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BookQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Case-insensitive match on title or author.
    pub search: Option<String>,
    /// Category name, case-insensitive.
    pub category: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookList {
    pub items: Vec<Book>,
    pub available_categories: Vec<Category>,
    pub available_years: Vec<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookDetail {
    pub book: Book,
    pub available_copies: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Availability {
    pub book_id: Uuid,
    pub available_copies: i64,
}

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn require_copies(copies: i32) -> Result<(), AppError> {
    if copies < 0 {
        return Err(AppError::Validation(
            "total_copies must not be negative".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> CreateBookRequest {
        CreateBookRequest {
            title: "Pride and Prejudice".into(),
            author: "Jane Austen".into(),
            publisher: "Penguin".into(),
            year: 1813,
            synopsis: "A classic.".into(),
            cover_image: None,
            total_copies: 5,
            categories: vec![],
        }
    }

    #[test]
    fn negative_copies_are_rejected() {
        assert!(book().validate().is_ok());
        let mut bad = book();
        bad.total_copies = -1;
        assert!(matches!(bad.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn blank_title_is_rejected() {
        let mut bad = book();
        bad.title = "   ".into();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn empty_update_is_rejected() {
        let update = UpdateBookRequest {
            title: None,
            author: None,
            publisher: None,
            year: None,
            synopsis: None,
            cover_image: None,
            total_copies: None,
            categories: None,
        };
        assert!(update.validate().is_err());
        let update = UpdateBookRequest {
            total_copies: Some(0),
            ..update
        };
        assert!(update.validate().is_ok());
    }
}
