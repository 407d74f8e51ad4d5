use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    domain::{LoanStatus, ReservationStatus, Role, format_cents},
    entity::{books, categories, fines, loans, reservations, reviews, users},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub year: i32,
    pub synopsis: String,
    /// Opaque path to the cover image, resolved by the file store.
    pub cover_image: Option<String>,
    pub total_copies: i32,
    pub categories: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Loan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub reservation_id: Option<Uuid>,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Fine {
    pub id: Uuid,
    pub user_id: Uuid,
    pub loan_id: Uuid,
    pub amount_cents: i64,
    /// `amount_cents` with two decimal places, e.g. "25.00".
    pub amount: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            role: model.role,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<categories::Model> for Category {
    fn from(model: categories::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}

impl Book {
    pub fn from_entity(model: books::Model, categories: Vec<Uuid>) -> Self {
        Self {
            id: model.id,
            title: model.title,
            author: model.author,
            publisher: model.publisher,
            year: model.year,
            synopsis: model.synopsis,
            cover_image: model.cover_image,
            total_copies: model.total_copies,
            categories,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<reservations::Model> for Reservation {
    fn from(model: reservations::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            book_id: model.book_id,
            status: model.status,
            created_at: model.created_at.with_timezone(&Utc),
            expires_at: model.expires_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<loans::Model> for Loan {
    fn from(model: loans::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            book_id: model.book_id,
            reservation_id: model.reservation_id,
            status: model.status,
            created_at: model.created_at.with_timezone(&Utc),
            due_date: model.due_date.with_timezone(&Utc),
            returned_at: model.returned_at.map(|dt| dt.with_timezone(&Utc)),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<fines::Model> for Fine {
    fn from(model: fines::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            loan_id: model.loan_id,
            amount_cents: model.amount,
            amount: format_cents(model.amount),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<reviews::Model> for Review {
    fn from(model: reviews::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            book_id: model.book_id,
            rating: model.rating,
            comment: model.comment,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}
