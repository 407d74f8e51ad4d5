use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{Loan, Reservation};

/// One entry of a reader's combined reservation and loan history.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityItem {
    Reservation {
        reservation: Reservation,
        book_title: String,
        book_author: String,
    },
    Loan {
        loan: Loan,
        book_title: String,
        book_author: String,
        has_fine: bool,
    },
}

impl ActivityItem {
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            ActivityItem::Reservation { reservation, .. } => reservation.created_at,
            ActivityItem::Loan { loan, .. } => loan.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActivityFeed {
    pub items: Vec<ActivityItem>,
}
