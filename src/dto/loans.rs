use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{domain::LoanStatus, models::Loan};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLoanRequest {
    pub user_id: Uuid,
    pub book_id: Uuid,
    /// Overrides the default loan period.
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoanDetail {
    #[serde(flatten)]
    pub loan: Loan,
    pub user_name: String,
    pub user_email: String,
    pub book_title: String,
    pub book_author: String,
    pub has_fine: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoanList {
    pub items: Vec<LoanDetail>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoanListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<LoanStatus>,
}
