use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    domain::ReservationStatus,
    models::{Loan, Reservation},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReservationRequest {
    pub book_id: Uuid,
}

/// The reader and book the librarian hands the copy to; must match the reservation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FulfillReservationRequest {
    pub user_id: Uuid,
    pub book_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Fulfillment {
    pub reservation: Reservation,
    pub loan: Loan,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReservationDetail {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub user_name: String,
    pub user_email: String,
    pub book_title: String,
    pub book_author: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReservationList {
    pub items: Vec<ReservationDetail>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReservationListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<ReservationStatus>,
}
