use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod books;
pub mod categories;
pub mod doc;
pub mod fines;
pub mod health;
pub mod loans;
pub mod me;
pub mod params;
pub mod reservations;
pub mod reviews;
pub mod users;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/books", books::router())
        .nest("/categories", categories::router())
        .nest("/reservations", reservations::router())
        .nest("/loans", loans::router())
        .nest("/fines", fines::router())
        .nest("/reviews", reviews::router())
        .nest("/me", me::router())
}
