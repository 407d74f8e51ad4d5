use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    domain::{LoanStatus, ReservationStatus, Role},
    dto::{
        activity::{ActivityFeed, ActivityItem},
        auth::{LoginRequest, LoginResponse, Principal},
        books::{Availability, BookDetail, BookList, CreateBookRequest, UpdateBookRequest},
        categories::{CategoryList, CategoryRequest},
        fines::{CycleReport, FineList, SweepFailure, SweepQuery, SweepReport},
        loans::{CreateLoanRequest, LoanDetail, LoanList},
        reservations::{
            CreateReservationRequest, FulfillReservationRequest, Fulfillment, ReservationDetail,
            ReservationList,
        },
        reviews::{CreateReviewRequest, ReviewDetail, ReviewList},
        users::{CreateUserRequest, UpdateUserRequest, UserList},
    },
    models::{Book, Category, Fine, Loan, Reservation, Review, User},
    response::{ApiResponse, Meta},
    routes::{
        auth, books, categories, fines, health, loans, me, params, reservations, reviews, users,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::me,
        users::list_users,
        users::create_user,
        users::get_user,
        users::update_user,
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        books::get_availability,
        books::list_book_reviews,
        categories::list_categories,
        categories::create_category,
        categories::rename_category,
        categories::delete_category,
        reservations::list_reservations,
        reservations::create_reservation,
        reservations::cancel_reservation,
        reservations::fulfill_reservation,
        loans::list_loans,
        loans::create_loan,
        loans::get_loan,
        loans::return_loan,
        loans::conclude_loan,
        loans::list_loan_fines,
        fines::list_fines,
        fines::sweep,
        reviews::create_review,
        reviews::delete_review,
        me::my_reservations,
        me::my_loans,
        me::my_fines,
        me::my_activity
    ),
    components(
        schemas(
            Role,
            ReservationStatus,
            LoanStatus,
            User,
            Category,
            Book,
            Reservation,
            Loan,
            Fine,
            Review,
            LoginRequest,
            LoginResponse,
            Principal,
            CreateUserRequest,
            UpdateUserRequest,
            UserList,
            CreateBookRequest,
            UpdateBookRequest,
            BookList,
            BookDetail,
            Availability,
            CategoryRequest,
            CategoryList,
            CreateReservationRequest,
            FulfillReservationRequest,
            Fulfillment,
            ReservationDetail,
            ReservationList,
            CreateLoanRequest,
            LoanDetail,
            LoanList,
            FineList,
            SweepQuery,
            SweepFailure,
            SweepReport,
            CycleReport,
            CreateReviewRequest,
            ReviewDetail,
            ReviewList,
            ActivityItem,
            ActivityFeed,
            params::Pagination,
            Meta,
            ApiResponse<Book>,
            ApiResponse<BookList>,
            ApiResponse<Reservation>,
            ApiResponse<Loan>,
            ApiResponse<Fulfillment>,
            ApiResponse<CycleReport>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Users", description = "Librarian-managed accounts"),
        (name = "Books", description = "Catalog and availability"),
        (name = "Categories", description = "Catalog categories"),
        (name = "Reservations", description = "Reservation lifecycle"),
        (name = "Loans", description = "Loan lifecycle"),
        (name = "Fines", description = "Late fines and the daily sweep"),
        (name = "Reviews", description = "Book reviews"),
        (name = "Me", description = "The caller's own records"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
