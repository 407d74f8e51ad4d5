mod common;

use chrono::{Duration, Utc};
use library_lending_api::{
    domain::{LoanStatus, Role},
    dto::{
        activity::ActivityItem,
        books::{BookQuery, CreateBookRequest},
        categories::CategoryRequest,
        reservations::CreateReservationRequest,
        reviews::CreateReviewRequest,
    },
    error::AppError,
    routes::params::Pagination,
    services::{
        activity_service, book_service, category_service, reservation_service, review_service,
    },
};

fn book_request(title: &str, categories: Vec<uuid::Uuid>) -> CreateBookRequest {
    CreateBookRequest {
        title: title.to_string(),
        author: "Ursula K. Le Guin".into(),
        publisher: "Ace".into(),
        year: 1969,
        synopsis: "A winter planet.".into(),
        cover_image: Some("covers/left-hand.jpg".into()),
        total_copies: 2,
        categories,
    }
}

#[tokio::test]
async fn librarian_manages_catalog_and_readers_browse_it() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };
    let _guard = common::serialize();
    let state = common::setup_state(&database_url).await?;

    let librarian = common::create_user(&state, Role::Librarian, "librarian@example.com").await?;
    let reader = common::create_user(&state, Role::Reader, "reader@example.com").await?;

    let err = category_service::create_category(
        &state,
        &reader,
        CategoryRequest {
            name: "Fiction".into(),
        },
    )
    .await
    .expect_err("readers cannot edit the catalog");
    assert!(matches!(err, AppError::Forbidden));

    let fiction = category_service::create_category(
        &state,
        &librarian,
        CategoryRequest {
            name: "Fiction".into(),
        },
    )
    .await?
    .data
    .expect("category");
    let err = category_service::create_category(
        &state,
        &librarian,
        CategoryRequest {
            name: "Fiction".into(),
        },
    )
    .await
    .expect_err("duplicate category name");
    assert!(matches!(err, AppError::Conflict(_)));

    let book = book_service::create_book(
        &state,
        &librarian,
        book_request("The Left Hand of Darkness", vec![fiction.id, fiction.id]),
    )
    .await?
    .data
    .expect("book");
    assert_eq!(book.categories, vec![fiction.id]);
    book_service::create_book(&state, &librarian, book_request("Uncategorised", vec![])).await?;

    let listed = book_service::list_books(
        &state,
        BookQuery {
            page: None,
            per_page: None,
            search: None,
            category: Some("fiction".into()),
        },
    )
    .await?;
    let meta = listed.meta.expect("meta");
    let listed = listed.data.expect("books");
    assert_eq!(meta.total, Some(1));
    assert_eq!(listed.items[0].id, book.id);
    assert_eq!(listed.available_years, vec![1969]);
    assert_eq!(listed.available_categories[0].name, "Fiction");

    let searched = book_service::list_books(
        &state,
        BookQuery {
            page: Some(1),
            per_page: Some(10),
            search: Some("LEFT hand".into()),
            category: None,
        },
    )
    .await?
    .data
    .expect("books");
    assert_eq!(searched.items.len(), 1);

    let wildcard = book_service::list_books(
        &state,
        BookQuery {
            page: None,
            per_page: None,
            search: Some("_".into()),
            category: None,
        },
    )
    .await?
    .data
    .expect("books");
    assert!(wildcard.items.is_empty(), "underscore is matched literally");

    let detail = book_service::get_book(&state, book.id).await?.data.expect("book");
    assert_eq!(detail.available_copies, 2);

    reservation_service::create_reservation(
        &state,
        &reader,
        CreateReservationRequest { book_id: book.id },
    )
    .await?;
    let err = book_service::delete_book(&state, &librarian, book.id)
        .await
        .expect_err("reserved book is referenced");
    assert!(matches!(err, AppError::Conflict(_)));
    Ok(())
}

#[tokio::test]
async fn one_review_per_reader_and_book() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };
    let _guard = common::serialize();
    let state = common::setup_state(&database_url).await?;

    let reader = common::create_user(&state, Role::Reader, "reader@example.com").await?;
    let other = common::create_user(&state, Role::Reader, "other@example.com").await?;
    let book_id = common::create_book(&state, "Reviewed", 1).await?;

    let review = review_service::create_review(
        &state,
        &reader,
        CreateReviewRequest {
            book_id,
            comment: Some("  Loved it  ".into()),
        },
    )
    .await?
    .data
    .expect("review");
    assert_eq!(review.rating, 5);
    assert_eq!(review.comment.as_deref(), Some("Loved it"));

    let err = review_service::create_review(
        &state,
        &reader,
        CreateReviewRequest {
            book_id,
            comment: None,
        },
    )
    .await
    .expect_err("second review of the same book");
    assert!(matches!(err, AppError::Conflict(_)));

    let err = review_service::create_review(
        &state,
        &reader,
        CreateReviewRequest {
            book_id: uuid::Uuid::new_v4(),
            comment: None,
        },
    )
    .await
    .expect_err("unknown book");
    assert!(matches!(err, AppError::NotFound(_)));

    let listed = review_service::list_book_reviews(&state, book_id, Pagination::default())
        .await?
        .data
        .expect("reviews");
    assert_eq!(listed.items.len(), 1);
    assert_eq!(listed.items[0].user_name, "reader");

    let err = review_service::delete_review(&state, &other, review.id)
        .await
        .expect_err("only the author may delete");
    assert!(matches!(err, AppError::Forbidden));
    review_service::delete_review(&state, &reader, review.id).await?;
    Ok(())
}

#[tokio::test]
async fn activity_feed_merges_reservations_and_loans_newest_first() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };
    let _guard = common::serialize();
    let state = common::setup_state(&database_url).await?;

    let reader = common::create_user(&state, Role::Reader, "reader@example.com").await?;
    let older_book = common::create_book(&state, "Older", 1).await?;
    let newer_book = common::create_book(&state, "Newer", 1).await?;

    let started = Utc::now() - Duration::days(2);
    common::insert_loan(
        &state,
        reader.user_id,
        older_book,
        LoanStatus::Active,
        started,
        started + Duration::days(14),
    )
    .await?;
    reservation_service::create_reservation(
        &state,
        &reader,
        CreateReservationRequest {
            book_id: newer_book,
        },
    )
    .await?;

    let feed = activity_service::my_activity(&state, &reader)
        .await?
        .data
        .expect("activity");
    assert_eq!(feed.items.len(), 2);
    assert!(matches!(
        &feed.items[0],
        ActivityItem::Reservation { book_title, .. } if book_title == "Newer"
    ));
    assert!(matches!(
        &feed.items[1],
        ActivityItem::Loan { book_title, has_fine: false, .. } if book_title == "Older"
    ));
    Ok(())
}
