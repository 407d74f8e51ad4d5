mod common;

use chrono::{Duration, TimeZone, Utc};
use library_lending_api::{
    domain::{LoanStatus, ReservationStatus, Role},
    dto::reservations::{CreateReservationRequest, FulfillReservationRequest},
    error::AppError,
    scheduler::run_sweep_cycle,
    entity::{loans::Entity as Loans, reservations::Entity as Reservations},
    services::{
        availability_service::compute_availability, fine_service, loan_service,
        reservation_service,
    },
};
use sea_orm::{EntityTrait, PaginatorTrait};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_duplicate_reservations_admit_exactly_one() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };
    let _guard = common::serialize();
    let state = common::setup_state(&database_url).await?;

    let reader = common::create_user(&state, Role::Reader, "reader@example.com").await?;
    let book_id = common::create_book(&state, "Concurrency in Practice", 2).await?;

    let (first, second) = tokio::join!(
        reservation_service::create_reservation(&state, &reader, CreateReservationRequest { book_id }),
        reservation_service::create_reservation(&state, &reader, CreateReservationRequest { book_id }),
    );

    let outcomes = [first, second];
    let created = outcomes.iter().filter(|r| r.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|r| matches!(r, Err(AppError::Conflict(_))))
        .count();
    assert_eq!(created, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(compute_availability(&state, book_id).await?, 1);
    Ok(())
}

#[tokio::test]
async fn reservations_can_overbook_but_availability_floors_at_zero() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };
    let _guard = common::serialize();
    let state = common::setup_state(&database_url).await?;

    let first = common::create_user(&state, Role::Reader, "first@example.com").await?;
    let second = common::create_user(&state, Role::Reader, "second@example.com").await?;
    let book_id = common::create_book(&state, "Single Copy", 1).await?;

    reservation_service::create_reservation(&state, &first, CreateReservationRequest { book_id })
        .await?;
    assert_eq!(compute_availability(&state, book_id).await?, 0);

    let resp =
        reservation_service::create_reservation(&state, &second, CreateReservationRequest { book_id })
            .await?;
    assert_eq!(resp.data.expect("reservation").status, ReservationStatus::Pending);
    assert_eq!(compute_availability(&state, book_id).await?, 0);
    Ok(())
}

#[tokio::test]
async fn cancelling_restores_availability() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };
    let _guard = common::serialize();
    let state = common::setup_state(&database_url).await?;

    let reader = common::create_user(&state, Role::Reader, "reader@example.com").await?;
    let other = common::create_user(&state, Role::Reader, "other@example.com").await?;
    let book_id = common::create_book(&state, "Returnable", 3).await?;
    let before = compute_availability(&state, book_id).await?;

    let reservation =
        reservation_service::create_reservation(&state, &reader, CreateReservationRequest { book_id })
            .await?
            .data
            .expect("reservation");
    assert_eq!(compute_availability(&state, book_id).await?, before - 1);

    let err = reservation_service::cancel_reservation(&state, &other, reservation.id)
        .await
        .expect_err("only the owner or a librarian may cancel");
    assert!(matches!(err, AppError::Forbidden));

    let cancelled = reservation_service::cancel_reservation(&state, &reader, reservation.id)
        .await?
        .data
        .expect("reservation");
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    assert_eq!(compute_availability(&state, book_id).await?, before);

    let err = reservation_service::cancel_reservation(&state, &reader, reservation.id)
        .await
        .expect_err("cancelled is terminal");
    assert!(matches!(err, AppError::Conflict(_)));
    Ok(())
}

#[tokio::test]
async fn fulfilling_a_reservation_opens_a_loan() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };
    let _guard = common::serialize();
    let state = common::setup_state(&database_url).await?;

    let librarian = common::create_user(&state, Role::Librarian, "librarian@example.com").await?;
    let reader = common::create_user(&state, Role::Reader, "reader@example.com").await?;
    let book_id = common::create_book(&state, "Fulfilment", 1).await?;

    let reservation =
        reservation_service::create_reservation(&state, &reader, CreateReservationRequest { book_id })
            .await?
            .data
            .expect("reservation");

    let err = reservation_service::fulfill_reservation(
        &state,
        &reader,
        reservation.id,
        FulfillReservationRequest {
            user_id: reader.user_id,
            book_id,
        },
    )
    .await
    .expect_err("readers cannot fulfill");
    assert!(matches!(err, AppError::Forbidden));

    let err = reservation_service::fulfill_reservation(
        &state,
        &librarian,
        reservation.id,
        FulfillReservationRequest {
            user_id: librarian.user_id,
            book_id,
        },
    )
    .await
    .expect_err("payload must match the reservation");
    assert!(matches!(err, AppError::Validation(_)));

    let fulfillment = reservation_service::fulfill_reservation(
        &state,
        &librarian,
        reservation.id,
        FulfillReservationRequest {
            user_id: reader.user_id,
            book_id,
        },
    )
    .await?
    .data
    .expect("fulfillment");
    assert_eq!(fulfillment.reservation.status, ReservationStatus::Fulfilled);
    assert_eq!(fulfillment.loan.status, LoanStatus::Active);
    assert_eq!(fulfillment.loan.reservation_id, Some(reservation.id));
    assert_eq!(
        fulfillment.loan.due_date - fulfillment.loan.created_at,
        Duration::days(14)
    );
    // The loan replaces the reservation's hold on the single copy.
    assert_eq!(compute_availability(&state, book_id).await?, 0);

    let err = reservation_service::fulfill_reservation(
        &state,
        &librarian,
        reservation.id,
        FulfillReservationRequest {
            user_id: reader.user_id,
            book_id,
        },
    )
    .await
    .expect_err("already fulfilled");
    assert!(matches!(err, AppError::Conflict(_)));

    let err =
        reservation_service::create_reservation(&state, &reader, CreateReservationRequest { book_id })
            .await
            .expect_err("reader holds an open loan of the book");
    assert!(matches!(err, AppError::Conflict(_)));
    Ok(())
}

#[tokio::test]
async fn daily_cycle_fines_an_overdue_loan_once() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };
    let _guard = common::serialize();
    let state = common::setup_state(&database_url).await?;

    let reader = common::create_user(&state, Role::Reader, "late@example.com").await?;
    let book_id = common::create_book(&state, "Overdue", 1).await?;
    let due = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let loan_id = common::insert_loan(
        &state,
        reader.user_id,
        book_id,
        LoanStatus::Active,
        due - Duration::days(14),
        due,
    )
    .await?;

    let as_of = Utc.with_ymd_and_hms(2025, 1, 11, 0, 0, 0).unwrap();
    let report = run_sweep_cycle(&state, as_of).await?;
    assert_eq!(report.loans_marked_overdue, 1);
    assert!(report.fines.failures.is_empty());
    assert_eq!(report.fines.created.len(), 1);

    let fine = &report.fines.created[0];
    assert_eq!(fine.loan_id, loan_id);
    assert_eq!(fine.user_id, reader.user_id);
    assert_eq!(fine.amount_cents, 2500);
    assert_eq!(fine.amount, "25.00");
    assert_eq!(fine.created_at, as_of);

    let rerun = fine_service::run_fine_sweep(&state, as_of).await?;
    assert!(rerun.created.is_empty());
    let later = fine_service::run_fine_sweep(&state, as_of + Duration::days(5)).await?;
    assert!(later.created.is_empty());
    Ok(())
}

#[tokio::test]
async fn returned_loans_are_not_fined() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };
    let _guard = common::serialize();
    let state = common::setup_state(&database_url).await?;

    let librarian = common::create_user(&state, Role::Librarian, "librarian@example.com").await?;
    let reader = common::create_user(&state, Role::Reader, "reader@example.com").await?;
    let book_id = common::create_book(&state, "Back in Time", 1).await?;
    let due = Utc::now() - Duration::days(3);
    let loan_id = common::insert_loan(
        &state,
        reader.user_id,
        book_id,
        LoanStatus::Overdue,
        due - Duration::days(14),
        due,
    )
    .await?;

    let returned = loan_service::return_loan(&state, &librarian, loan_id)
        .await?
        .data
        .expect("loan");
    assert_eq!(returned.status, LoanStatus::Returned);
    assert!(returned.returned_at.is_some());

    let report = fine_service::run_fine_sweep(&state, Utc::now()).await?;
    assert!(report.created.is_empty());
    Ok(())
}

#[tokio::test]
async fn concluding_twice_conflicts() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };
    let _guard = common::serialize();
    let state = common::setup_state(&database_url).await?;

    let librarian = common::create_user(&state, Role::Librarian, "librarian@example.com").await?;
    let reader = common::create_user(&state, Role::Reader, "reader@example.com").await?;
    let book_id = common::create_book(&state, "The End", 1).await?;
    let now = Utc::now();
    let loan_id = common::insert_loan(
        &state,
        reader.user_id,
        book_id,
        LoanStatus::Active,
        now,
        now + Duration::days(14),
    )
    .await?;

    let err = loan_service::conclude_loan(&state, &reader, loan_id)
        .await
        .expect_err("readers cannot conclude");
    assert!(matches!(err, AppError::Forbidden));

    let concluded = loan_service::conclude_loan(&state, &librarian, loan_id)
        .await?
        .data
        .expect("loan");
    assert_eq!(concluded.status, LoanStatus::Concluded);
    assert!(concluded.returned_at.is_some());
    assert_eq!(compute_availability(&state, book_id).await?, 1);

    let err = loan_service::conclude_loan(&state, &librarian, loan_id)
        .await
        .expect_err("already concluded");
    assert!(matches!(err, AppError::Conflict(_)));

    let err = loan_service::return_loan(&state, &librarian, uuid::Uuid::new_v4())
        .await
        .expect_err("unknown loan");
    assert!(matches!(err, AppError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn stale_reservations_expire_and_release_their_copy() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };
    let _guard = common::serialize();
    let state = common::setup_state(&database_url).await?;

    let reader = common::create_user(&state, Role::Reader, "reader@example.com").await?;
    let book_id = common::create_book(&state, "Ephemeral", 1).await?;
    let reservation =
        reservation_service::create_reservation(&state, &reader, CreateReservationRequest { book_id })
            .await?
            .data
            .expect("reservation");
    assert_eq!(compute_availability(&state, book_id).await?, 0);

    let not_yet = reservation_service::expire_reservations(&state, Utc::now()).await?;
    assert_eq!(not_yet, 0);

    let expired =
        reservation_service::expire_reservations(&state, reservation.expires_at + Duration::seconds(1))
            .await?;
    assert_eq!(expired, 1);
    assert_eq!(compute_availability(&state, book_id).await?, 1);

    let err = reservation_service::cancel_reservation(&state, &reader, reservation.id)
        .await
        .expect_err("expired is terminal");
    assert!(matches!(err, AppError::Conflict(_)));
    Ok(())
}

#[tokio::test]
async fn failed_loan_insert_leaves_reservation_pending() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };
    let _guard = common::serialize();
    let state = common::setup_state(&database_url).await?;

    let librarian = common::create_user(&state, Role::Librarian, "librarian@example.com").await?;
    let reader = common::create_user(&state, Role::Reader, "reader@example.com").await?;
    let book_id = common::create_book(&state, "All or Nothing", 1).await?;
    let reservation =
        reservation_service::create_reservation(&state, &reader, CreateReservationRequest { book_id })
            .await?
            .data
            .expect("reservation");

    common::reject_loans(&state).await?;
    let result = reservation_service::fulfill_reservation(
        &state,
        &librarian,
        reservation.id,
        FulfillReservationRequest {
            user_id: reader.user_id,
            book_id,
        },
    )
    .await;
    common::clear_loan_rejection(&state).await?;

    let err = result.expect_err("loan insert fails");
    assert!(matches!(err, AppError::OrmError(_)));
    let stored = Reservations::find_by_id(reservation.id)
        .one(&state.orm)
        .await?
        .expect("reservation row");
    assert_eq!(stored.status, ReservationStatus::Pending);
    assert_eq!(Loans::find().count(&state.orm).await?, 0);
    assert_eq!(compute_availability(&state, book_id).await?, 0);

    let fulfillment = reservation_service::fulfill_reservation(
        &state,
        &librarian,
        reservation.id,
        FulfillReservationRequest {
            user_id: reader.user_id,
            book_id,
        },
    )
    .await?
    .data
    .expect("fulfillment");
    assert_eq!(fulfillment.reservation.status, ReservationStatus::Fulfilled);
    assert_eq!(Loans::find().count(&state.orm).await?, 1);
    Ok(())
}

#[tokio::test]
async fn one_failing_fine_does_not_stop_the_sweep() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };
    let _guard = common::serialize();
    let state = common::setup_state(&database_url).await?;

    let reader = common::create_user(&state, Role::Reader, "late@example.com").await?;
    let first_book = common::create_book(&state, "First Overdue", 1).await?;
    let second_book = common::create_book(&state, "Second Overdue", 1).await?;
    let first_due = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let second_due = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
    let failing = common::insert_loan(
        &state,
        reader.user_id,
        first_book,
        LoanStatus::Overdue,
        first_due - Duration::days(14),
        first_due,
    )
    .await?;
    let healthy = common::insert_loan(
        &state,
        reader.user_id,
        second_book,
        LoanStatus::Overdue,
        second_due - Duration::days(14),
        second_due,
    )
    .await?;

    let as_of = Utc.with_ymd_and_hms(2025, 1, 11, 0, 0, 0).unwrap();
    common::reject_fines_for(&state, failing).await?;
    let report = fine_service::run_fine_sweep(&state, as_of).await;
    common::clear_fine_rejection(&state).await?;
    let report = report?;

    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].loan_id, healthy);
    assert_eq!(report.created[0].amount, "22.50");
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].loan_id, failing);

    // The failed loan is still a candidate on the next run.
    let retry = fine_service::run_fine_sweep(&state, as_of).await?;
    assert!(retry.failures.is_empty());
    assert_eq!(retry.created.len(), 1);
    assert_eq!(retry.created[0].loan_id, failing);
    assert_eq!(retry.created[0].amount_cents, 2500);
    Ok(())
}
