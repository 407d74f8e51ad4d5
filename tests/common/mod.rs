#![allow(dead_code)]

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use library_lending_api::{
    db::{create_pool, orm_from_pool, run_migrations},
    domain::{LendingPolicy, LoanStatus, Role},
    entity::{
        books::ActiveModel as BookActive, loans::ActiveModel as LoanActive,
        users::ActiveModel as UserActive,
    },
    middleware::auth::AuthUser,
    state::{AppState, JwtSettings},
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use uuid::Uuid;

// Tests in one binary share the database and truncate it, so they take turns.
static DB_LOCK: Mutex<()> = Mutex::new(());

pub fn serialize() -> MutexGuard<'static, ()> {
    DB_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
            None
        }
    }
}

pub async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = orm_from_pool(&pool);
    run_migrations(&orm).await?;

    // Failure-injection triggers left behind by an aborted run
    orm.execute_unprepared(
        "DROP TRIGGER IF EXISTS reject_fine_insert ON fines; \
         DROP TRIGGER IF EXISTS reject_loan_insert ON loans;",
    )
    .await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE fines, loans, reservations, reviews, book_categories, books, categories, audit_logs, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState {
        pool,
        orm,
        policy: LendingPolicy::default(),
        jwt: JwtSettings {
            secret: "test-secret".into(),
            ttl_hours: 1,
        },
    })
}

pub async fn create_user(state: &AppState, role: Role, email: &str) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        name: Set(email.split('@').next().unwrap_or(email).to_string()),
        role: Set(role),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role: user.role,
    })
}

pub async fn create_book(state: &AppState, title: &str, copies: i32) -> anyhow::Result<Uuid> {
    let book = BookActive {
        id: Set(Uuid::new_v4()),
        title: Set(title.to_string()),
        author: Set("Test Author".into()),
        publisher: Set("Test Press".into()),
        year: Set(2020),
        synopsis: Set(String::new()),
        cover_image: Set(None),
        total_copies: Set(copies),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(book.id)
}

/// Inserts a loan directly so tests can pick due dates in the past.
pub async fn insert_loan(
    state: &AppState,
    user_id: Uuid,
    book_id: Uuid,
    status: LoanStatus,
    created_at: DateTime<Utc>,
    due_date: DateTime<Utc>,
) -> anyhow::Result<Uuid> {
    let loan = LoanActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        book_id: Set(book_id),
        reservation_id: Set(None),
        status: Set(status),
        created_at: Set(created_at.into()),
        due_date: Set(due_date.into()),
        returned_at: Set(None),
        updated_at: Set(created_at.into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(loan.id)
}

/// Makes every fine insert for `loan_id` raise until [`clear_fine_rejection`].
pub async fn reject_fines_for(state: &AppState, loan_id: Uuid) -> anyhow::Result<()> {
    state
        .orm
        .execute_unprepared(&format!(
            r#"
            CREATE OR REPLACE FUNCTION reject_fine() RETURNS trigger AS $$
            BEGIN
                IF NEW.loan_id = '{loan_id}'::uuid THEN
                    RAISE EXCEPTION 'fine insert rejected for %', NEW.loan_id;
                END IF;
                RETURN NEW;
            END;
            $$ LANGUAGE plpgsql;
            CREATE TRIGGER reject_fine_insert BEFORE INSERT ON fines
                FOR EACH ROW EXECUTE FUNCTION reject_fine();
            "#
        ))
        .await?;
    Ok(())
}

pub async fn clear_fine_rejection(state: &AppState) -> anyhow::Result<()> {
    state
        .orm
        .execute_unprepared("DROP TRIGGER IF EXISTS reject_fine_insert ON fines;")
        .await?;
    Ok(())
}

/// Makes every loan insert raise until [`clear_loan_rejection`].
pub async fn reject_loans(state: &AppState) -> anyhow::Result<()> {
    state
        .orm
        .execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION reject_loan() RETURNS trigger AS $$
            BEGIN
                RAISE EXCEPTION 'loan insert rejected';
            END;
            $$ LANGUAGE plpgsql;
            CREATE TRIGGER reject_loan_insert BEFORE INSERT ON loans
                FOR EACH ROW EXECUTE FUNCTION reject_loan();
            "#,
        )
        .await?;
    Ok(())
}

pub async fn clear_loan_rejection(state: &AppState) -> anyhow::Result<()> {
    state
        .orm
        .execute_unprepared("DROP TRIGGER IF EXISTS reject_loan_insert ON loans;")
        .await?;
    Ok(())
}
