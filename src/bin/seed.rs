use library_lending_api::{
    config::AppConfig,
    db::{create_pool, orm_from_pool, run_migrations},
    domain::Role,
    services::auth_service::hash_password,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&orm_from_pool(&pool)).await?;

    let librarian_id = ensure_user(
        &pool,
        "librarian@example.com",
        "librarian123",
        "Head Librarian",
        Role::Librarian,
    )
    .await?;
    let reader_id = ensure_user(
        &pool,
        "reader@example.com",
        "reader123",
        "Avid Reader",
        Role::Reader,
    )
    .await?;
    seed_catalog(&pool).await?;

    println!("Seed completed. Librarian ID: {librarian_id}, Reader ID: {reader_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    name: &str,
    role: Role,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, name, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role, name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(name)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let categories = ["Fiction", "Science", "History", "Programming"];
    for name in categories {
        sqlx::query(
            "INSERT INTO categories (id, name) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .execute(pool)
        .await?;
    }

    let books = [
        ("The Rust Programming Language", "Steve Klabnik", "No Starch Press", 2023, 3, "Programming"),
        ("A Brief History of Time", "Stephen Hawking", "Bantam", 1988, 2, "Science"),
        ("The Guns of August", "Barbara W. Tuchman", "Macmillan", 1962, 1, "History"),
        ("Dune", "Frank Herbert", "Chilton Books", 1965, 4, "Fiction"),
    ];

    for (title, author, publisher, year, copies, category) in books {
        let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM books WHERE title = $1")
            .bind(title)
            .fetch_optional(pool)
            .await?;
        if existing.is_some() {
            continue;
        }

        let book_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO books (id, title, author, publisher, year, synopsis, total_copies)
            VALUES ($1, $2, $3, $4, $5, '', $6)
            "#,
        )
        .bind(book_id)
        .bind(title)
        .bind(author)
        .bind(publisher)
        .bind(year)
        .bind(copies)
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO book_categories (book_id, category_id)
            SELECT $1, id FROM categories WHERE name = $2
            "#,
        )
        .bind(book_id)
        .bind(category)
        .execute(pool)
        .await?;
    }

    println!("Seeded catalog");
    Ok(())
}
