use std::collections::{BTreeSet, HashMap, HashSet};

use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, Func, LockType, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::books::{BookDetail, BookList, BookQuery, CreateBookRequest, UpdateBookRequest},
    entity::{
        book_categories::{
            ActiveModel as BookCategoryActive, Column as BcCol, Entity as BookCategories,
        },
        books::{ActiveModel as BookActive, Column as BookCol, Entity as Books},
        categories::{Column as CatCol, Entity as Categories},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_librarian},
    models::{Book, Category},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::availability_service::compute_availability,
    state::AppState,
};

pub async fn list_books(state: &AppState, query: BookQuery) -> AppResult<ApiResponse<BookList>> {
    let (page, limit, offset) = Pagination::new(query.page, query.per_page).normalize();

    let mut condition = Condition::all();
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = contains_pattern(&search.to_lowercase());
        condition = condition.add(
            Condition::any()
                .add(Expr::expr(Func::lower(Expr::col((Books, BookCol::Title)))).like(pattern.clone()))
                .add(Expr::expr(Func::lower(Expr::col((Books, BookCol::Author)))).like(pattern)),
        );
    }
    if let Some(category) = query.category.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let in_category = Query::select()
            .column((BookCategories, BcCol::BookId))
            .from(BookCategories)
            .inner_join(
                Categories,
                Expr::col((Categories, CatCol::Id)).equals((BookCategories, BcCol::CategoryId)),
            )
            .and_where(
                Expr::expr(Func::lower(Expr::col((Categories, CatCol::Name))))
                    .eq(category.to_lowercase()),
            )
            .to_owned();
        condition = condition.add(BookCol::Id.in_subquery(in_category));
    }

    let finder = Books::find().filter(condition).order_by_asc(BookCol::Title);
    let total = finder.clone().count(&state.orm).await? as i64;
    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let links = category_links(&state.orm, rows.iter().map(|b| b.id)).await?;
    let category_ids: HashSet<Uuid> = links.values().flatten().copied().collect();
    let available_categories = if category_ids.is_empty() {
        Vec::new()
    } else {
        Categories::find()
            .filter(CatCol::Id.is_in(category_ids))
            .order_by_asc(CatCol::Name)
            .all(&state.orm)
            .await?
            .into_iter()
            .map(Category::from)
            .collect()
    };
    let available_years: Vec<i32> = rows
        .iter()
        .map(|b| b.year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let items = rows
        .into_iter()
        .map(|book| {
            let categories = links.get(&book.id).cloned().unwrap_or_default();
            Book::from_entity(book, categories)
        })
        .collect();

    Ok(ApiResponse::success(
        "Books",
        BookList {
            items,
            available_categories,
            available_years,
        },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_book(state: &AppState, id: Uuid) -> AppResult<ApiResponse<BookDetail>> {
    let book = Books::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Book"))?;
    let categories = category_links(&state.orm, [book.id])
        .await?
        .remove(&book.id)
        .unwrap_or_default();
    let available_copies = compute_availability(state, id).await?;

    Ok(ApiResponse::success(
        "Book",
        BookDetail {
            book: Book::from_entity(book, categories),
            available_copies,
        },
        Some(Meta::empty()),
    ))
}

pub async fn create_book(
    state: &AppState,
    user: &AuthUser,
    payload: CreateBookRequest,
) -> AppResult<ApiResponse<Book>> {
    ensure_librarian(user)?;
    payload.validate()?;
    let categories = dedup(payload.categories);

    let txn = state.orm.begin().await?;
    ensure_categories_exist(&txn, &categories).await?;

    let book = BookActive {
        id: Set(Uuid::new_v4()),
        title: Set(payload.title.trim().to_string()),
        author: Set(payload.author.trim().to_string()),
        publisher: Set(payload.publisher.trim().to_string()),
        year: Set(payload.year),
        synopsis: Set(payload.synopsis),
        cover_image: Set(payload.cover_image),
        total_copies: Set(payload.total_copies),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;
    link_categories(&txn, book.id, &categories).await?;

    txn.commit().await?;

    tracing::info!(book_id = %book.id, total_copies = book.total_copies, "book created");
    Ok(ApiResponse::success(
        "Book created",
        Book::from_entity(book, categories),
        Some(Meta::empty()),
    ))
}

pub async fn update_book(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateBookRequest,
) -> AppResult<ApiResponse<Book>> {
    ensure_librarian(user)?;
    payload.validate()?;

    let txn = state.orm.begin().await?;
    let existing = Books::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Book"))?;

    let mut active: BookActive = existing.clone().into();
    if let Some(title) = payload.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(author) = payload.author {
        active.author = Set(author.trim().to_string());
    }
    if let Some(publisher) = payload.publisher {
        active.publisher = Set(publisher.trim().to_string());
    }
    if let Some(year) = payload.year {
        active.year = Set(year);
    }
    if let Some(synopsis) = payload.synopsis {
        active.synopsis = Set(synopsis);
    }
    if let Some(cover_image) = payload.cover_image {
        active.cover_image = Set(Some(cover_image));
    }
    if let Some(total_copies) = payload.total_copies {
        active.total_copies = Set(total_copies);
    }
    let book = if active.is_changed() {
        active.update(&txn).await?
    } else {
        existing
    };

    if let Some(categories) = payload.categories {
        let categories = dedup(categories);
        ensure_categories_exist(&txn, &categories).await?;
        BookCategories::delete_many()
            .filter(BcCol::BookId.eq(id))
            .exec(&txn)
            .await?;
        link_categories(&txn, id, &categories).await?;
    }

    let categories = category_links(&txn, [id])
        .await?
        .remove(&id)
        .unwrap_or_default();
    txn.commit().await?;

    Ok(ApiResponse::success(
        "Book updated",
        Book::from_entity(book, categories),
        Some(Meta::empty()),
    ))
}

pub async fn delete_book(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_librarian(user)?;
    let result = Books::delete_by_id(id)
        .exec(&state.orm)
        .await
        .map_err(|err| match AppError::from(err) {
            AppError::Conflict(_) => AppError::Conflict(
                "Book is referenced by loans, reservations or reviews".into(),
            ),
            other => other,
        })?;

    if result.rows_affected == 0 {
        return Err(AppError::not_found("Book"));
    }

    tracing::info!(book_id = %id, "book deleted");
    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn category_links<C: ConnectionTrait>(
    conn: &C,
    book_ids: impl IntoIterator<Item = Uuid>,
) -> AppResult<HashMap<Uuid, Vec<Uuid>>> {
    let ids: Vec<Uuid> = book_ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = BookCategories::find()
        .filter(BcCol::BookId.is_in(ids))
        .all(conn)
        .await?;

    let mut links: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for row in rows {
        links.entry(row.book_id).or_default().push(row.category_id);
    }
    Ok(links)
}

async fn ensure_categories_exist<C: ConnectionTrait>(conn: &C, ids: &[Uuid]) -> AppResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let found = Categories::find()
        .filter(CatCol::Id.is_in(ids.iter().copied()))
        .count(conn)
        .await?;
    if found as usize != ids.len() {
        return Err(AppError::Validation("unknown category id".into()));
    }
    Ok(())
}

async fn link_categories<C: ConnectionTrait>(conn: &C, book_id: Uuid, ids: &[Uuid]) -> AppResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let rows = ids.iter().map(|category_id| BookCategoryActive {
        book_id: Set(book_id),
        category_id: Set(*category_id),
    });
    BookCategories::insert_many(rows)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

fn dedup(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// `%term%` for LIKE, with the term's own wildcards and backslashes escaped.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
