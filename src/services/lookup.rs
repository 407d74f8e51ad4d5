//! Batch lookups used to decorate list responses with user and book names.

use std::collections::{HashMap, HashSet};

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::{
    entity::{
        books::{self, Column as BookCol, Entity as Books},
        fines::{Column as FineCol, Entity as Fines},
        users::{self, Column as UserCol, Entity as Users},
    },
    error::AppResult,
};

pub(crate) async fn users_by_id<C: ConnectionTrait>(
    conn: &C,
    ids: impl IntoIterator<Item = Uuid>,
) -> AppResult<HashMap<Uuid, users::Model>> {
    let ids: HashSet<Uuid> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = Users::find().filter(UserCol::Id.is_in(ids)).all(conn).await?;
    Ok(rows.into_iter().map(|u| (u.id, u)).collect())
}

pub(crate) async fn books_by_id<C: ConnectionTrait>(
    conn: &C,
    ids: impl IntoIterator<Item = Uuid>,
) -> AppResult<HashMap<Uuid, books::Model>> {
    let ids: HashSet<Uuid> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = Books::find().filter(BookCol::Id.is_in(ids)).all(conn).await?;
    Ok(rows.into_iter().map(|b| (b.id, b)).collect())
}

/// Loans among `loan_ids` that already carry a fine.
pub(crate) async fn fined_loans<C: ConnectionTrait>(
    conn: &C,
    loan_ids: impl IntoIterator<Item = Uuid>,
) -> AppResult<HashSet<Uuid>> {
    let ids: HashSet<Uuid> = loan_ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashSet::new());
    }
    let rows: Vec<Uuid> = Fines::find()
        .select_only()
        .column(FineCol::LoanId)
        .filter(FineCol::LoanId.is_in(ids))
        .into_tuple()
        .all(conn)
        .await?;
    Ok(rows.into_iter().collect())
}

pub(crate) fn user_label(users: &HashMap<Uuid, users::Model>, id: Uuid) -> (String, String) {
    users
        .get(&id)
        .map(|u| (u.name.clone(), u.email.clone()))
        .unwrap_or_default()
}

pub(crate) fn book_label(books: &HashMap<Uuid, books::Model>, id: Uuid) -> (String, String) {
    books
        .get(&id)
        .map(|b| (b.title.clone(), b.author.clone()))
        .unwrap_or_default()
}
