use chrono::{DateTime, Utc};
use sea_orm::sea_query::{LockType, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{self, AuditEvent},
    domain::LoanStatus,
    dto::fines::{FineList, SweepFailure, SweepReport},
    entity::{
        fines::{ActiveModel as FineActive, Column as FineCol, Entity as Fines},
        loans::{Column as LoanCol, Entity as Loans},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_librarian, ensure_owner_or_librarian},
    models::Fine,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// Creates the fine owed by every overdue, unreturned, not yet fined loan as of `as_of`.
///
/// Each loan is handled in its own transaction. A failure is logged, reported in
/// the returned [`SweepReport`] and does not stop the sweep. A loan accrues at
/// most one fine, however long it stays overdue.
pub async fn run_fine_sweep(state: &AppState, as_of: DateTime<Utc>) -> AppResult<SweepReport> {
    let already_fined = Query::select()
        .column(FineCol::LoanId)
        .from(Fines)
        .to_owned();

    let candidates: Vec<Uuid> = Loans::find()
        .select_only()
        .column(LoanCol::Id)
        .filter(LoanCol::Status.eq(LoanStatus::Overdue))
        .filter(LoanCol::ReturnedAt.is_null())
        .filter(LoanCol::Id.not_in_subquery(already_fined))
        .order_by_asc(LoanCol::DueDate)
        .into_tuple()
        .all(&state.orm)
        .await?;

    tracing::debug!(candidates = candidates.len(), as_of = %as_of, "fine sweep started");

    let mut report = SweepReport::default();
    for loan_id in candidates {
        match accrue_fine(state, loan_id, as_of).await {
            Ok(Some(fine)) => report.created.push(fine),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(loan_id = %loan_id, error = %err, "fine accrual failed");
                report.failures.push(SweepFailure {
                    loan_id,
                    error: err.to_string(),
                });
            }
        }
    }

    tracing::info!(
        created = report.created.len(),
        failed = report.failures.len(),
        as_of = %as_of,
        "fine sweep finished"
    );
    Ok(report)
}

/// Fines one loan if it still qualifies once its row is locked.
async fn accrue_fine(
    state: &AppState,
    loan_id: Uuid,
    as_of: DateTime<Utc>,
) -> AppResult<Option<Fine>> {
    let txn = state.orm.begin().await?;

    let loan = Loans::find_by_id(loan_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Loan"))?;

    if loan.status != LoanStatus::Overdue || loan.returned_at.is_some() {
        return Ok(None);
    }
    let existing = Fines::find()
        .filter(FineCol::LoanId.eq(loan.id))
        .count(&txn)
        .await?;
    if existing > 0 {
        return Ok(None);
    }

    let amount = match state
        .policy
        .fine_cents(loan.due_date.with_timezone(&Utc), as_of)
    {
        Some(amount) => amount,
        None => return Ok(None),
    };

    let fine = FineActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(loan.user_id),
        loan_id: Set(loan.id),
        amount: Set(amount),
        created_at: Set(as_of.into()),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    let fine = Fine::from(fine);
    tracing::info!(
        loan_id = %fine.loan_id,
        user_id = %fine.user_id,
        amount = %fine.amount,
        "fine created"
    );
    audit::record(
        &state.pool,
        AuditEvent::new(
            None,
            "fine_create",
            "fines",
            serde_json::json!({ "fine_id": fine.id, "loan_id": fine.loan_id, "amount_cents": fine.amount_cents }),
        ),
    )
    .await;

    Ok(Some(fine))
}

pub async fn list_fines(
    state: &AppState,
    actor: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<FineList>> {
    ensure_librarian(actor)?;
    let (page, limit, offset) = pagination.normalize();
    let finder = Fines::find().order_by_desc(FineCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Fine::from)
        .collect();

    Ok(ApiResponse::success(
        "Fines",
        FineList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn list_my_fines(state: &AppState, actor: &AuthUser) -> AppResult<ApiResponse<FineList>> {
    let items = Fines::find()
        .filter(FineCol::UserId.eq(actor.user_id))
        .order_by_desc(FineCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Fine::from)
        .collect();

    Ok(ApiResponse::success("Fines", FineList { items }, Some(Meta::empty())))
}

pub async fn list_loan_fines(
    state: &AppState,
    actor: &AuthUser,
    loan_id: Uuid,
) -> AppResult<ApiResponse<FineList>> {
    let loan = Loans::find_by_id(loan_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Loan"))?;
    ensure_owner_or_librarian(actor, loan.user_id)?;

    let items = Fines::find()
        .filter(FineCol::LoanId.eq(loan_id))
        .order_by_desc(FineCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Fine::from)
        .collect();

    Ok(ApiResponse::success("Fines", FineList { items }, Some(Meta::empty())))
}
