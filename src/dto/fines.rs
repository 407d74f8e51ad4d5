use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Fine;

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct FineList {
    #[schema(value_type = Vec<Fine>)]
    pub items: Vec<Fine>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SweepQuery {
    /// Evaluate the sweep as of this instant instead of now.
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SweepFailure {
    pub loan_id: Uuid,
    pub error: String,
}

/// Outcome of one fine sweep. Failures are per loan and never abort the sweep.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct SweepReport {
    pub created: Vec<Fine>,
    pub failures: Vec<SweepFailure>,
}

/// Outcome of a full scheduled cycle.
#[derive(Debug, Serialize, ToSchema)]
pub struct CycleReport {
    pub as_of: DateTime<Utc>,
    pub loans_marked_overdue: u64,
    pub reservations_expired: u64,
    pub fines: SweepReport,
}
