use std::fmt;

use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{entity} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub entity: &'static str,
    pub from: String,
    pub to: String,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[sea_orm(string_value = "librarian")]
    Librarian,
    #[sea_orm(string_value = "reader")]
    Reader,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Librarian => "librarian",
            Role::Reader => "reader",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "librarian" => Some(Role::Librarian),
            "reader" => Some(Role::Reader),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pending is the only non-terminal state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "fulfilled")]
    Fulfilled,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Fulfilled => "fulfilled",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Expired => "expired",
        }
    }

    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Pending, Fulfilled) | (Pending, Cancelled) | (Pending, Expired)
        )
    }

    pub fn transition_to(&self, next: ReservationStatus) -> Result<ReservationStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                entity: "reservation",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loan lifecycle.
///
/// | from    | to        |
/// |---------|-----------|
/// | Active  | Overdue   |
/// | Active  | Returned  |
/// | Active  | Concluded |
/// | Overdue | Returned  |
/// | Overdue | Concluded |
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "overdue")]
    Overdue,
    #[sea_orm(string_value = "returned")]
    Returned,
    #[sea_orm(string_value = "concluded")]
    Concluded,
}

impl LoanStatus {
    /// Statuses that hold a copy of the book.
    pub const OPEN: [LoanStatus; 2] = [LoanStatus::Active, LoanStatus::Overdue];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Returned => "returned",
            LoanStatus::Concluded => "concluded",
        }
    }

    pub fn is_open(&self) -> bool {
        Self::OPEN.contains(self)
    }

    pub fn can_transition_to(&self, next: LoanStatus) -> bool {
        use LoanStatus::*;
        matches!(
            (self, next),
            (Active, Overdue)
                | (Active, Returned)
                | (Active, Concluded)
                | (Overdue, Returned)
                | (Overdue, Concluded)
        )
    }

    pub fn transition_to(&self, next: LoanStatus) -> Result<LoanStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                entity: "loan",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn reservation_only_leaves_pending() {
        for from in ReservationStatus::iter() {
            for to in ReservationStatus::iter() {
                let allowed = from == ReservationStatus::Pending && to != ReservationStatus::Pending;
                assert_eq!(from.can_transition_to(to), allowed, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn loan_transition_table_is_exhaustive() {
        let allowed = [
            (LoanStatus::Active, LoanStatus::Overdue),
            (LoanStatus::Active, LoanStatus::Returned),
            (LoanStatus::Active, LoanStatus::Concluded),
            (LoanStatus::Overdue, LoanStatus::Returned),
            (LoanStatus::Overdue, LoanStatus::Concluded),
        ];
        for from in LoanStatus::iter() {
            for to in LoanStatus::iter() {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn concluding_twice_is_rejected() {
        let err = LoanStatus::Concluded
            .transition_to(LoanStatus::Concluded)
            .unwrap_err();
        assert_eq!(err.to_string(), "loan cannot move from concluded to concluded");
    }

    #[test]
    fn overdue_cannot_go_back_to_active() {
        assert!(LoanStatus::Overdue.transition_to(LoanStatus::Active).is_err());
        assert!(LoanStatus::Overdue.is_open());
        assert!(!LoanStatus::Returned.is_open());
    }

    #[test]
    fn role_round_trips_through_text() {
        assert_eq!(Role::parse("librarian"), Some(Role::Librarian));
        assert_eq!(Role::parse(Role::Reader.as_str()), Some(Role::Reader));
        assert_eq!(Role::parse("admin"), None);
    }
}
