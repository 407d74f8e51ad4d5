//! Lifecycle rules for reservations, loans and fines.
//!
//! Nothing in here touches the store: the services load rows, ask these types
//! whether a transition or a fine applies, and persist the outcome.

pub mod policy;
pub mod status;

pub use policy::{LendingPolicy, available_copies, format_cents};
pub use status::{LoanStatus, ReservationStatus, Role, TransitionError};
