//! Monthly salary rules.
//!
//! A salary is a flat weighted sum: daily basic pay times days worked,
//! piece rates for counted work, threshold-gated commissions, then bonus,
//! deduction and free-form custom lines. Salaries move draft → approved →
//! paid, one step back at a time via revert.

pub mod commission;
pub mod compute;
pub mod status;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::auth::Role;
use crate::models::SalaryStatus;

pub use commission::commission;
pub use compute::{
    compute_salary, stored_total, tally_work, CommissionPolicy, CompletedWork, Month, SalaryBreakdown, SalaryInput,
    SalaryRates, WorkKind, WorkTally,
};
pub use status::{can_edit, ensure_editable, transition, SalaryAction};

#[derive(Debug, Error, PartialEq)]
pub enum PayrollError {
    #[error("Invalid month '{0}', expected YYYY-MM")]
    InvalidMonth(String),

    #[error("Invalid salary input: {0}")]
    InvalidInput(String),

    #[error("Role {role:?} may not {action} salaries")]
    Forbidden { action: &'static str, role: Role },

    #[error("Cannot {action:?} a salary in status {from:?}")]
    InvalidTransition { from: SalaryStatus, action: SalaryAction },

    #[error("Paid salaries cannot be edited")]
    PaidLocked,

    #[error("Stored total {stored} does not match components {computed}")]
    TotalMismatch { stored: Decimal, computed: Decimal },
}
