use serde::{Deserialize, Serialize};

use super::PayrollError;
use crate::auth::Role;
use crate::models::SalaryStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalaryAction {
    Approve,
    Pay,
    Revert,
}

impl SalaryAction {
    pub fn as_str(self) -> &'static str {
        match self {
            SalaryAction::Approve => "approve",
            SalaryAction::Pay => "pay",
            SalaryAction::Revert => "revert",
        }
    }

    fn allowed(self, role: Role) -> bool {
        match self {
            SalaryAction::Approve => matches!(role, Role::Owner | Role::Admin | Role::Manager),
            SalaryAction::Pay => matches!(role, Role::Owner | Role::Admin | Role::Accountant),
            SalaryAction::Revert => matches!(role, Role::Owner | Role::Admin),
        }
    }
}

/// Roles that may create or edit salary rows
pub fn can_edit(role: Role) -> bool {
    !matches!(role, Role::Staff)
}

/// Next status for `action`, checked against the caller's role first
pub fn transition(current: SalaryStatus, action: SalaryAction, role: Role) -> Result<SalaryStatus, PayrollError> {
    if !action.allowed(role) {
        return Err(PayrollError::Forbidden { action: action.as_str(), role });
    }

    match (current, action) {
        (SalaryStatus::Draft, SalaryAction::Approve) => Ok(SalaryStatus::Approved),
        (SalaryStatus::Approved, SalaryAction::Pay) => Ok(SalaryStatus::Paid),
        (SalaryStatus::Paid, SalaryAction::Revert) => Ok(SalaryStatus::Approved),
        (SalaryStatus::Approved, SalaryAction::Revert) => Ok(SalaryStatus::Draft),
        (from, action) => Err(PayrollError::InvalidTransition { from, action }),
    }
}

pub fn ensure_editable(status: SalaryStatus) -> Result<(), PayrollError> {
    match status {
        SalaryStatus::Paid => Err(PayrollError::PaidLocked),
        SalaryStatus::Draft | SalaryStatus::Approved => Ok(()),
    }
}
