use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const ENTRIES_TABLE: &str = "finance_entries";
pub const DEBTS_TABLE: &str = "debts";

#[derive(Debug, Error, PartialEq)]
pub enum FinanceError {
    #[error("Payment amount must be positive")]
    NonPositiveAmount,

    #[error("Payment {amount} exceeds remaining balance {remaining}")]
    Overpayment { amount: Decimal, remaining: Decimal },
}

/// Direction of a ledger row: money in (receipt) or money out (payment)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Receipt,
    Payment,
}

/// One receipts/payments ledger row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinanceEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub tenant_id: Uuid,
    pub entry_type: EntryType,
    pub category: String,
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
    /// Set on rows created by another operation (salary payment, refund...)
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub source_id: Option<Uuid>,
    #[serde(default)]
    pub is_auto: bool,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    pub transaction_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtStatus {
    Pending,
    Partial,
    Paid,
}

/// Who owes whom: customers owe us (receivable), we owe suppliers (payable)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtType {
    #[default]
    Receivable,
    Payable,
}

impl DebtType {
    /// Ledger direction of a payment against a debt of this type
    pub fn entry_type(self) -> EntryType {
        match self {
            DebtType::Receivable => EntryType::Receipt,
            DebtType::Payable => EntryType::Payment,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debt {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[serde(default)]
    pub debt_type: DebtType,
    #[serde(default)]
    pub party_name: String,
    pub total_amount: Decimal,
    #[serde(default)]
    pub paid_amount: Decimal,
    #[serde(default)]
    pub remaining_amount: Decimal,
    pub status: DebtStatus,
}

impl Debt {
    /// Apply a payment, keeping `remaining_amount = total_amount - paid_amount`
    pub fn record_payment(&mut self, amount: Decimal) -> Result<(), FinanceError> {
        if amount <= Decimal::ZERO {
            return Err(FinanceError::NonPositiveAmount);
        }
        let remaining = self.total_amount - self.paid_amount;
        if amount > remaining {
            return Err(FinanceError::Overpayment { amount, remaining });
        }
        self.paid_amount += amount;
        self.recompute();
        Ok(())
    }

    pub fn recompute(&mut self) {
        self.remaining_amount = self.total_amount - self.paid_amount;
        self.status = if self.paid_amount <= Decimal::ZERO {
            DebtStatus::Pending
        } else if self.remaining_amount <= Decimal::ZERO {
            DebtStatus::Paid
        } else {
            DebtStatus::Partial
        };
    }
}
