use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use super::ServiceError;
use crate::backend::{from_row, to_row, Backend, Filter};
use crate::middleware::AuthUser;
use crate::models::finance::{DEBTS_TABLE, ENTRIES_TABLE};
use crate::models::{Debt, FinanceEntry};

pub const DEBT_CATEGORY: &str = "debt";
pub const DEBT_SOURCE: &str = "debt";

pub struct DebtService {
    backend: Arc<dyn Backend>,
}

impl DebtService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub async fn record_payment(
        &self,
        debt_id: Uuid,
        amount: Decimal,
        note: Option<&str>,
        user: &AuthUser,
    ) -> Result<Debt, ServiceError> {
        let filter = Filter::new()
            .eq("id", debt_id.to_string())
            .eq("tenant_id", user.tenant_id.to_string());
        let row = self
            .backend
            .select_one(DEBTS_TABLE, filter.clone())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Không tìm thấy công nợ".into()))?;
        // Guard on the stored value as read, not a re-serialization of it
        let paid_as_read = row.get("paid_amount").cloned().unwrap_or(Value::Null);
        let mut debt: Debt = from_row(row)?;
        let previous = debt.status;

        debt.record_payment(amount)?;

        let patch = json!({
            "paid_amount": debt.paid_amount,
            "remaining_amount": debt.remaining_amount,
            "status": debt.status,
            "updated_at": Utc::now(),
        });
        let updated = self
            .backend
            .update(
                DEBTS_TABLE,
                &filter.eq("status", json!(previous)).eq("paid_amount", paid_as_read),
                to_row(&patch)?,
            )
            .await?;
        if updated.is_empty() {
            return Err(ServiceError::Stale(format!("debt {} changed during payment", debt_id)));
        }

        let entry = FinanceEntry {
            id: None,
            tenant_id: debt.tenant_id,
            entry_type: debt.debt_type.entry_type(),
            category: DEBT_CATEGORY.to_string(),
            amount,
            description: note
                .map(str::to_string)
                .unwrap_or_else(|| format!("Thanh toán công nợ {}", debt.party_name)),
            source_type: Some(DEBT_SOURCE.to_string()),
            source_id: Some(debt.id),
            is_auto: true,
            created_by: Some(user.user_id),
            transaction_date: Utc::now().date_naive(),
        };
        self.backend.insert(ENTRIES_TABLE, vec![to_row(&entry)?]).await?;

        tracing::info!("Debt {} paid {} ({} remaining)", debt.id, amount, debt.remaining_amount);
        Ok(debt)
    }
}
