use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use super::ServiceError;
use crate::backend::{from_row, to_row, Backend, Filter};
use crate::middleware::AuthUser;
use crate::models::{salary, EntryType, FinanceEntry, Salary, SalaryStatus};
use crate::models::finance::ENTRIES_TABLE;
use crate::payroll::{
    can_edit, compute_salary, ensure_editable, stored_total, transition, CommissionPolicy, PayrollError, SalaryAction,
    SalaryInput,
};

/// Ledger category and source tag of the entry written when a salary is paid
pub const SALARY_CATEGORY: &str = "salary";
pub const SALARY_SOURCE: &str = "salary";

pub struct SalaryService {
    backend: Arc<dyn Backend>,
    policy: CommissionPolicy,
}

impl SalaryService {
    pub fn new(backend: Arc<dyn Backend>, policy: CommissionPolicy) -> Self {
        Self { backend, policy }
    }

    /// Compute and store a new draft salary
    pub async fn create(&self, input: &SalaryInput, user: &AuthUser) -> Result<Salary, ServiceError> {
        ensure_can_edit(user)?;
        let breakdown = compute_salary(input, &self.policy)?;

        let mut salary = Salary {
            id: Uuid::new_v4(),
            tenant_id: user.tenant_id,
            employee_id: input.employee_id,
            employee_name: None,
            month: String::new(),
            basic_per_day: Default::default(),
            work_days: Default::default(),
            actual_basic: Default::default(),
            livestream_revenue: Default::default(),
            livestream_total: Default::default(),
            media_total: Default::default(),
            media_actor_total: Default::default(),
            kho_total: Default::default(),
            kythuat_total: Default::default(),
            sale_revenue: Default::default(),
            sale_total: Default::default(),
            bonus: Default::default(),
            deduction: Default::default(),
            custom_items: Vec::new(),
            total_salary: Default::default(),
            status: SalaryStatus::Draft,
            created_by: Some(user.user_id),
            approved_by: None,
            approved_at: None,
            paid_by: None,
            paid_at: None,
            updated_at: Some(Utc::now()),
        };
        breakdown.apply_to(&mut salary, input);

        self.backend.insert(salary::TABLE, vec![to_row(&salary)?]).await?;
        tracing::info!("Created salary {} for employee {} ({})", salary.id, salary.employee_id, salary.month);
        Ok(salary)
    }

    /// Recompute an existing salary from new inputs; paid salaries are locked
    pub async fn update(&self, id: Uuid, input: &SalaryInput, user: &AuthUser) -> Result<Salary, ServiceError> {
        ensure_can_edit(user)?;
        let mut salary = self.load(id, user.tenant_id).await?;
        ensure_editable(salary.status)?;

        let breakdown = compute_salary(input, &self.policy)?;
        breakdown.apply_to(&mut salary, input);
        salary.updated_at = Some(Utc::now());

        let mut patch = to_row(&salary)?;
        for key in ["id", "tenant_id", "status", "created_by"] {
            patch.remove(key);
        }
        self.write_guarded(&salary_filter(id, user.tenant_id).eq("status", salary.status.as_str()), patch)
            .await?;
        Ok(salary)
    }

    /// Move a salary one step through draft → approved → paid, or back
    pub async fn apply(&self, id: Uuid, action: SalaryAction, user: &AuthUser) -> Result<Salary, ServiceError> {
        let mut salary = self.load(id, user.tenant_id).await?;
        let from = salary.status;
        let to = transition(from, action, user.role)?;
        let now = Utc::now();

        if action == SalaryAction::Pay {
            let computed = stored_total(&salary)?;
            if computed != salary.total_salary {
                return Err(PayrollError::TotalMismatch { stored: salary.total_salary, computed }.into());
            }
        }

        let patch = match (from, to) {
            (SalaryStatus::Draft, SalaryStatus::Approved) => {
                salary.approved_by = Some(user.user_id);
                salary.approved_at = Some(now);
                json!({ "status": to, "approved_by": user.user_id, "approved_at": now, "updated_at": now })
            }
            (SalaryStatus::Approved, SalaryStatus::Paid) => {
                salary.paid_by = Some(user.user_id);
                salary.paid_at = Some(now);
                json!({ "status": to, "paid_by": user.user_id, "paid_at": now, "updated_at": now })
            }
            (SalaryStatus::Paid, SalaryStatus::Approved) => {
                salary.paid_by = None;
                salary.paid_at = None;
                json!({ "status": to, "paid_by": Value::Null, "paid_at": Value::Null, "updated_at": now })
            }
            _ => {
                salary.approved_by = None;
                salary.approved_at = None;
                json!({ "status": to, "approved_by": Value::Null, "approved_at": Value::Null, "updated_at": now })
            }
        };

        // Guarding on the current status makes a concurrent double-pay a conflict
        self.write_guarded(&salary_filter(id, user.tenant_id).eq("status", from.as_str()), to_row(&patch)?)
            .await?;
        salary.status = to;
        salary.updated_at = Some(now);

        match (from, to) {
            (SalaryStatus::Approved, SalaryStatus::Paid) => {
                self.record_payment_entry(&salary, user).await?;
            }
            (SalaryStatus::Paid, SalaryStatus::Approved) => {
                let removed = self.delete_auto_entries(&salary).await?;
                tracing::info!("Reverted salary {}; removed {} ledger entries", salary.id, removed);
            }
            _ => {}
        }

        tracing::info!("Salary {} moved {} -> {} by {}", salary.id, from.as_str(), to.as_str(), user.user_id);
        Ok(salary)
    }

    async fn load(&self, id: Uuid, tenant_id: Uuid) -> Result<Salary, ServiceError> {
        let row = self
            .backend
            .select_one(salary::TABLE, salary_filter(id, tenant_id))
            .await?
            .ok_or_else(|| ServiceError::NotFound("Không tìm thấy bảng lương".into()))?;
        Ok(from_row(row)?)
    }

    async fn write_guarded(&self, filter: &Filter, patch: crate::backend::Row) -> Result<(), ServiceError> {
        let updated = self.backend.update(salary::TABLE, filter, patch).await?;
        if updated.is_empty() {
            return Err(ServiceError::Stale(format!("salary update matched no rows ({:?})", filter.conditions())));
        }
        Ok(())
    }

    async fn record_payment_entry(&self, salary: &Salary, user: &AuthUser) -> Result<(), ServiceError> {
        let entry = FinanceEntry {
            id: None,
            tenant_id: salary.tenant_id,
            entry_type: EntryType::Payment,
            category: SALARY_CATEGORY.to_string(),
            amount: salary.total_salary,
            description: format!(
                "Lương tháng {} - {}",
                salary.month,
                salary.employee_name.as_deref().unwrap_or("nhân viên")
            ),
            source_type: Some(SALARY_SOURCE.to_string()),
            source_id: Some(salary.id),
            is_auto: true,
            created_by: Some(user.user_id),
            transaction_date: Utc::now().date_naive(),
        };
        self.backend.insert(ENTRIES_TABLE, vec![to_row(&entry)?]).await?;
        Ok(())
    }

    async fn delete_auto_entries(&self, salary: &Salary) -> Result<usize, ServiceError> {
        let filter = Filter::new()
            .eq("tenant_id", salary.tenant_id.to_string())
            .eq("source_type", SALARY_SOURCE)
            .eq("source_id", salary.id.to_string())
            .eq("is_auto", true);
        Ok(self.backend.delete(ENTRIES_TABLE, &filter).await?)
    }
}

fn salary_filter(id: Uuid, tenant_id: Uuid) -> Filter {
    Filter::new()
        .eq("id", id.to_string())
        .eq("tenant_id", tenant_id.to_string())
}

fn ensure_can_edit(user: &AuthUser) -> Result<(), PayrollError> {
    if can_edit(user.role) {
        Ok(())
    } else {
        Err(PayrollError::Forbidden { action: "edit", role: user.role })
    }
}
