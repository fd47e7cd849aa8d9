use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TABLE: &str = "salaries";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalaryStatus {
    Draft,
    Approved,
    Paid,
}

impl SalaryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SalaryStatus::Draft => "draft",
            SalaryStatus::Approved => "approved",
            SalaryStatus::Paid => "paid",
        }
    }
}

/// Free-form extra line on a salary (allowance, advance, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomItem {
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl CustomItem {
    /// `quantity × unit_price`, or `None` when it does not fit a decimal
    pub fn amount(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_price)
    }
}

/// Stored salary row for one employee and month
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Salary {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub employee_id: Uuid,
    #[serde(default)]
    pub employee_name: Option<String>,
    /// `YYYY-MM`
    pub month: String,
    #[serde(default)]
    pub basic_per_day: Decimal,
    #[serde(default)]
    pub work_days: Decimal,
    #[serde(default)]
    pub actual_basic: Decimal,
    #[serde(default)]
    pub livestream_revenue: Decimal,
    #[serde(default)]
    pub livestream_total: Decimal,
    #[serde(default)]
    pub media_total: Decimal,
    #[serde(default)]
    pub media_actor_total: Decimal,
    #[serde(default)]
    pub kho_total: Decimal,
    #[serde(default)]
    pub kythuat_total: Decimal,
    #[serde(default)]
    pub sale_revenue: Decimal,
    #[serde(default)]
    pub sale_total: Decimal,
    #[serde(default)]
    pub bonus: Decimal,
    #[serde(default)]
    pub deduction: Decimal,
    #[serde(default)]
    pub custom_items: Vec<CustomItem>,
    #[serde(default)]
    pub total_salary: Decimal,
    pub status: SalaryStatus,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default)]
    pub approved_by: Option<Uuid>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paid_by: Option<Uuid>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}
