use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use super::{commission, PayrollError};
use crate::config::PayrollConfig;
use crate::models::{CustomItem, Salary};

/// Calendar month a salary covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self, PayrollError> {
        if !(1..=12).contains(&month) {
            return Err(PayrollError::InvalidMonth(format!("{}-{}", year, month)));
        }
        Ok(Self { year, month })
    }

    pub fn contains(self, at: DateTime<Utc>) -> bool {
        let date = at.date_naive();
        date.year() == self.year && date.month() == self.month
    }
}

impl FromStr for Month {
    type Err = PayrollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PayrollError::InvalidMonth(s.to_string());
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Month::new(year, month).map_err(|_| invalid())
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Kinds of counted work paid by piece rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkKind {
    /// Produced/edited a video
    Video,
    /// Appeared on camera in a video
    VideoActor,
    /// Packed a warehouse order
    WarehouseOrder,
    /// Completed a technical-service job
    TechnicalJob,
}

/// A finished unit of work credited to one employee
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedWork {
    pub employee_id: Uuid,
    pub kind: WorkKind,
    #[serde(default = "one")]
    pub count: i64,
    pub completed_at: DateTime<Utc>,
}

fn one() -> i64 {
    1
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkTally {
    #[serde(default)]
    pub video: i64,
    #[serde(default)]
    pub video_actor: i64,
    #[serde(default)]
    pub warehouse_order: i64,
    #[serde(default)]
    pub technical_job: i64,
}

impl WorkTally {
    fn add(&mut self, kind: WorkKind, count: i64) {
        let slot = match kind {
            WorkKind::Video => &mut self.video,
            WorkKind::VideoActor => &mut self.video_actor,
            WorkKind::WarehouseOrder => &mut self.warehouse_order,
            WorkKind::TechnicalJob => &mut self.technical_job,
        };
        *slot = slot.saturating_add(count);
    }
}

/// Count an employee's completed work inside `month`.
///
/// Producer and actor credits are independent: one video can count once
/// under each kind for the same person.
pub fn tally_work(items: &[CompletedWork], employee_id: Uuid, month: Month) -> WorkTally {
    items
        .iter()
        .filter(|w| w.employee_id == employee_id && month.contains(w.completed_at))
        .fold(WorkTally::default(), |mut tally, w| {
            tally.add(w.kind, w.count);
            tally
        })
}

/// Per-employee rates configured by a manager
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalaryRates {
    #[serde(default)]
    pub basic_per_day: Decimal,
    #[serde(default)]
    pub media_per_video: Decimal,
    #[serde(default)]
    pub actor_per_video: Decimal,
    #[serde(default)]
    pub kho_per_order: Decimal,
    #[serde(default)]
    pub kythuat_per_job: Decimal,
    #[serde(default)]
    pub livestream_pct: Decimal,
    #[serde(default)]
    pub sale_pct: Decimal,
}

/// Revenue thresholds gating commissions
#[derive(Debug, Clone, PartialEq)]
pub struct CommissionPolicy {
    pub livestream_threshold: Decimal,
    pub sale_threshold: Decimal,
}

impl From<&PayrollConfig> for CommissionPolicy {
    fn from(config: &PayrollConfig) -> Self {
        Self {
            livestream_threshold: config.livestream_threshold,
            sale_threshold: config.sale_threshold,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalaryInput {
    pub employee_id: Uuid,
    #[serde(default)]
    pub employee_name: Option<String>,
    pub month: Month,
    #[serde(default)]
    pub work_days: Decimal,
    #[serde(default)]
    pub rates: SalaryRates,
    /// Pre-counted work, added on top of the `work_items` tally
    #[serde(default)]
    pub tally: WorkTally,
    /// Raw completed work, filtered to this employee and month
    #[serde(default)]
    pub work_items: Vec<CompletedWork>,
    #[serde(default)]
    pub livestream_revenue: Decimal,
    #[serde(default)]
    pub sale_revenue: Decimal,
    #[serde(default)]
    pub bonus: Decimal,
    #[serde(default)]
    pub deduction: Decimal,
    #[serde(default)]
    pub custom_items: Vec<CustomItem>,
}

impl SalaryInput {
    pub fn effective_tally(&self) -> WorkTally {
        let counted = tally_work(&self.work_items, self.employee_id, self.month);
        WorkTally {
            video: self.tally.video.saturating_add(counted.video),
            video_actor: self.tally.video_actor.saturating_add(counted.video_actor),
            warehouse_order: self.tally.warehouse_order.saturating_add(counted.warehouse_order),
            technical_job: self.tally.technical_job.saturating_add(counted.technical_job),
        }
    }

    fn validate(&self) -> Result<(), PayrollError> {
        let non_negative = [
            ("work_days", self.work_days),
            ("basic_per_day", self.rates.basic_per_day),
            ("media_per_video", self.rates.media_per_video),
            ("actor_per_video", self.rates.actor_per_video),
            ("kho_per_order", self.rates.kho_per_order),
            ("kythuat_per_job", self.rates.kythuat_per_job),
            ("livestream_pct", self.rates.livestream_pct),
            ("sale_pct", self.rates.sale_pct),
            ("livestream_revenue", self.livestream_revenue),
            ("sale_revenue", self.sale_revenue),
            ("bonus", self.bonus),
            ("deduction", self.deduction),
        ];
        if let Some((field, _)) = non_negative.iter().find(|(_, v)| v.is_sign_negative() && !v.is_zero()) {
            return Err(PayrollError::InvalidInput(format!("{} must not be negative", field)));
        }
        if self.work_days > Decimal::from(31) {
            return Err(PayrollError::InvalidInput("work_days exceeds days in a month".into()));
        }
        let tally = self.effective_tally();
        if tally.video < 0 || tally.video_actor < 0 || tally.warehouse_order < 0 || tally.technical_job < 0 {
            return Err(PayrollError::InvalidInput("work counts must not be negative".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryBreakdown {
    pub actual_basic: Decimal,
    pub livestream_total: Decimal,
    pub media_total: Decimal,
    pub media_actor_total: Decimal,
    pub kho_total: Decimal,
    pub kythuat_total: Decimal,
    pub sale_total: Decimal,
    pub bonus: Decimal,
    pub deduction: Decimal,
    pub custom_total: Decimal,
    pub total_salary: Decimal,
}

impl SalaryBreakdown {
    /// Copy the computed amounts and their inputs onto a stored salary row
    pub fn apply_to(&self, salary: &mut Salary, input: &SalaryInput) {
        salary.month = input.month.to_string();
        salary.employee_id = input.employee_id;
        if input.employee_name.is_some() {
            salary.employee_name = input.employee_name.clone();
        }
        salary.basic_per_day = input.rates.basic_per_day;
        salary.work_days = input.work_days;
        salary.actual_basic = self.actual_basic;
        salary.livestream_revenue = input.livestream_revenue;
        salary.livestream_total = self.livestream_total;
        salary.media_total = self.media_total;
        salary.media_actor_total = self.media_actor_total;
        salary.kho_total = self.kho_total;
        salary.kythuat_total = self.kythuat_total;
        salary.sale_revenue = input.sale_revenue;
        salary.sale_total = self.sale_total;
        salary.bonus = self.bonus;
        salary.deduction = self.deduction;
        salary.custom_items = input.custom_items.clone();
        salary.total_salary = self.total_salary;
    }
}

pub fn compute_salary(input: &SalaryInput, policy: &CommissionPolicy) -> Result<SalaryBreakdown, PayrollError> {
    input.validate()?;
    let tally = input.effective_tally();
    let rates = &input.rates;

    let actual_basic = checked_product("actual_basic", rates.basic_per_day, input.work_days)?;
    let livestream_total = commission(input.livestream_revenue, policy.livestream_threshold, rates.livestream_pct)
        .ok_or_else(|| too_large("livestream_total"))?;
    let media_total = checked_product("media_total", Decimal::from(tally.video), rates.media_per_video)?;
    let media_actor_total = checked_product("media_actor_total", Decimal::from(tally.video_actor), rates.actor_per_video)?;
    let kho_total = checked_product("kho_total", Decimal::from(tally.warehouse_order), rates.kho_per_order)?;
    let kythuat_total = checked_product("kythuat_total", Decimal::from(tally.technical_job), rates.kythuat_per_job)?;
    let sale_total =
        commission(input.sale_revenue, policy.sale_threshold, rates.sale_pct).ok_or_else(|| too_large("sale_total"))?;
    let custom_total = custom_sum(&input.custom_items)?;

    let total_salary = checked_total(
        &[
            actual_basic,
            livestream_total,
            media_total,
            media_actor_total,
            kho_total,
            kythuat_total,
            sale_total,
            input.bonus,
            custom_total,
        ],
        input.deduction,
    )?;

    Ok(SalaryBreakdown {
        actual_basic,
        livestream_total,
        media_total,
        media_actor_total,
        kho_total,
        kythuat_total,
        sale_total,
        bonus: input.bonus,
        deduction: input.deduction,
        custom_total,
        total_salary,
    })
}

/// Total implied by a stored row's components
pub fn stored_total(salary: &Salary) -> Result<Decimal, PayrollError> {
    checked_total(
        &[
            salary.actual_basic,
            salary.livestream_total,
            salary.media_total,
            salary.media_actor_total,
            salary.kho_total,
            salary.kythuat_total,
            salary.sale_total,
            salary.bonus,
            custom_sum(&salary.custom_items)?,
        ],
        salary.deduction,
    )
}

fn too_large(field: &str) -> PayrollError {
    PayrollError::InvalidInput(format!("{} is too large", field))
}

fn checked_product(field: &str, a: Decimal, b: Decimal) -> Result<Decimal, PayrollError> {
    a.checked_mul(b).ok_or_else(|| too_large(field))
}

fn custom_sum(items: &[CustomItem]) -> Result<Decimal, PayrollError> {
    items.iter().try_fold(Decimal::ZERO, |acc, item| {
        item.amount()
            .and_then(|amount| acc.checked_add(amount))
            .ok_or_else(|| too_large("custom_total"))
    })
}

fn checked_total(parts: &[Decimal], deduction: Decimal) -> Result<Decimal, PayrollError> {
    parts
        .iter()
        .try_fold(Decimal::ZERO, |acc, part| acc.checked_add(*part))
        .and_then(|sum| sum.checked_sub(deduction))
        .ok_or_else(|| too_large("total_salary"))
}
