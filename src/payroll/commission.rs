use rust_decimal::Decimal;

/// Step-function commission: `revenue × pct / 100` once revenue reaches
/// the threshold, nothing below it. `None` when the product overflows.
pub fn commission(revenue: Decimal, threshold: Decimal, pct: Decimal) -> Option<Decimal> {
    if revenue >= threshold {
        revenue.checked_mul(pct).map(|v| v / Decimal::ONE_HUNDRED)
    } else {
        Some(Decimal::ZERO)
    }
}
