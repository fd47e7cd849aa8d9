use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use super::ServiceError;
use crate::backend::{from_row, to_row, Backend, Filter, Query};
use crate::inventory::{adjusted_stock, referenced_products, restock_deltas, InventoryError};
use crate::middleware::AuthUser;
use crate::models::finance::ENTRIES_TABLE;
use crate::models::{order, product, EntryType, FinanceEntry, Order, OrderItem, OrderStatus, Product};

pub const REFUND_CATEGORY: &str = "refund";
pub const ORDER_SOURCE: &str = "order";

const STOCK_WRITE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct ReturnSummary {
    pub order_id: Uuid,
    pub status: OrderStatus,
    /// Stock credited per product id
    pub restocked: BTreeMap<Uuid, i64>,
    pub refund_amount: Decimal,
}

pub struct ReturnService {
    backend: Arc<dyn Backend>,
}

impl ReturnService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Mark an order returned, put its goods back in stock and book the refund
    pub async fn return_order(&self, order_id: Uuid, user: &AuthUser) -> Result<ReturnSummary, ServiceError> {
        let tenant = user.tenant_id.to_string();
        let order: Order = from_row(
            self.backend
                .select_one(order::TABLE, Filter::new().eq("id", order_id.to_string()).eq("tenant_id", tenant.clone()))
                .await?
                .ok_or_else(|| ServiceError::NotFound("Không tìm thấy đơn hàng".into()))?,
        )?;
        if !order.status.is_returnable() {
            return Err(InventoryError::NotReturnable(order.status).into());
        }

        let items: Vec<OrderItem> = self
            .backend
            .select(
                order::ITEMS_TABLE,
                &Query::filtered(Filter::new().eq("order_id", order_id.to_string())),
            )
            .await?
            .into_iter()
            .map(from_row)
            .collect::<Result<_, _>>()?;

        let catalog = self.load_catalog(&items, &tenant).await?;
        let deltas = restock_deltas(&items, &catalog)?;

        // The status flip comes last so a failed attempt leaves the order
        // returnable. Earlier writes are undone when a later step fails.
        let mut credited: Vec<(Uuid, i64)> = Vec::with_capacity(deltas.len());
        for (&product_id, &delta) in &deltas {
            if let Err(e) = self.adjust_stock(product_id, delta, &tenant).await {
                self.undo(&credited, None, &tenant).await;
                return Err(e);
            }
            credited.push((product_id, delta));
            tracing::debug!("Restocked product {} by {}", product_id, delta);
        }

        let mut refund_id = None;
        if order.paid_amount > Decimal::ZERO {
            let entry = FinanceEntry {
                id: Some(Uuid::new_v4()),
                tenant_id: user.tenant_id,
                entry_type: EntryType::Payment,
                category: REFUND_CATEGORY.to_string(),
                amount: order.paid_amount,
                description: format!("Hoàn tiền đơn hàng {}", order.code),
                source_type: Some(ORDER_SOURCE.to_string()),
                source_id: Some(order.id),
                is_auto: true,
                created_by: Some(user.user_id),
                transaction_date: Utc::now().date_naive(),
            };
            let inserted = match to_row(&entry) {
                Ok(row) => self.backend.insert(ENTRIES_TABLE, vec![row]).await,
                Err(e) => Err(e),
            };
            if let Err(e) = inserted {
                self.undo(&credited, None, &tenant).await;
                return Err(e.into());
            }
            refund_id = entry.id;
        }

        let flipped = self
            .backend
            .update(
                order::TABLE,
                &Filter::new()
                    .eq("id", order_id.to_string())
                    .eq("tenant_id", tenant.clone())
                    .eq("status", order.status.as_str()),
                to_row(&json!({ "status": OrderStatus::Returned, "updated_at": Utc::now() }))?,
            )
            .await;
        match flipped {
            Ok(rows) if !rows.is_empty() => {}
            Ok(_) => {
                self.undo(&credited, refund_id, &tenant).await;
                return Err(ServiceError::Stale(format!("order {} changed during return", order_id)));
            }
            Err(e) => {
                self.undo(&credited, refund_id, &tenant).await;
                return Err(e.into());
            }
        }

        tracing::info!("Order {} returned; {} products restocked", order.code, deltas.len());
        Ok(ReturnSummary {
            order_id,
            status: OrderStatus::Returned,
            restocked: deltas,
            refund_amount: order.paid_amount,
        })
    }

    /// Add `delta` to a product's stock, comparing against the value read so
    /// concurrent writers are never overwritten
    async fn adjust_stock(&self, product_id: Uuid, delta: i64, tenant: &str) -> Result<(), ServiceError> {
        for _ in 0..STOCK_WRITE_ATTEMPTS {
            let row = self
                .backend
                .select_one(
                    product::TABLE,
                    Filter::new().eq("id", product_id.to_string()).eq("tenant_id", tenant.to_string()),
                )
                .await?
                .ok_or(InventoryError::ProductNotFound(product_id))?;
            let current: Product = from_row(row)?;
            let next = adjusted_stock(product_id, current.stock_quantity, delta)?;

            let updated = self
                .backend
                .update(
                    product::TABLE,
                    &Filter::new()
                        .eq("id", product_id.to_string())
                        .eq("tenant_id", tenant.to_string())
                        .eq("stock_quantity", current.stock_quantity),
                    to_row(&json!({ "stock_quantity": next, "updated_at": Utc::now() }))?,
                )
                .await?;
            if !updated.is_empty() {
                return Ok(());
            }
            tracing::debug!("Stock of product {} moved underneath us; re-reading", product_id);
        }
        Err(ServiceError::Stale(format!("stock of product {} kept changing", product_id)))
    }

    /// Best-effort reversal of a partially applied return
    async fn undo(&self, credited: &[(Uuid, i64)], refund_id: Option<Uuid>, tenant: &str) {
        for &(product_id, delta) in credited.iter().rev() {
            if let Err(e) = self.adjust_stock(product_id, -delta, tenant).await {
                tracing::error!("Failed to take back {} units of product {}: {}", delta, product_id, e);
            }
        }
        if let Some(id) = refund_id {
            let filter = Filter::new().eq("id", id.to_string()).eq("tenant_id", tenant.to_string());
            if let Err(e) = self.backend.delete(ENTRIES_TABLE, &filter).await {
                tracing::error!("Failed to remove refund entry {}: {}", id, e);
            }
        }
    }

    /// Products referenced by the items plus the components of any combo among them
    async fn load_catalog(&self, items: &[OrderItem], tenant: &str) -> Result<HashMap<Uuid, Product>, ServiceError> {
        let mut catalog = HashMap::new();
        let mut pending = referenced_products(items);

        while let Some(id) = pending.pop() {
            if catalog.contains_key(&id) {
                continue;
            }
            let row = self
                .backend
                .select_one(
                    product::TABLE,
                    Filter::new().eq("id", id.to_string()).eq("tenant_id", tenant.to_string()),
                )
                .await?;
            let Some(row) = row else {
                return Err(InventoryError::ProductNotFound(id).into());
            };
            let product: Product = from_row(row)?;
            if product.is_combo {
                pending.extend(product.combo_items.iter().map(|c| c.product_id));
            }
            catalog.insert(id, product);
        }
        Ok(catalog)
    }
}
