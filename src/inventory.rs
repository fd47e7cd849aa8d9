//! Stock restoration for returned orders.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use uuid::Uuid;

use crate::models::{OrderItem, OrderStatus, Product};

#[derive(Debug, Error, PartialEq)]
pub enum InventoryError {
    #[error("Product {0} not found")]
    ProductNotFound(Uuid),

    #[error("Order in status {0:?} cannot be returned")]
    NotReturnable(OrderStatus),

    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: Uuid, quantity: i64 },

    #[error("Stock quantity overflow for product {0}")]
    QuantityOverflow(Uuid),
}

/// Stock to credit back per product when `items` come back.
///
/// A combo holds no stock of its own: each component is credited
/// `component.quantity × item.quantity`. Regular products are credited the
/// item quantity. Every quantity involved must be positive.
pub fn restock_deltas(
    items: &[OrderItem],
    catalog: &HashMap<Uuid, Product>,
) -> Result<BTreeMap<Uuid, i64>, InventoryError> {
    let mut deltas = BTreeMap::new();

    for item in items {
        if item.quantity <= 0 {
            return Err(InventoryError::InvalidQuantity {
                product_id: item.product_id,
                quantity: item.quantity,
            });
        }
        let product = catalog
            .get(&item.product_id)
            .ok_or(InventoryError::ProductNotFound(item.product_id))?;

        if !product.is_combo {
            credit(&mut deltas, product.id, item.quantity)?;
            continue;
        }

        if product.combo_items.is_empty() {
            tracing::warn!("Combo product {} has no components; nothing restocked", product.id);
        }
        for component in &product.combo_items {
            if component.quantity <= 0 {
                return Err(InventoryError::InvalidQuantity {
                    product_id: component.product_id,
                    quantity: component.quantity,
                });
            }
            if !catalog.contains_key(&component.product_id) {
                return Err(InventoryError::ProductNotFound(component.product_id));
            }
            let quantity = component
                .quantity
                .checked_mul(item.quantity)
                .ok_or(InventoryError::QuantityOverflow(component.product_id))?;
            credit(&mut deltas, component.product_id, quantity)?;
        }
    }

    Ok(deltas)
}

fn credit(deltas: &mut BTreeMap<Uuid, i64>, product_id: Uuid, quantity: i64) -> Result<(), InventoryError> {
    let total = deltas.entry(product_id).or_insert(0);
    *total = total
        .checked_add(quantity)
        .ok_or(InventoryError::QuantityOverflow(product_id))?;
    Ok(())
}

/// Stock after adding `delta`, refusing to wrap
pub fn adjusted_stock(product_id: Uuid, current: i64, delta: i64) -> Result<i64, InventoryError> {
    current
        .checked_add(delta)
        .ok_or(InventoryError::QuantityOverflow(product_id))
}

/// Product ids whose rows are needed to restock `items`, combos included
pub fn referenced_products(items: &[OrderItem]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    ids.sort();
    ids.dedup();
    ids
}
