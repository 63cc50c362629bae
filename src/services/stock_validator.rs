//! Admission check for stock movements.
//!
//! Checks run in a fixed order and stop at the first failure: kind, role, duplicate
//! ids, empty list, quantities, product existence, then (outbound only) stock on hand.
//! Everything except the batch product lookup is a pure function.

use std::collections::{HashMap, HashSet};

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    auth::Principal,
    db,
    entities::{
        activity::ActivityKind,
        product::{self, Entity as Product},
    },
    errors::ServiceError,
};

/// One `(product, quantity)` pair as submitted by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedLine {
    #[serde(rename = "id")]
    pub product_id: i32,
    pub quantity: i64,
}

impl RequestedLine {
    pub fn new(product_id: i32, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// A requested line after admission: the product row as seen inside the transaction
/// and a quantity known to be positive.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLine {
    pub product: product::Model,
    pub quantity: i32,
}

pub fn parse_kind(raw: &str) -> Result<ActivityKind, ServiceError> {
    raw.parse::<ActivityKind>()
        .map_err(|_| ServiceError::InvalidKind(raw.to_string()))
}

/// Request-level checks that need no database access.
pub fn check_request(
    principal: &Principal,
    kind: ActivityKind,
    lines: &[RequestedLine],
) -> Result<(), ServiceError> {
    if kind == ActivityKind::Inbound && !principal.is_admin() {
        return Err(ServiceError::Forbidden(
            "Only admins can record inbound stock".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(lines.len());
    for line in lines {
        if !seen.insert(line.product_id) {
            return Err(ServiceError::DuplicateProduct(line.product_id));
        }
    }

    if lines.is_empty() {
        return Err(ServiceError::EmptyRequest);
    }

    if let Some(bad) = lines
        .iter()
        .find(|l| l.quantity <= 0 || l.quantity > i32::MAX as i64)
    {
        return Err(ServiceError::QuantityInvalid {
            product_id: bad.product_id,
            quantity: bad.quantity,
        });
    }

    Ok(())
}

/// Pairs each requested line with its looked-up product, in request order.
///
/// `products` is whatever the batch lookup returned; ids it does not contain are
/// reported together. Assumes `check_request` already passed.
pub fn check_lines(
    kind: ActivityKind,
    lines: &[RequestedLine],
    products: Vec<product::Model>,
) -> Result<Vec<ResolvedLine>, ServiceError> {
    let mut by_id: HashMap<i32, product::Model> =
        products.into_iter().map(|p| (p.id, p)).collect();

    let missing: Vec<i32> = lines
        .iter()
        .map(|l| l.product_id)
        .filter(|id| !by_id.contains_key(id))
        .collect();
    if !missing.is_empty() {
        return Err(ServiceError::ProductNotFound(missing));
    }

    let mut resolved = Vec::with_capacity(lines.len());
    for line in lines {
        let quantity = i32::try_from(line.quantity).map_err(|_| ServiceError::QuantityInvalid {
            product_id: line.product_id,
            quantity: line.quantity,
        })?;
        let product = by_id
            .remove(&line.product_id)
            .ok_or_else(|| ServiceError::ProductNotFound(vec![line.product_id]))?;

        match kind {
            ActivityKind::Outbound if quantity > product.stock => {
                return Err(ServiceError::InsufficientStock {
                    product_id: product.id,
                    name: product.name.clone(),
                    requested: quantity,
                    available: product.stock,
                });
            }
            ActivityKind::Inbound if product.stock.checked_add(quantity).is_none() => {
                return Err(ServiceError::ValidationError(format!(
                    "Restocking {} unit(s) of product {} would exceed the maximum stock of {} (current stock {})",
                    quantity,
                    product.id,
                    i32::MAX,
                    product.stock
                )));
            }
            _ => {}
        }

        resolved.push(ResolvedLine { product, quantity });
    }

    Ok(resolved)
}

/// Loads every requested product in one query, skipping soft-deleted rows.
/// With `lock` set the rows are fetched `FOR UPDATE`, in id order. Without it (SQLite)
/// the caller's transaction claims the database write lock before reading.
pub async fn load_products<C: ConnectionTrait>(
    db: &C,
    ids: &[i32],
    lock: bool,
) -> Result<Vec<product::Model>, ServiceError> {
    let mut query = Product::find()
        .filter(product::Column::Id.is_in(ids.iter().copied()))
        .filter(product::Column::DeletedAt.is_null())
        .order_by_asc(product::Column::Id);
    if lock {
        query = query.lock_exclusive();
    } else {
        db::claim_writer::<Product, _>(db, product::Column::UpdatedAt, product::Column::Id, ids)
            .await
            .map_err(ServiceError::db_error)?;
    }
    query.all(db).await.map_err(ServiceError::db_error)
}

/// Full admission check for an already parsed kind.
pub async fn resolve<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    kind: ActivityKind,
    lines: &[RequestedLine],
    lock: bool,
) -> Result<Vec<ResolvedLine>, ServiceError> {
    check_request(principal, kind, lines)?;

    let ids: Vec<i32> = lines.iter().map(|l| l.product_id).collect();
    let products = load_products(db, &ids, lock).await?;
    debug!(
        requested = ids.len(),
        found = products.len(),
        locked = lock,
        "resolved activity products"
    );

    check_lines(kind, lines, products)
}
