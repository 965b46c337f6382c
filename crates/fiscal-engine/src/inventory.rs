//! # Inventory Costing Engine
//!
//! Persists stock movements: locks the product, applies
//! [`fiscal_core::costing::apply_movement`], writes the new position and
//! appends a ledger row. Emission and cancellation call
//! [`move_stock_in_tx`] inside their own transaction; [`FiscalEngine::move_stock`]
//! wraps it for purchases and adjustments.
//!
//! ## Movement Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lock(product)  ── missing ──► NotFound                                 │
//! │      │                                                                  │
//! │      ├── service ──► no-op (debug log), returns None                    │
//! │      ▼                                                                  │
//! │  apply_movement(position, direction, qty, unit_cost)                    │
//! │      │  OUT beyond stock ──► InsufficientStock (nothing written)        │
//! │      ▼                                                                  │
//! │  update_position + insert stock_movements row                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use crate::engine::FiscalEngine;
use crate::error::EngineResult;
use fiscal_core::costing::{apply_movement, StockPosition};
use fiscal_core::types::Rate;
use fiscal_core::validation::{
    validate_product_name, validate_quantity, validate_rate, validate_sku,
};
use fiscal_core::{
    Actor, CoreError, Money, Product, ProductKind, StockDirection, StockMovement, StockReason,
    ValidationError,
};
use fiscal_db::{new_id, ProductRepository, StockMovementRepository};

/// One requested stock movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockMoveRequest {
    pub product_id: String,
    pub quantity: i64,
    pub direction: StockDirection,
    pub reason: StockReason,
    /// Document id or any other origin of the movement.
    pub reference: Option<String>,
    /// Purchase cost per unit; only meaningful for incoming stock.
    pub unit_cost: Option<Money>,
}

impl StockMoveRequest {
    pub fn new(
        product_id: impl Into<String>,
        quantity: i64,
        direction: StockDirection,
        reason: StockReason,
    ) -> Self {
        StockMoveRequest {
            product_id: product_id.into(),
            quantity,
            direction,
            reason,
            reference: None,
            unit_cost: None,
        }
    }

    /// Incoming purchase at a unit cost.
    pub fn purchase(product_id: impl Into<String>, quantity: i64, unit_cost: Money) -> Self {
        Self::new(product_id, quantity, StockDirection::In, StockReason::Purchase)
            .with_unit_cost(unit_cost)
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_unit_cost(mut self, unit_cost: Money) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }
}

/// A product as registered for stock purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub sku: String,
    pub name: String,
    pub kind: ProductKind,
    pub vat_rate: Rate,
    /// Services only.
    pub retention_rate: Option<Rate>,
    pub min_stock: i64,
    /// Booked as an adjustment at `opening_cost` when positive.
    pub opening_stock: i64,
    pub opening_cost: Money,
}

impl ProductDraft {
    pub fn goods(sku: impl Into<String>, name: impl Into<String>, vat_rate: Rate) -> Self {
        ProductDraft {
            sku: sku.into(),
            name: name.into(),
            kind: ProductKind::Goods,
            vat_rate,
            retention_rate: None,
            min_stock: 0,
            opening_stock: 0,
            opening_cost: Money::zero(),
        }
    }

    pub fn service(sku: impl Into<String>, name: impl Into<String>, vat_rate: Rate) -> Self {
        ProductDraft {
            kind: ProductKind::Service,
            ..Self::goods(sku, name, vat_rate)
        }
    }

    pub fn with_retention_rate(mut self, rate: Rate) -> Self {
        self.retention_rate = Some(rate);
        self
    }

    pub fn with_min_stock(mut self, min_stock: i64) -> Self {
        self.min_stock = min_stock;
        self
    }

    pub fn with_opening_stock(mut self, quantity: i64, unit_cost: Money) -> Self {
        self.opening_stock = quantity;
        self.opening_cost = unit_cost;
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_sku(&self.sku)?;
        validate_product_name(&self.name)?;
        validate_rate("vat_rate", self.vat_rate)?;
        if let Some(rate) = self.retention_rate {
            if self.kind == ProductKind::Goods {
                return Err(ValidationError::inconsistent(
                    "retention applies to services only",
                ));
            }
            validate_rate("retention_rate", rate)?;
        }
        if self.min_stock < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "min_stock".to_string(),
            });
        }
        if self.opening_stock < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "opening_stock".to_string(),
            });
        }
        if self.opening_cost.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "opening_cost".to_string(),
            });
        }
        if self.kind == ProductKind::Service && self.opening_stock > 0 {
            return Err(ValidationError::inconsistent("services carry no stock"));
        }
        Ok(())
    }
}

/// Applies one movement inside the caller's transaction.
///
/// Returns `None` for services, which have no stock.
pub(crate) async fn move_stock_in_tx(
    conn: &mut SqliteConnection,
    request: &StockMoveRequest,
    actor: &Actor,
    now: DateTime<Utc>,
) -> EngineResult<Option<StockMovement>> {
    let mut products = ProductRepository::new(&mut *conn);
    if !products.lock(&request.product_id, now).await? {
        return Err(CoreError::not_found("product", request.product_id.as_str()).into());
    }
    let product = products
        .get(&request.product_id)
        .await?
        .ok_or_else(|| CoreError::not_found("product", request.product_id.as_str()))?;

    if product.is_service() {
        debug!(product_id = %product.id, sku = %product.sku, "Service product, stock unchanged");
        return Ok(None);
    }

    let before = StockPosition {
        quantity: product.current_stock,
        average_cost: product.average_cost(),
    };
    let after = match apply_movement(
        &product.sku,
        before,
        request.direction,
        request.quantity,
        request.unit_cost,
    ) {
        Ok(after) => after,
        Err(err) => {
            warn!(
                product_id = %product.id,
                available = before.quantity,
                requested = request.quantity,
                "Stock movement rejected"
            );
            return Err(err.into());
        }
    };

    products
        .update_position(&product.id, after.quantity, after.average_cost, now)
        .await?;

    let movement = StockMovement {
        id: new_id(),
        product_id: product.id.clone(),
        direction: request.direction,
        quantity: request.quantity,
        quantity_before: before.quantity,
        quantity_after: after.quantity,
        unit_cost_cents: request.unit_cost.map(|cost| cost.cents()),
        average_cost_before_cents: before.average_cost.cents(),
        average_cost_after_cents: after.average_cost.cents(),
        reference: request.reference.clone(),
        reason: request.reason,
        created_by: actor.as_str().to_string(),
        created_at: now,
    };
    StockMovementRepository::new(&mut *conn)
        .insert(&movement)
        .await?;

    debug!(
        product_id = %movement.product_id,
        direction = ?movement.direction,
        quantity = movement.quantity,
        stock = movement.quantity_after,
        "Stock moved"
    );
    Ok(Some(movement))
}

impl FiscalEngine {
    /// Records a purchase, adjustment or other movement outside a document.
    pub async fn move_stock(
        &self,
        request: StockMoveRequest,
        actor: &Actor,
    ) -> EngineResult<Option<StockMovement>> {
        validate_quantity(request.quantity)?;
        if let Some(cost) = request.unit_cost {
            if cost.is_negative() {
                return Err(ValidationError::MustNotBeNegative {
                    field: "unit_cost".to_string(),
                }
                .into());
            }
            if request.direction == StockDirection::Out {
                return Err(
                    ValidationError::inconsistent("unit cost applies to incoming stock").into(),
                );
            }
        }

        let mut tx = self.db.begin().await?;
        let movement = move_stock_in_tx(&mut tx, &request, actor, Utc::now()).await?;
        tx.commit().await?;

        if let Some(movement) = &movement {
            info!(
                product_id = %movement.product_id,
                reason = ?movement.reason,
                quantity = movement.quantity,
                stock = movement.quantity_after,
                average_cost = movement.average_cost_after_cents,
                actor = %actor,
                "Stock movement recorded"
            );
        }
        Ok(movement)
    }

    /// Registers a product. Opening stock is booked as an adjustment so the
    /// ledger explains the starting position.
    pub async fn register_product(
        &self,
        draft: ProductDraft,
        actor: &Actor,
    ) -> EngineResult<Product> {
        draft.validate()?;

        let now = Utc::now();
        let product = Product {
            id: new_id(),
            sku: draft.sku.trim().to_string(),
            name: draft.name.trim().to_string(),
            kind: draft.kind,
            vat_rate_bps: draft.vat_rate.bps(),
            retention_rate_bps: draft.retention_rate.map(|rate| rate.bps()),
            current_stock: 0,
            min_stock: draft.min_stock,
            average_cost_cents: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.begin().await?;
        ProductRepository::new(&mut tx).insert(&product).await?;
        if draft.opening_stock > 0 {
            let opening = StockMoveRequest::new(
                product.id.clone(),
                draft.opening_stock,
                StockDirection::In,
                StockReason::Adjustment,
            )
            .with_unit_cost(draft.opening_cost);
            move_stock_in_tx(&mut tx, &opening, actor, now).await?;
        }
        let product = ProductRepository::new(&mut tx)
            .get(&product.id)
            .await?
            .ok_or_else(|| CoreError::not_found("product", product.id.as_str()))?;
        tx.commit().await?;

        info!(product_id = %product.id, sku = %product.sku, actor = %actor, "Product registered");
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::test_support::{actor, engine};

    async fn goods(engine: &FiscalEngine, stock: i64, cost: i64) -> Product {
        engine
            .register_product(
                ProductDraft::goods("BOLT-M8", "Hex bolt M8", Rate::from_bps(1400))
                    .with_min_stock(2)
                    .with_opening_stock(stock, Money::from_cents(cost)),
                &actor(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_opening_stock_is_booked_in_ledger() {
        let engine = engine().await;
        let product = goods(&engine, 5, 8_000).await;

        assert_eq!(product.current_stock, 5);
        assert_eq!(product.average_cost().cents(), 8_000);

        let ledger = engine.stock_movements(&product.id).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].reason, StockReason::Adjustment);
        assert_eq!(ledger[0].quantity_before, 0);
        assert_eq!(ledger[0].quantity_after, 5);
    }

    #[tokio::test]
    async fn test_purchase_recomputes_weighted_average() {
        let engine = engine().await;
        let product = goods(&engine, 5, 8_000).await;

        let movement = engine
            .move_stock(
                StockMoveRequest::purchase(&product.id, 10, Money::from_cents(10_000))
                    .with_reference("PO-17"),
                &actor(),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(movement.quantity_after, 15);
        assert_eq!(movement.average_cost_before_cents, 8_000);
        assert_eq!(movement.average_cost_after_cents, 9_333);

        let product = engine.product(&product.id).await.unwrap();
        assert_eq!(product.current_stock, 15);
        assert_eq!(product.average_cost().to_string(), "93.33");
    }

    #[tokio::test]
    async fn test_insufficient_stock_changes_nothing() {
        let engine = engine().await;
        let product = goods(&engine, 3, 8_000).await;

        let err = engine
            .move_stock(
                StockMoveRequest::new(&product.id, 5, StockDirection::Out, StockReason::Adjustment),
                &actor(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientStock);

        let product = engine.product(&product.id).await.unwrap();
        assert_eq!(product.current_stock, 3);
        assert_eq!(engine.stock_movements(&product.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_service_is_a_no_op() {
        let engine = engine().await;
        let service = engine
            .register_product(
                ProductDraft::service("INSTALL", "Installation", Rate::from_bps(1400))
                    .with_retention_rate(Rate::from_bps(650)),
                &actor(),
            )
            .await
            .unwrap();

        let movement = engine
            .move_stock(
                StockMoveRequest::new(&service.id, 4, StockDirection::Out, StockReason::Sale),
                &actor(),
            )
            .await
            .unwrap();
        assert!(movement.is_none());
        assert!(engine.stock_movements(&service.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_move_stock_input_errors() {
        let engine = engine().await;
        let err = engine
            .move_stock(
                StockMoveRequest::new("missing", 1, StockDirection::In, StockReason::Purchase),
                &actor(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let err = engine
            .move_stock(
                StockMoveRequest::new("missing", 0, StockDirection::In, StockReason::Purchase),
                &actor(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidDocumentData);

        let err = engine
            .register_product(
                ProductDraft::goods("BOLT", "Bolt", Rate::from_bps(1400))
                    .with_retention_rate(Rate::from_bps(650)),
                &actor(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidDocumentData);
    }

    #[tokio::test]
    async fn test_low_stock_report() {
        let engine = engine().await;
        goods(&engine, 1, 500).await;

        let low = engine.low_stock_products().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].sku, "BOLT-M8");
    }
}
