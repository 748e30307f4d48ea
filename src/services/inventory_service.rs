// src/services/inventory_service.rs

use std::collections::HashSet;

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::InventoryRepository,
    models::inventory::{
        AlertType, InitializationFailure, InitializationReport, MovementFilter, MovementType,
        NewMovement, StockAlert, StockAuditDetail, StockLevel, StockLevelFilter, StockMovement,
    },
};

// --- Service inputs ---

#[derive(Debug, Clone)]
pub struct StockAdjustment {
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub quantity: i32,
    pub reason: String,
}

#[derive(Debug, Clone, Copy)]
pub struct InitialStock {
    pub product_id: Uuid,
    pub initial_stock: i32,
    pub reorder_point: i32,
    pub reorder_quantity: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct PhysicalCount {
    pub product_id: Uuid,
    pub physical_stock: i32,
}

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlertGeneration {
    pub created: usize,
    pub alerts: Vec<StockAlert>,
}

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    #[serde(flatten)]
    pub audit: StockAuditDetail,
    pub movements: Vec<StockMovement>,
}

// ---
// Ledger rules
// ---

/// On-hand quantity after applying `quantity` to a level holding
/// `current` units with `reserved` of them reserved.
pub fn apply_adjustment(
    product_id: Uuid,
    current: i32,
    reserved: i32,
    quantity: i32,
) -> Result<i32, AppError> {
    let new_stock = current
        .checked_add(quantity)
        .ok_or_else(|| AppError::invalid("quantity is out of range"))?;

    if new_stock < 0 {
        return Err(AppError::invalid(format!(
            "quantity would leave product {} with negative stock (current {}, change {})",
            product_id, current, quantity
        )));
    }
    if new_stock < reserved {
        return Err(AppError::invalid(format!(
            "quantity would leave product {} below its reserved stock ({} reserved, {} left)",
            product_id, reserved, new_stock
        )));
    }
    Ok(new_stock)
}

/// `physical - system` for one counted line.
pub fn audit_delta(system_stock: i32, physical_stock: i32) -> i32 {
    physical_stock - system_stock
}

/// Levels that need a new low-stock alert, given the product/branch pairs
/// that already have one open.
pub fn alerts_to_raise<'a>(
    levels: &'a [StockLevel],
    already_active: &HashSet<(Uuid, Uuid)>,
) -> Vec<&'a StockLevel> {
    levels
        .iter()
        .filter(|l| l.is_low())
        .filter(|l| !already_active.contains(&(l.product_id, l.branch_id)))
        .collect()
}

fn ensure_unique_products(product_ids: impl IntoIterator<Item = Uuid>) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for product_id in product_ids {
        if !seen.insert(product_id) {
            return Err(AppError::invalid(format!("productId {} appears more than once", product_id)));
        }
    }
    Ok(())
}

pub fn validate_counts(counts: &[PhysicalCount]) -> Result<(), AppError> {
    if counts.is_empty() {
        return Err(AppError::invalid("items must contain at least one count"));
    }
    if let Some(bad) = counts.iter().find(|c| c.physical_stock < 0) {
        return Err(AppError::invalid(format!(
            "physicalStock for product {} cannot be negative",
            bad.product_id
        )));
    }
    ensure_unique_products(counts.iter().map(|c| c.product_id))
}

#[derive(Clone)]
pub struct InventoryService {
    inventory_repo: InventoryRepository,
    pool: PgPool,
}

impl InventoryService {
    pub fn new(inventory_repo: InventoryRepository, pool: PgPool) -> Self {
        Self { inventory_repo, pool }
    }

    // --- READS ---

    pub async fn get_stock_level(
        &self,
        user_id: &str,
        product_id: Uuid,
        branch_id: Uuid,
    ) -> Result<Option<StockLevel>, AppError> {
        self.inventory_repo
            .get_stock_level(&self.pool, user_id, product_id, branch_id)
            .await
    }

    pub async fn get_stock_levels(
        &self,
        user_id: &str,
        branch_id: Option<Uuid>,
        product_ids: Option<Vec<Uuid>>,
    ) -> Result<Vec<StockLevel>, AppError> {
        let filter = StockLevelFilter {
            branch_id,
            product_ids,
            low_stock_only: false,
        };
        self.inventory_repo.list_stock_levels(&self.pool, user_id, &filter).await
    }

    pub async fn list_movements(
        &self,
        user_id: &str,
        filter: &MovementFilter,
    ) -> Result<Vec<StockMovement>, AppError> {
        self.inventory_repo.list_movements(user_id, filter).await
    }

    // --- ADJUST ---

    /// Applies a signed change. The level and the movement are written in
    /// one transaction, a rejected change writes nothing.
    pub async fn adjust_stock(
        &self,
        user_id: &str,
        adjustment: &StockAdjustment,
    ) -> Result<(StockLevel, StockMovement), AppError> {
        if adjustment.quantity == 0 {
            return Err(AppError::invalid("quantity must be a non-zero number"));
        }
        if adjustment.reason.trim().is_empty() {
            return Err(AppError::invalid("reason is required"));
        }

        let mut tx = self.pool.begin().await?;

        // 1. Locks the level
        let level = self
            .inventory_repo
            .get_stock_level_for_update(&mut *tx, user_id, adjustment.product_id, adjustment.branch_id)
            .await?
            .ok_or_else(|| AppError::not_found("Stock level"))?;

        // 2. Checks the resulting balance
        let new_stock = apply_adjustment(
            adjustment.product_id,
            level.current_stock,
            level.reserved_stock,
            adjustment.quantity,
        )?;

        // 3. Writes level + ledger entry
        let updated = self
            .inventory_repo
            .set_stock(&mut *tx, level.id, new_stock, level.reserved_stock)
            .await?;

        let movement = self
            .inventory_repo
            .record_movement(
                &mut *tx,
                user_id,
                &NewMovement {
                    product_id: adjustment.product_id,
                    branch_id: adjustment.branch_id,
                    quantity: adjustment.quantity,
                    movement_type: MovementType::Adjustment,
                    reason: Some(adjustment.reason.trim()),
                    reference_id: None,
                },
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            user_id,
            product_id = %adjustment.product_id,
            branch_id = %adjustment.branch_id,
            quantity = adjustment.quantity,
            new_stock,
            "stock adjusted"
        );
        Ok((updated, movement))
    }

    // --- SALE ---

    pub async fn record_sale(
        &self,
        user_id: &str,
        product_id: Uuid,
        branch_id: Uuid,
        quantity: i32,
    ) -> Result<(StockLevel, StockMovement), AppError> {
        if quantity <= 0 {
            return Err(AppError::invalid("quantity must be greater than zero"));
        }

        let mut tx = self.pool.begin().await?;

        let level = self
            .inventory_repo
            .get_stock_level_for_update(&mut *tx, user_id, product_id, branch_id)
            .await?
            .ok_or_else(|| AppError::not_found("Stock level"))?;

        if level.available() < quantity {
            return Err(AppError::invalid(format!(
                "Insufficient stock for product {}: {} available, {} requested",
                product_id,
                level.available(),
                quantity
            )));
        }

        let updated = self
            .inventory_repo
            .set_stock(&mut *tx, level.id, level.current_stock - quantity, level.reserved_stock)
            .await?;

        let movement = self
            .inventory_repo
            .record_movement(
                &mut *tx,
                user_id,
                &NewMovement {
                    product_id,
                    branch_id,
                    quantity: -quantity,
                    movement_type: MovementType::Sale,
                    reason: Some("sale"),
                    reference_id: None,
                },
            )
            .await?;

        tx.commit().await?;
        Ok((updated, movement))
    }

    // --- INITIALIZATION (bulk) ---

    /// Creates missing levels one by one. A failing item is reported and
    /// the loop moves on.
    pub async fn initialize_inventory(
        &self,
        user_id: &str,
        branch_id: Uuid,
        items: &[InitialStock],
    ) -> Result<InitializationReport, AppError> {
        let mut report = InitializationReport::default();

        for item in items {
            match self.initialize_one(user_id, branch_id, item).await {
                Ok(true) => report.initialized += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(user_id, product_id = %item.product_id, error = %e, "inventory initialization skipped item");
                    report.failed.push(InitializationFailure {
                        product_id: item.product_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            user_id,
            %branch_id,
            initialized = report.initialized,
            skipped = report.skipped,
            failed = report.failed.len(),
            "inventory initialized"
        );
        Ok(report)
    }

    async fn initialize_one(
        &self,
        user_id: &str,
        branch_id: Uuid,
        item: &InitialStock,
    ) -> Result<bool, AppError> {
        if item.initial_stock < 0 || item.reorder_point < 0 || item.reorder_quantity < 0 {
            return Err(AppError::invalid("initialStock, reorderPoint and reorderQuantity cannot be negative"));
        }

        let mut tx = self.pool.begin().await?;

        let created = self
            .inventory_repo
            .insert_stock_level(
                &mut *tx,
                user_id,
                item.product_id,
                branch_id,
                item.initial_stock,
                item.reorder_point,
                item.reorder_quantity,
            )
            .await?;

        let Some(level) = created else {
            return Ok(false);
        };

        if level.current_stock > 0 {
            self.inventory_repo
                .record_movement(
                    &mut *tx,
                    user_id,
                    &NewMovement {
                        product_id: item.product_id,
                        branch_id,
                        quantity: level.current_stock,
                        movement_type: MovementType::Initial,
                        reason: Some("initial stock"),
                        reference_id: None,
                    },
                )
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    // --- ALERTS ---

    /// Flags every level at or below its reorder point. Running it again
    /// without stock changes leaves the active alert set as it was.
    pub async fn generate_low_stock_alerts(
        &self,
        user_id: &str,
        branch_id: Option<Uuid>,
    ) -> Result<AlertGeneration, AppError> {
        let mut tx = self.pool.begin().await?;

        let filter = StockLevelFilter {
            branch_id,
            product_ids: None,
            low_stock_only: true,
        };
        let low_levels = self
            .inventory_repo
            .list_stock_levels(&mut *tx, user_id, &filter)
            .await?;

        let active: HashSet<(Uuid, Uuid)> = self
            .inventory_repo
            .list_active_alerts(&mut *tx, user_id, branch_id, AlertType::LowStock)
            .await?
            .into_iter()
            .map(|a| (a.product_id, a.branch_id))
            .collect();

        let mut created = 0;
        for level in alerts_to_raise(&low_levels, &active) {
            // The partial unique index also guards against a concurrent run
            if self
                .inventory_repo
                .insert_alert_if_absent(&mut *tx, user_id, level, AlertType::LowStock)
                .await?
                .is_some()
            {
                created += 1;
            }
        }

        let alerts = self
            .inventory_repo
            .list_active_alerts(&mut *tx, user_id, branch_id, AlertType::LowStock)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id, created, active = alerts.len(), "low stock alerts generated");
        Ok(AlertGeneration { created, alerts })
    }

    pub async fn acknowledge_alert(
        &self,
        alert_id: Uuid,
        user_id: &str,
        alert_type: &str,
        acknowledged_by: &str,
    ) -> Result<StockAlert, AppError> {
        let alert_type: AlertType = alert_type.parse().map_err(AppError::InvalidInput)?;

        self.inventory_repo
            .resolve_alert(&self.pool, alert_id, user_id, alert_type, acknowledged_by)
            .await?
            .ok_or_else(|| AppError::not_found("Alert"))
    }

    // --- AUDITS ---

    /// Opens an audit and snapshots the system stock it will be counted
    /// against.
    pub async fn start_audit(
        &self,
        user_id: &str,
        started_by: &str,
        branch_id: Uuid,
        product_ids: Option<Vec<Uuid>>,
    ) -> Result<StockAuditDetail, AppError> {
        let mut tx = self.pool.begin().await?;

        let filter = StockLevelFilter {
            branch_id: Some(branch_id),
            product_ids,
            low_stock_only: false,
        };
        let levels = self
            .inventory_repo
            .list_stock_levels(&mut *tx, user_id, &filter)
            .await?;

        if levels.is_empty() {
            return Err(AppError::invalid(format!("branch {} has no stock levels to audit", branch_id)));
        }

        let audit = self
            .inventory_repo
            .create_audit(&mut *tx, user_id, branch_id, started_by)
            .await?;

        let mut items = Vec::with_capacity(levels.len());
        for level in &levels {
            let item = self
                .inventory_repo
                .insert_audit_snapshot(&mut *tx, audit.id, level.product_id, level.current_stock)
                .await?;
            items.push(item);
        }

        tx.commit().await?;

        tracing::info!(user_id, audit_id = %audit.id, %branch_id, items = items.len(), "stock audit started");
        Ok(StockAuditDetail { audit, items })
    }

    /// Sets every counted level to its physical count and writes one
    /// audit-adjustment movement per non-zero difference. Any unknown
    /// product aborts the whole reconciliation.
    ///
    /// Differences are taken against the live level, so sales booked while
    /// the audit was open are not counted twice. Each item keeps its opening
    /// snapshot in `system_stock` and the live value in `reconciled_stock`.
    pub async fn reconcile_audit(
        &self,
        user_id: &str,
        audit_id: Uuid,
        counts: &[PhysicalCount],
    ) -> Result<Reconciliation, AppError> {
        validate_counts(counts)?;

        let mut sorted: Vec<PhysicalCount> = counts.to_vec();
        sorted.sort_by_key(|c| c.product_id);

        let mut tx = self.pool.begin().await?;

        let audit = self
            .inventory_repo
            .get_audit_for_update(&mut *tx, user_id, audit_id)
            .await?
            .ok_or_else(|| AppError::not_found("Audit"))?;

        if audit.status != crate::models::inventory::AuditStatus::Open {
            return Err(AppError::StateConflict("Audit has already been reconciled".into()));
        }

        let mut movements = Vec::new();
        for count in &sorted {
            let level = self
                .inventory_repo
                .get_stock_level_for_update(&mut *tx, user_id, count.product_id, audit.branch_id)
                .await?
                .ok_or_else(|| {
                    AppError::invalid(format!(
                        "Unknown productId {} for branch {}",
                        count.product_id, audit.branch_id
                    ))
                })?;

            let item = self
                .inventory_repo
                .record_audit_count(
                    &mut *tx,
                    audit_id,
                    count.product_id,
                    level.current_stock,
                    count.physical_stock,
                )
                .await?;
            if let Some(drift) = item.drift().filter(|d| *d != 0) {
                tracing::info!(%audit_id, product_id = %count.product_id, drift, "stock moved while audit was open");
            }

            let delta = audit_delta(level.current_stock, count.physical_stock);
            if delta != 0 {
                // Reservations cannot exceed what is physically there
                let reserved = level.reserved_stock.min(count.physical_stock);
                self.inventory_repo
                    .set_stock(&mut *tx, level.id, count.physical_stock, reserved)
                    .await?;

                let movement = self
                    .inventory_repo
                    .record_movement(
                        &mut *tx,
                        user_id,
                        &NewMovement {
                            product_id: count.product_id,
                            branch_id: audit.branch_id,
                            quantity: delta,
                            movement_type: MovementType::AuditAdjustment,
                            reason: Some("stock audit"),
                            reference_id: Some(audit_id),
                        },
                    )
                    .await?;
                movements.push(movement);
            }

        }

        let closed = self.inventory_repo.close_audit(&mut *tx, audit_id).await?;
        let items = self.inventory_repo.list_audit_items(&mut *tx, audit_id).await?;

        tx.commit().await?;

        tracing::info!(user_id, %audit_id, adjustments = movements.len(), "stock audit reconciled");
        Ok(Reconciliation {
            audit: StockAuditDetail { audit: closed, items },
            movements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::inventory::StockAuditItem;
    use chrono::Utc;

    fn level(product_id: Uuid, branch_id: Uuid, current: i32, reorder_point: i32) -> StockLevel {
        StockLevel {
            id: Uuid::new_v4(),
            user_id: "owner-1".into(),
            product_id,
            branch_id,
            current_stock: current,
            reserved_stock: 0,
            reorder_point,
            reorder_quantity: 10,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn adjustment_adds_signed_quantity() {
        let p = Uuid::new_v4();
        assert_eq!(apply_adjustment(p, 10, 0, 5).unwrap(), 15);
        assert_eq!(apply_adjustment(p, 10, 0, -10).unwrap(), 0);
        assert_eq!(apply_adjustment(p, 0, 0, 7).unwrap(), 7);
    }

    #[test]
    fn adjustment_below_zero_is_a_validation_error() {
        // currentStock=3, quantity=-5
        let err = apply_adjustment(Uuid::new_v4(), 3, 0, -5).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(err.to_string().contains("negative stock"));
    }

    #[test]
    fn adjustment_cannot_eat_into_reserved_stock() {
        let err = apply_adjustment(Uuid::new_v4(), 10, 4, -7).unwrap_err();
        assert!(err.to_string().contains("reserved"));
        assert_eq!(apply_adjustment(Uuid::new_v4(), 10, 4, -6).unwrap(), 4);
    }

    #[test]
    fn adjustment_overflow_is_rejected() {
        assert!(apply_adjustment(Uuid::new_v4(), i32::MAX, 0, 1).is_err());
    }

    #[test]
    fn audit_delta_is_physical_minus_system() {
        assert_eq!(audit_delta(10, 7), -3);
        assert_eq!(audit_delta(10, 12), 2);
        assert_eq!(audit_delta(10, 10), 0);
    }

    #[test]
    fn audit_item_keeps_snapshot_next_to_reconciled_stock() {
        // Opened at 10, two sold while open, counted 7
        let item = StockAuditItem {
            audit_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            system_stock: 10,
            physical_stock: Some(7),
            reconciled_stock: Some(8),
        };
        assert_eq!(item.drift(), Some(-2));
        assert_eq!(audit_delta(item.reconciled_stock.unwrap(), 7), -1);

        let uncounted = StockAuditItem {
            physical_stock: None,
            reconciled_stock: None,
            ..item
        };
        assert_eq!(uncounted.drift(), None);
    }

    #[test]
    fn counts_are_validated_before_touching_the_ledger() {
        let p = Uuid::new_v4();
        assert!(validate_counts(&[]).is_err());
        assert!(validate_counts(&[PhysicalCount { product_id: p, physical_stock: -1 }]).is_err());
        assert!(
            validate_counts(&[
                PhysicalCount { product_id: p, physical_stock: 1 },
                PhysicalCount { product_id: p, physical_stock: 2 },
            ])
            .is_err()
        );
        assert!(validate_counts(&[PhysicalCount { product_id: p, physical_stock: 0 }]).is_ok());
    }

    #[test]
    fn low_stock_includes_levels_at_the_reorder_point() {
        let branch = Uuid::new_v4();
        let levels = vec![
            level(Uuid::new_v4(), branch, 5, 5),
            level(Uuid::new_v4(), branch, 4, 5),
            level(Uuid::new_v4(), branch, 6, 5),
        ];
        let raised = alerts_to_raise(&levels, &HashSet::new());
        assert_eq!(raised.len(), 2);
        assert!(raised.iter().all(|l| l.current_stock <= l.reorder_point));
    }

    #[test]
    fn alert_generation_is_idempotent() {
        let branch = Uuid::new_v4();
        let levels = vec![
            level(Uuid::new_v4(), branch, 0, 3),
            level(Uuid::new_v4(), branch, 2, 3),
            level(Uuid::new_v4(), branch, 9, 3),
        ];

        // First run raises alerts for the two low levels
        let mut active = HashSet::new();
        let first = alerts_to_raise(&levels, &active);
        assert_eq!(first.len(), 2);
        active.extend(first.iter().map(|l| (l.product_id, l.branch_id)));

        // Second run without stock changes raises nothing new
        let second = alerts_to_raise(&levels, &active);
        assert!(second.is_empty());
        assert_eq!(active.len(), 2);
    }

    #[test]
    fn alerts_are_keyed_by_product_and_branch() {
        let product = Uuid::new_v4();
        let (b1, b2) = (Uuid::new_v4(), Uuid::new_v4());
        let levels = vec![level(product, b1, 0, 1), level(product, b2, 0, 1)];

        let active: HashSet<_> = [(product, b1)].into_iter().collect();
        let raised = alerts_to_raise(&levels, &active);
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].branch_id, b2);
    }

    // --- Against a real database (fresh schema per test) ---

    fn ledger(pool: &PgPool) -> InventoryService {
        InventoryService::new(InventoryRepository::new(pool.clone()), pool.clone())
    }

    async fn seed(service: &InventoryService, user_id: &str, branch_id: Uuid, product_id: Uuid, stock: i32) {
        let item = InitialStock {
            product_id,
            initial_stock: stock,
            reorder_point: 2,
            reorder_quantity: 10,
        };
        let report = service.initialize_inventory(user_id, branch_id, &[item]).await.unwrap();
        assert_eq!(report.initialized, 1);
    }

    async fn movements_of(service: &InventoryService, user_id: &str, product_id: Uuid) -> Vec<StockMovement> {
        let filter = MovementFilter {
            product_id: Some(product_id),
            limit: 100,
            ..Default::default()
        };
        service.list_movements(user_id, &filter).await.unwrap()
    }

    #[sqlx::test]
    async fn rejected_adjustment_writes_nothing(pool: PgPool) {
        let service = ledger(&pool);
        let (product, branch) = (Uuid::new_v4(), Uuid::new_v4());
        seed(&service, "owner-a", branch, product, 3).await;

        let adjustment = StockAdjustment {
            product_id: product,
            branch_id: branch,
            quantity: -5,
            reason: "sale".into(),
        };
        let err = service.adjust_stock("owner-a", &adjustment).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let level = service.get_stock_level("owner-a", product, branch).await.unwrap().unwrap();
        assert_eq!(level.current_stock, 3);
        let movements = movements_of(&service, "owner-a", product).await;
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].movement_type, MovementType::Initial);
    }

    #[sqlx::test]
    async fn accepted_adjustment_moves_level_and_ledger_together(pool: PgPool) {
        let service = ledger(&pool);
        let (product, branch) = (Uuid::new_v4(), Uuid::new_v4());
        seed(&service, "owner-a", branch, product, 3).await;

        let adjustment = StockAdjustment {
            product_id: product,
            branch_id: branch,
            quantity: 4,
            reason: "found in back room".into(),
        };
        let (level, movement) = service.adjust_stock("owner-a", &adjustment).await.unwrap();
        assert_eq!(level.current_stock, 7);
        assert_eq!(movement.quantity, 4);
        assert_eq!(movement.movement_type, MovementType::Adjustment);
        assert_eq!(movements_of(&service, "owner-a", product).await.len(), 2);
    }

    #[sqlx::test]
    async fn reconciliation_with_an_unknown_product_changes_nothing(pool: PgPool) {
        let service = ledger(&pool);
        let (product, branch) = (Uuid::new_v4(), Uuid::new_v4());
        seed(&service, "owner-a", branch, product, 10).await;
        let audit = service.start_audit("owner-a", "auditor", branch, None).await.unwrap();

        let counts = [
            PhysicalCount { product_id: product, physical_stock: 7 },
            PhysicalCount { product_id: Uuid::new_v4(), physical_stock: 1 },
        ];
        let err = service.reconcile_audit("owner-a", audit.audit.id, &counts).await.unwrap_err();
        assert!(err.to_string().contains("Unknown productId"));

        let level = service.get_stock_level("owner-a", product, branch).await.unwrap().unwrap();
        assert_eq!(level.current_stock, 10);
        assert_eq!(movements_of(&service, "owner-a", product).await.len(), 1);

        // The audit stayed open and can still be reconciled
        let done = service
            .reconcile_audit("owner-a", audit.audit.id, &counts[..1])
            .await
            .unwrap();
        assert_eq!(done.movements.len(), 1);
        assert_eq!(done.movements[0].quantity, -3);
        assert_eq!(done.movements[0].movement_type, MovementType::AuditAdjustment);
        assert_eq!(done.audit.items[0].system_stock, 10);
        assert_eq!(done.audit.items[0].reconciled_stock, Some(10));
        assert_eq!(done.audit.items[0].physical_stock, Some(7));

        let level = service.get_stock_level("owner-a", product, branch).await.unwrap().unwrap();
        assert_eq!(level.current_stock, 7);

        let again = service.reconcile_audit("owner-a", audit.audit.id, &counts[..1]).await.unwrap_err();
        assert!(matches!(again, AppError::StateConflict(_)));
    }

    #[sqlx::test]
    async fn audit_snapshot_survives_sales_made_while_open(pool: PgPool) {
        let service = ledger(&pool);
        let (product, branch) = (Uuid::new_v4(), Uuid::new_v4());
        seed(&service, "owner-a", branch, product, 10).await;
        let audit = service.start_audit("owner-a", "auditor", branch, None).await.unwrap();

        service.record_sale("owner-a", product, branch, 2).await.unwrap();

        let counts = [PhysicalCount { product_id: product, physical_stock: 7 }];
        let done = service.reconcile_audit("owner-a", audit.audit.id, &counts).await.unwrap();
        // Counted against the live 8, not the snapshot of 10
        assert_eq!(done.movements[0].quantity, -1);
        assert_eq!(done.audit.items[0].system_stock, 10);
        assert_eq!(done.audit.items[0].reconciled_stock, Some(8));
    }

    #[sqlx::test]
    async fn other_tenants_see_nothing(pool: PgPool) {
        let service = ledger(&pool);
        let (product, branch) = (Uuid::new_v4(), Uuid::new_v4());
        seed(&service, "owner-a", branch, product, 1).await;

        assert!(service.get_stock_level("owner-b", product, branch).await.unwrap().is_none());
        let adjustment = StockAdjustment {
            product_id: product,
            branch_id: branch,
            quantity: 1,
            reason: "recount".into(),
        };
        assert!(matches!(
            service.adjust_stock("owner-b", &adjustment).await,
            Err(AppError::NotFound(_))
        ));

        let generated = service.generate_low_stock_alerts("owner-a", None).await.unwrap();
        assert_eq!(generated.created, 1);
        let alert_id = generated.alerts[0].id;

        assert!(matches!(
            service.acknowledge_alert(alert_id, "owner-b", "low_stock", "intruder").await,
            Err(AppError::NotFound(_))
        ));
        service
            .acknowledge_alert(alert_id, "owner-a", "low_stock", "manager")
            .await
            .unwrap();
        // Already resolved
        assert!(matches!(
            service.acknowledge_alert(alert_id, "owner-a", "low_stock", "manager").await,
            Err(AppError::NotFound(_))
        ));
    }
}
