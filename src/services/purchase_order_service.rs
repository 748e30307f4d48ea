// src/services/purchase_order_service.rs

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{InventoryRepository, PurchaseOrderRepository},
    models::{
        inventory::{MovementType, NewMovement},
        purchase_order::{
            ApprovalDecision, PurchaseOrder, PurchaseOrderDetail, PurchaseOrderItem,
            PurchaseOrderLine, PurchaseOrderStatus, ReceiptLine,
        },
    },
};

pub fn ensure_transition(
    current: PurchaseOrderStatus,
    next: PurchaseOrderStatus,
) -> Result<(), AppError> {
    if current.can_transition_to(next) {
        Ok(())
    } else {
        Err(AppError::StateConflict(format!(
            "Purchase order is {}, it cannot move to {}",
            current.as_str(),
            next.as_str()
        )))
    }
}

pub fn validate_lines(lines: &[PurchaseOrderLine]) -> Result<(), AppError> {
    if lines.is_empty() {
        return Err(AppError::invalid("items must contain at least one product"));
    }
    let mut seen = HashSet::new();
    for line in lines {
        if line.quantity <= 0 {
            return Err(AppError::invalid(format!(
                "quantity for product {} must be greater than zero",
                line.product_id
            )));
        }
        if line.unit_cost.is_sign_negative() {
            return Err(AppError::invalid(format!(
                "unitCost for product {} cannot be negative",
                line.product_id
            )));
        }
        if !seen.insert(line.product_id) {
            return Err(AppError::invalid(format!("productId {} appears more than once", line.product_id)));
        }
    }
    Ok(())
}

/// Checks a decision before the order is touched. Returns the trimmed
/// rejection reason when the order is being rejected.
pub fn check_decision<'a>(
    order: &PurchaseOrder,
    approver_id: &str,
    decision: &'a ApprovalDecision,
) -> Result<Option<&'a str>, AppError> {
    if order.requested_by == approver_id {
        return Err(AppError::invalid("You cannot approve your own purchase order"));
    }

    let next = if decision.approved {
        PurchaseOrderStatus::Approved
    } else {
        PurchaseOrderStatus::Rejected
    };
    ensure_transition(order.status, next)?;

    if decision.approved {
        return Ok(None);
    }
    match decision.rejection_reason.as_deref().map(str::trim) {
        Some(reason) if !reason.is_empty() => Ok(Some(reason)),
        _ => Err(AppError::invalid("rejectionReason is required when rejecting a purchase order")),
    }
}

/// Lines without a receipt are taken as delivered in full.
pub fn plan_receipt(
    items: &[PurchaseOrderItem],
    receipts: &[(Uuid, i32)],
) -> Result<Vec<ReceiptLine>, AppError> {
    let ordered: HashMap<Uuid, i32> = items
        .iter()
        .map(|i| (i.product_id, i.quantity_ordered))
        .collect();
    let mut received: HashMap<Uuid, i32> = HashMap::new();

    for &(product_id, qty) in receipts {
        let Some(&ordered_qty) = ordered.get(&product_id) else {
            return Err(AppError::invalid(format!(
                "productId {} is not part of this purchase order",
                product_id
            )));
        };
        if qty < 0 {
            return Err(AppError::invalid(format!(
                "quantityReceived for product {} cannot be negative",
                product_id
            )));
        }
        if qty > ordered_qty {
            return Err(AppError::invalid(format!(
                "quantityReceived for product {} exceeds the ordered {}",
                product_id, ordered_qty
            )));
        }
        if received.insert(product_id, qty).is_some() {
            return Err(AppError::invalid(format!("productId {} appears more than once", product_id)));
        }
    }

    Ok(items
        .iter()
        .map(|i| {
            let qty = received.get(&i.product_id).copied().unwrap_or(i.quantity_ordered);
            ReceiptLine {
                product_id: i.product_id,
                quantity_ordered: i.quantity_ordered,
                quantity_received: qty,
                shortfall: i.quantity_ordered - qty,
            }
        })
        .collect())
}

#[derive(Clone)]
pub struct PurchaseOrderService {
    repo: PurchaseOrderRepository,
    inventory_repo: InventoryRepository,
    pool: PgPool,
}

impl PurchaseOrderService {
    pub fn new(repo: PurchaseOrderRepository, inventory_repo: InventoryRepository, pool: PgPool) -> Self {
        Self {
            repo,
            inventory_repo,
            pool,
        }
    }

    pub async fn create_purchase_order(
        &self,
        user_id: &str,
        requested_by: &str,
        supplier_id: Uuid,
        branch_id: Uuid,
        notes: Option<&str>,
        lines: &[PurchaseOrderLine],
    ) -> Result<PurchaseOrderDetail, AppError> {
        validate_lines(lines)?;

        let mut tx = self.pool.begin().await?;

        let order = self
            .repo
            .create(&mut *tx, user_id, supplier_id, branch_id, requested_by, notes)
            .await?;
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            items.push(
                self.repo
                    .add_item(&mut *tx, order.id, line.product_id, line.quantity, line.unit_cost)
                    .await?,
            );
        }

        tx.commit().await?;

        tracing::info!(user_id, purchase_order_id = %order.id, "purchase order drafted");
        Ok(PurchaseOrderDetail { order, items })
    }

    pub async fn get_purchase_order(&self, user_id: &str, po_id: Uuid) -> Result<PurchaseOrderDetail, AppError> {
        let order = self
            .repo
            .find(&self.pool, user_id, po_id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase order"))?;
        let items = self.repo.list_items(&self.pool, po_id).await?;
        Ok(PurchaseOrderDetail { order, items })
    }

    pub async fn list_purchase_orders(
        &self,
        user_id: &str,
        status: Option<PurchaseOrderStatus>,
    ) -> Result<Vec<PurchaseOrder>, AppError> {
        self.repo.list(user_id, status).await
    }

    pub async fn submit_purchase_order(&self, po_id: Uuid, user_id: &str) -> Result<PurchaseOrder, AppError> {
        let mut tx = self.pool.begin().await?;

        let order = self
            .repo
            .find_for_update(&mut *tx, user_id, po_id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase order"))?;
        ensure_transition(order.status, PurchaseOrderStatus::Pending)?;

        let order = self
            .repo
            .mark_pending(&mut *tx, user_id, po_id)
            .await?
            .ok_or_else(|| AppError::StateConflict("Purchase order is no longer DRAFT".into()))?;

        tx.commit().await?;
        tracing::info!(user_id, purchase_order_id = %po_id, "purchase order submitted");
        Ok(order)
    }

    /// `approver_id` is the acting user, who must differ from the requester.
    pub async fn approve_purchase_order(
        &self,
        po_id: Uuid,
        user_id: &str,
        approver_id: &str,
        decision: &ApprovalDecision,
    ) -> Result<PurchaseOrder, AppError> {
        let mut tx = self.pool.begin().await?;

        let order = self
            .repo
            .find_for_update(&mut *tx, user_id, po_id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase order"))?;
        let rejection_reason = check_decision(&order, approver_id, decision)?;

        let order = self
            .repo
            .record_decision(
                &mut *tx,
                user_id,
                po_id,
                decision.approved,
                approver_id,
                rejection_reason,
                decision.notes.as_deref(),
            )
            .await?
            .ok_or_else(|| AppError::StateConflict("Purchase order is no longer PENDING".into()))?;

        tx.commit().await?;

        if decision.approved {
            tracing::info!(user_id, purchase_order_id = %po_id, "purchase order approved");
        } else {
            tracing::info!(user_id, purchase_order_id = %po_id, "purchase order rejected");
        }
        Ok(order)
    }

    pub async fn send_purchase_order(
        &self,
        po_id: Uuid,
        user_id: &str,
        sent_at: Option<DateTime<Utc>>,
        supplier_notes: Option<&str>,
    ) -> Result<PurchaseOrder, AppError> {
        let mut tx = self.pool.begin().await?;

        let order = self
            .repo
            .find_for_update(&mut *tx, user_id, po_id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase order"))?;
        ensure_transition(order.status, PurchaseOrderStatus::Sent)?;

        let order = self
            .repo
            .mark_sent(
                &mut *tx,
                user_id,
                po_id,
                sent_at.unwrap_or_else(Utc::now),
                supplier_notes,
            )
            .await?
            .ok_or_else(|| AppError::StateConflict("Purchase order is no longer APPROVED".into()))?;

        tx.commit().await?;
        tracing::info!(user_id, purchase_order_id = %po_id, "purchase order sent");
        Ok(order)
    }

    /// Books the delivered quantities into the order's branch and closes it.
    pub async fn receive_purchase_order(
        &self,
        po_id: Uuid,
        user_id: &str,
        receipts: &[(Uuid, i32)],
    ) -> Result<(PurchaseOrder, Vec<ReceiptLine>), AppError> {
        let mut tx = self.pool.begin().await?;

        let order = self
            .repo
            .find_for_update(&mut *tx, user_id, po_id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase order"))?;
        ensure_transition(order.status, PurchaseOrderStatus::Received)?;

        let items = self.repo.list_items(&mut *tx, po_id).await?;
        let lines = plan_receipt(&items, receipts)?;

        for line in &lines {
            if line.quantity_received > 0 {
                self.inventory_repo
                    .increment_stock(&mut *tx, user_id, line.product_id, order.branch_id, line.quantity_received)
                    .await?;
                self.inventory_repo
                    .record_movement(
                        &mut *tx,
                        user_id,
                        &NewMovement {
                            product_id: line.product_id,
                            branch_id: order.branch_id,
                            quantity: line.quantity_received,
                            movement_type: MovementType::PurchaseReceipt,
                            reason: Some("purchase order received"),
                            reference_id: Some(po_id),
                        },
                    )
                    .await?;
            }
            self.repo
                .set_received_qty(&mut *tx, po_id, line.product_id, line.quantity_received)
                .await?;
        }

        let order = self
            .repo
            .mark_received(&mut *tx, user_id, po_id)
            .await?
            .ok_or_else(|| AppError::StateConflict("Purchase order is no longer SENT".into()))?;

        tx.commit().await?;

        let shortfall: i32 = lines.iter().map(|l| l.shortfall).sum();
        tracing::info!(user_id, purchase_order_id = %po_id, shortfall, "purchase order received");
        Ok((order, lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn order(requested_by: &str, status: PurchaseOrderStatus) -> PurchaseOrder {
        let now = Utc::now();
        PurchaseOrder {
            id: Uuid::new_v4(),
            user_id: "tenant-1".into(),
            supplier_id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            requested_by: requested_by.into(),
            approved_by: None,
            status,
            rejection_reason: None,
            notes: None,
            supplier_notes: None,
            sent_at: None,
            received_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn approve() -> ApprovalDecision {
        ApprovalDecision {
            approved: true,
            rejection_reason: None,
            notes: None,
        }
    }

    fn reject(reason: Option<&str>) -> ApprovalDecision {
        ApprovalDecision {
            approved: false,
            rejection_reason: reason.map(String::from),
            notes: None,
        }
    }

    fn item(product_id: Uuid, ordered: i32) -> PurchaseOrderItem {
        PurchaseOrderItem {
            purchase_order_id: Uuid::nil(),
            product_id,
            quantity_ordered: ordered,
            quantity_received: None,
            unit_cost: Decimal::new(25000, 2),
        }
    }

    #[test]
    fn requester_can_never_approve_own_order() {
        let po = order("staff-7", PurchaseOrderStatus::Pending);
        let err = check_decision(&po, "staff-7", &approve()).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(err.to_string().contains("cannot approve your own purchase order"));

        // rejecting your own order is also a decision, so it fails the same way
        assert!(check_decision(&po, "staff-7", &reject(Some("too pricey"))).is_err());
    }

    #[test]
    fn a_different_user_can_approve_a_pending_order() {
        let po = order("staff-7", PurchaseOrderStatus::Pending);
        assert_eq!(check_decision(&po, "owner-1", &approve()).unwrap(), None);
    }

    #[test]
    fn rejection_needs_a_trimmed_reason() {
        let po = order("staff-7", PurchaseOrderStatus::Pending);
        assert!(check_decision(&po, "owner-1", &reject(None)).is_err());
        assert!(check_decision(&po, "owner-1", &reject(Some("   "))).is_err());
        let decision = reject(Some("  supplier out of stock "));
        assert_eq!(
            check_decision(&po, "owner-1", &decision).unwrap(),
            Some("supplier out of stock")
        );
    }

    #[test]
    fn decisions_only_apply_to_pending_orders() {
        for status in [
            PurchaseOrderStatus::Draft,
            PurchaseOrderStatus::Approved,
            PurchaseOrderStatus::Rejected,
            PurchaseOrderStatus::Sent,
            PurchaseOrderStatus::Received,
        ] {
            let po = order("staff-7", status);
            let err = check_decision(&po, "owner-1", &approve()).unwrap_err();
            assert!(matches!(err, AppError::StateConflict(_)), "{:?}", status);
        }
    }

    #[test]
    fn only_approved_orders_are_sent() {
        assert!(ensure_transition(PurchaseOrderStatus::Approved, PurchaseOrderStatus::Sent).is_ok());
        assert!(ensure_transition(PurchaseOrderStatus::Pending, PurchaseOrderStatus::Sent).is_err());
        assert!(ensure_transition(PurchaseOrderStatus::Rejected, PurchaseOrderStatus::Sent).is_err());
        assert!(ensure_transition(PurchaseOrderStatus::Sent, PurchaseOrderStatus::Received).is_ok());
        assert!(ensure_transition(PurchaseOrderStatus::Approved, PurchaseOrderStatus::Received).is_err());
    }

    #[test]
    fn draft_lines_are_validated() {
        let p = Uuid::new_v4();
        let line = |quantity, cost| PurchaseOrderLine {
            product_id: p,
            quantity,
            unit_cost: Decimal::new(cost, 0),
        };
        assert!(validate_lines(&[]).is_err());
        assert!(validate_lines(&[line(0, 10)]).is_err());
        assert!(validate_lines(&[line(5, -1)]).is_err());
        assert!(validate_lines(&[line(5, 10), line(2, 10)]).is_err());
        assert!(validate_lines(&[line(5, 0)]).is_ok());
    }

    #[test]
    fn receipt_reconciles_each_line() {
        let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
        let items = vec![item(p1, 100), item(p2, 40)];

        let lines = plan_receipt(&items, &[(p1, 90)]).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].quantity_received, 90);
        assert_eq!(lines[0].shortfall, 10);
        assert_eq!(lines[1].quantity_received, 40);
        assert_eq!(lines[1].shortfall, 0);
    }

    #[test]
    fn receipt_rejects_unknown_negative_or_excess_lines() {
        let p = Uuid::new_v4();
        let items = vec![item(p, 10)];
        assert!(plan_receipt(&items, &[(Uuid::new_v4(), 1)]).is_err());
        assert!(plan_receipt(&items, &[(p, -1)]).is_err());
        assert!(plan_receipt(&items, &[(p, 11)]).is_err());
        assert!(plan_receipt(&items, &[(p, 0)]).is_ok());
    }

    // --- Against a real database (fresh schema per test) ---

    fn orders(pool: &PgPool) -> (PurchaseOrderService, InventoryRepository) {
        let inventory = InventoryRepository::new(pool.clone());
        let service = PurchaseOrderService::new(PurchaseOrderRepository::new(pool.clone()), inventory.clone(), pool.clone());
        (service, inventory)
    }

    async fn pending_order(service: &PurchaseOrderService, branch: Uuid, product: Uuid) -> Uuid {
        let lines = [PurchaseOrderLine {
            product_id: product,
            quantity: 10,
            unit_cost: Decimal::new(250, 0),
        }];
        let detail = service
            .create_purchase_order("owner-a", "clerk", Uuid::new_v4(), branch, None, &lines)
            .await
            .unwrap();
        service.submit_purchase_order(detail.order.id, "owner-a").await.unwrap();
        detail.order.id
    }

    #[sqlx::test]
    async fn received_order_is_booked_into_the_branch(pool: PgPool) {
        let (service, inventory) = orders(&pool);
        let (branch, product) = (Uuid::new_v4(), Uuid::new_v4());
        let po = pending_order(&service, branch, product).await;

        let self_approval = service.approve_purchase_order(po, "owner-a", "clerk", &approve()).await;
        assert!(matches!(self_approval, Err(AppError::InvalidInput(_))));

        service.approve_purchase_order(po, "owner-a", "manager", &approve()).await.unwrap();
        service.send_purchase_order(po, "owner-a", None, Some("deliver by Friday")).await.unwrap();

        let (order, lines) = service.receive_purchase_order(po, "owner-a", &[(product, 9)]).await.unwrap();
        assert_eq!(order.status, PurchaseOrderStatus::Received);
        assert_eq!(lines[0].shortfall, 1);

        let level = inventory
            .get_stock_level(&pool, "owner-a", product, branch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(level.current_stock, 9);
    }

    #[sqlx::test]
    async fn over_receipt_leaves_the_order_sent(pool: PgPool) {
        let (service, inventory) = orders(&pool);
        let (branch, product) = (Uuid::new_v4(), Uuid::new_v4());
        let po = pending_order(&service, branch, product).await;
        service.approve_purchase_order(po, "owner-a", "manager", &approve()).await.unwrap();
        service.send_purchase_order(po, "owner-a", None, None).await.unwrap();

        assert!(service.receive_purchase_order(po, "owner-a", &[(product, 11)]).await.is_err());

        let detail = service.get_purchase_order("owner-a", po).await.unwrap();
        assert_eq!(detail.order.status, PurchaseOrderStatus::Sent);
        assert!(inventory
            .get_stock_level(&pool, "owner-a", product, branch)
            .await
            .unwrap()
            .is_none());
    }

    #[sqlx::test]
    async fn sending_requires_an_approved_order(pool: PgPool) {
        let (service, _) = orders(&pool);
        let po = pending_order(&service, Uuid::new_v4(), Uuid::new_v4()).await;

        let err = service.send_purchase_order(po, "owner-a", None, None).await;
        assert!(matches!(err, Err(AppError::StateConflict(_))));
    }

    #[sqlx::test]
    async fn other_tenants_get_not_found(pool: PgPool) {
        let (service, _) = orders(&pool);
        let po = pending_order(&service, Uuid::new_v4(), Uuid::new_v4()).await;

        assert!(matches!(
            service.get_purchase_order("owner-b", po).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.approve_purchase_order(po, "owner-b", "intruder", &approve()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
