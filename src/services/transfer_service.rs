// src/services/transfer_service.rs

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{InventoryRepository, TransferRepository},
    models::{
        inventory::{MovementType, NewMovement},
        transfer::{
            BranchTransfer, ShipmentDetails, TransferDetail, TransferItem, TransferLine,
            TransferStatus,
        },
    },
};

// =============================================================================
//  WORKFLOW RULES
// =============================================================================

pub fn ensure_transition(current: TransferStatus, next: TransferStatus) -> Result<(), AppError> {
    if current.can_transition_to(next) {
        Ok(())
    } else {
        Err(AppError::StateConflict(format!(
            "Transfer is {}, it cannot move to {}",
            current.as_str(),
            next.as_str()
        )))
    }
}

pub fn validate_request(
    source_branch_id: Uuid,
    dest_branch_id: Uuid,
    lines: &[TransferLine],
) -> Result<(), AppError> {
    if source_branch_id == dest_branch_id {
        return Err(AppError::invalid("sourceBranchId and destBranchId must differ"));
    }
    if lines.is_empty() {
        return Err(AppError::invalid("items must contain at least one product"));
    }
    let mut seen = HashSet::new();
    for line in lines {
        if line.quantity <= 0 {
            return Err(AppError::invalid(format!(
                "requestedQuantity for product {} must be greater than zero",
                line.product_id
            )));
        }
        if !seen.insert(line.product_id) {
            return Err(AppError::invalid(format!("productId {} appears more than once", line.product_id)));
        }
    }
    Ok(())
}

/// Approved quantity per transfer line. Lines without an approval are
/// approved at zero.
pub fn plan_approval(items: &[TransferItem], approvals: &[TransferLine]) -> Result<Vec<(Uuid, i32)>, AppError> {
    if approvals.is_empty() {
        return Err(AppError::invalid("approvals must contain at least one item"));
    }

    let requested: HashMap<Uuid, i32> = items.iter().map(|i| (i.product_id, i.requested_qty)).collect();
    let mut approved: HashMap<Uuid, i32> = HashMap::new();

    for approval in approvals {
        let Some(&requested_qty) = requested.get(&approval.product_id) else {
            return Err(AppError::invalid(format!(
                "productId {} is not part of this transfer",
                approval.product_id
            )));
        };
        if approval.quantity < 0 {
            return Err(AppError::invalid(format!(
                "approvedQuantity for product {} cannot be negative",
                approval.product_id
            )));
        }
        if approval.quantity > requested_qty {
            return Err(AppError::invalid(format!(
                "approvedQuantity for product {} exceeds the requested {}",
                approval.product_id, requested_qty
            )));
        }
        if approved.insert(approval.product_id, approval.quantity).is_some() {
            return Err(AppError::invalid(format!(
                "productId {} appears more than once",
                approval.product_id
            )));
        }
    }

    Ok(items
        .iter()
        .map(|i| (i.product_id, approved.get(&i.product_id).copied().unwrap_or(0)))
        .collect())
}

/// Accepts an RFC 3339 timestamp or a plain `YYYY-MM-DD` date (start of
/// day, UTC). The result must lie strictly after `now`.
pub fn parse_estimated_arrival(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
    let raw = raw.trim();
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN).and_utc())
        })
        .map_err(|_| AppError::invalid("estimatedArrival must be a valid date"))?;

    if parsed <= now {
        return Err(AppError::invalid("estimatedArrival must be in the future"));
    }
    Ok(parsed)
}

/// Received quantity per line. Lines without a receipt are taken as fully
/// received. A line can come up short but never exceed what was shipped.
pub fn plan_receipt(items: &[TransferItem], receipts: &[TransferLine]) -> Result<Vec<(Uuid, i32)>, AppError> {
    let shipped: HashMap<Uuid, i32> = items
        .iter()
        .map(|i| (i.product_id, i.shipped_qty.unwrap_or(0)))
        .collect();
    let mut received: HashMap<Uuid, i32> = HashMap::new();

    for receipt in receipts {
        let Some(&shipped_qty) = shipped.get(&receipt.product_id) else {
            return Err(AppError::invalid(format!(
                "productId {} is not part of this transfer",
                receipt.product_id
            )));
        };
        if receipt.quantity < 0 {
            return Err(AppError::invalid(format!(
                "receivedQuantity for product {} cannot be negative",
                receipt.product_id
            )));
        }
        if receipt.quantity > shipped_qty {
            return Err(AppError::invalid(format!(
                "receivedQuantity for product {} exceeds the shipped {}",
                receipt.product_id, shipped_qty
            )));
        }
        if received.insert(receipt.product_id, receipt.quantity).is_some() {
            return Err(AppError::invalid(format!(
                "productId {} appears more than once",
                receipt.product_id
            )));
        }
    }

    Ok(items
        .iter()
        .map(|i| {
            let full = i.shipped_qty.unwrap_or(0);
            (i.product_id, received.get(&i.product_id).copied().unwrap_or(full))
        })
        .collect())
}

// =============================================================================
//  SERVICE
// =============================================================================

#[derive(Clone)]
pub struct TransferService {
    repo: TransferRepository,
    inventory_repo: InventoryRepository,
    pool: PgPool,
}

impl TransferService {
    pub fn new(repo: TransferRepository, inventory_repo: InventoryRepository, pool: PgPool) -> Self {
        Self {
            repo,
            inventory_repo,
            pool,
        }
    }

    pub async fn request_transfer(
        &self,
        user_id: &str,
        requested_by: &str,
        source_branch_id: Uuid,
        dest_branch_id: Uuid,
        lines: &[TransferLine],
    ) -> Result<TransferDetail, AppError> {
        validate_request(source_branch_id, dest_branch_id, lines)?;

        let mut tx = self.pool.begin().await?;

        let transfer = self
            .repo
            .create(&mut *tx, user_id, source_branch_id, dest_branch_id, requested_by)
            .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            items.push(self.repo.add_item(&mut *tx, transfer.id, line.product_id, line.quantity).await?);
        }

        tx.commit().await?;

        tracing::info!(user_id, transfer_id = %transfer.id, "transfer requested");
        Ok(TransferDetail { transfer, items })
    }

    pub async fn get_transfer(&self, user_id: &str, transfer_id: Uuid) -> Result<TransferDetail, AppError> {
        let transfer = self
            .repo
            .find(&self.pool, user_id, transfer_id)
            .await?
            .ok_or_else(|| AppError::not_found("Transfer"))?;
        let items = self.repo.list_items(&self.pool, transfer_id).await?;
        Ok(TransferDetail { transfer, items })
    }

    pub async fn list_transfers(
        &self,
        user_id: &str,
        status: Option<TransferStatus>,
    ) -> Result<Vec<BranchTransfer>, AppError> {
        self.repo.list(user_id, status).await
    }

    // --- REQUESTED -> APPROVED ---

    pub async fn approve_transfer(
        &self,
        transfer_id: Uuid,
        user_id: &str,
        approved_by: &str,
        approvals: &[TransferLine],
    ) -> Result<TransferDetail, AppError> {
        let mut tx = self.pool.begin().await?;

        let transfer = self
            .repo
            .find_for_update(&mut *tx, user_id, transfer_id)
            .await?
            .ok_or_else(|| AppError::not_found("Transfer"))?;
        ensure_transition(transfer.status, TransferStatus::Approved)?;

        let items = self.repo.list_items(&mut *tx, transfer_id).await?;
        let plan = plan_approval(&items, approvals)?;

        for (product_id, qty) in &plan {
            self.repo.set_approved_qty(&mut *tx, transfer_id, *product_id, *qty).await?;
        }

        let transfer = self
            .repo
            .mark_approved(&mut *tx, user_id, transfer_id, approved_by)
            .await?
            .ok_or_else(|| AppError::StateConflict("Transfer is no longer REQUESTED".into()))?;
        let items = self.repo.list_items(&mut *tx, transfer_id).await?;

        tx.commit().await?;

        tracing::info!(user_id, %transfer_id, "transfer approved");
        Ok(TransferDetail { transfer, items })
    }

    // --- REQUESTED | APPROVED -> REJECTED ---

    pub async fn reject_transfer(
        &self,
        transfer_id: Uuid,
        user_id: &str,
        reason: &str,
    ) -> Result<BranchTransfer, AppError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::invalid("rejectionReason is required"));
        }

        let mut tx = self.pool.begin().await?;

        let transfer = self
            .repo
            .find_for_update(&mut *tx, user_id, transfer_id)
            .await?
            .ok_or_else(|| AppError::not_found("Transfer"))?;
        ensure_transition(transfer.status, TransferStatus::Rejected)?;

        let transfer = self
            .repo
            .mark_rejected(&mut *tx, user_id, transfer_id, reason)
            .await?
            .ok_or_else(|| AppError::StateConflict("Transfer can no longer be rejected".into()))?;

        tx.commit().await?;

        tracing::info!(user_id, %transfer_id, "transfer rejected");
        Ok(transfer)
    }

    // --- APPROVED -> SHIPPED ---

    /// Stock leaves the source branch here, not on approval.
    pub async fn ship_transfer(
        &self,
        transfer_id: Uuid,
        user_id: &str,
        shipment: &ShipmentDetails,
    ) -> Result<TransferDetail, AppError> {
        if shipment.shipped_by.trim().is_empty() {
            return Err(AppError::invalid("shippedBy is required"));
        }
        let estimated_arrival = shipment
            .estimated_arrival
            .as_deref()
            .map(|raw| parse_estimated_arrival(raw, Utc::now()))
            .transpose()?;

        let mut tx = self.pool.begin().await?;

        let transfer = self
            .repo
            .find_for_update(&mut *tx, user_id, transfer_id)
            .await?
            .ok_or_else(|| AppError::not_found("Transfer"))?;
        ensure_transition(transfer.status, TransferStatus::Shipped)?;

        // Items come back ordered by product, so levels are locked in a stable order
        let items = self.repo.list_items(&mut *tx, transfer_id).await?;

        for item in &items {
            let qty = item.approved_qty.unwrap_or(0);
            if qty > 0 {
                let level = self
                    .inventory_repo
                    .get_stock_level_for_update(&mut *tx, user_id, item.product_id, transfer.source_branch_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::invalid(format!(
                            "Product {} has no stock at the source branch",
                            item.product_id
                        ))
                    })?;

                if level.available() < qty {
                    return Err(AppError::invalid(format!(
                        "Insufficient stock for product {} at the source branch: {} available, {} to ship",
                        item.product_id,
                        level.available(),
                        qty
                    )));
                }

                self.inventory_repo
                    .set_stock(&mut *tx, level.id, level.current_stock - qty, level.reserved_stock)
                    .await?;
                self.inventory_repo
                    .record_movement(
                        &mut *tx,
                        user_id,
                        &NewMovement {
                            product_id: item.product_id,
                            branch_id: transfer.source_branch_id,
                            quantity: -qty,
                            movement_type: MovementType::TransferOut,
                            reason: Some("branch transfer shipped"),
                            reference_id: Some(transfer_id),
                        },
                    )
                    .await?;
            }
            self.repo.set_shipped_qty(&mut *tx, transfer_id, item.product_id, qty).await?;
        }

        let transfer = self
            .repo
            .mark_shipped(
                &mut *tx,
                user_id,
                transfer_id,
                shipment.shipped_by.trim(),
                shipment.tracking_number.as_deref(),
                estimated_arrival,
            )
            .await?
            .ok_or_else(|| AppError::StateConflict("Transfer is no longer APPROVED".into()))?;
        let items = self.repo.list_items(&mut *tx, transfer_id).await?;

        tx.commit().await?;

        tracing::info!(user_id, %transfer_id, "transfer shipped");
        Ok(TransferDetail { transfer, items })
    }

    // --- SHIPPED -> RECEIVED ---

    /// Shortfalls are recorded on the line and do not block completion.
    pub async fn receive_transfer(
        &self,
        transfer_id: Uuid,
        user_id: &str,
        received_by: &str,
        receipts: &[TransferLine],
    ) -> Result<TransferDetail, AppError> {
        let mut tx = self.pool.begin().await?;

        let transfer = self
            .repo
            .find_for_update(&mut *tx, user_id, transfer_id)
            .await?
            .ok_or_else(|| AppError::not_found("Transfer"))?;
        ensure_transition(transfer.status, TransferStatus::Received)?;

        let items = self.repo.list_items(&mut *tx, transfer_id).await?;
        let plan = plan_receipt(&items, receipts)?;

        for (product_id, qty) in &plan {
            if *qty > 0 {
                self.inventory_repo
                    .increment_stock(&mut *tx, user_id, *product_id, transfer.dest_branch_id, *qty)
                    .await?;
                self.inventory_repo
                    .record_movement(
                        &mut *tx,
                        user_id,
                        &NewMovement {
                            product_id: *product_id,
                            branch_id: transfer.dest_branch_id,
                            quantity: *qty,
                            movement_type: MovementType::TransferIn,
                            reason: Some("branch transfer received"),
                            reference_id: Some(transfer_id),
                        },
                    )
                    .await?;
            }
            self.repo.set_received_qty(&mut *tx, transfer_id, *product_id, *qty).await?;
        }

        let transfer = self
            .repo
            .mark_received(&mut *tx, user_id, transfer_id, received_by)
            .await?
            .ok_or_else(|| AppError::StateConflict("Transfer is no longer SHIPPED".into()))?;
        let items = self.repo.list_items(&mut *tx, transfer_id).await?;

        tx.commit().await?;

        let shortfall: i32 = items.iter().map(TransferItem::discrepancy).sum();
        if shortfall > 0 {
            tracing::warn!(user_id, %transfer_id, shortfall, "transfer received with discrepancies");
        } else {
            tracing::info!(user_id, %transfer_id, "transfer received");
        }
        Ok(TransferDetail { transfer, items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn item(product_id: Uuid, requested: i32, approved: Option<i32>, shipped: Option<i32>) -> TransferItem {
        TransferItem {
            transfer_id: Uuid::nil(),
            product_id,
            requested_qty: requested,
            approved_qty: approved,
            shipped_qty: shipped,
            received_qty: None,
        }
    }

    fn line(product_id: Uuid, quantity: i32) -> TransferLine {
        TransferLine { product_id, quantity }
    }

    #[test]
    fn workflow_only_moves_forward() {
        use TransferStatus::*;
        let all = [Requested, Approved, Shipped, Received, Rejected];

        let allowed: Vec<(TransferStatus, TransferStatus)> = all
            .iter()
            .flat_map(|&from| all.iter().map(move |&to| (from, to)))
            .filter(|(from, to)| from.can_transition_to(*to))
            .collect();

        assert_eq!(
            allowed,
            vec![
                (Requested, Approved),
                (Requested, Rejected),
                (Approved, Shipped),
                (Approved, Rejected),
                (Shipped, Received),
            ]
        );
    }

    #[test]
    fn no_stage_can_be_skipped() {
        assert!(ensure_transition(TransferStatus::Requested, TransferStatus::Shipped).is_err());
        assert!(ensure_transition(TransferStatus::Requested, TransferStatus::Received).is_err());
        assert!(ensure_transition(TransferStatus::Approved, TransferStatus::Received).is_err());
        assert!(ensure_transition(TransferStatus::Shipped, TransferStatus::Rejected).is_err());
    }

    #[test]
    fn terminal_states_go_nowhere() {
        for terminal in [TransferStatus::Received, TransferStatus::Rejected] {
            assert!(terminal.is_terminal());
            for next in [
                TransferStatus::Requested,
                TransferStatus::Approved,
                TransferStatus::Shipped,
                TransferStatus::Received,
                TransferStatus::Rejected,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn state_conflict_names_both_states() {
        let err = ensure_transition(TransferStatus::Shipped, TransferStatus::Approved).unwrap_err();
        assert!(matches!(err, AppError::StateConflict(_)));
        assert_eq!(err.to_string(), "Transfer is SHIPPED, it cannot move to APPROVED");
    }

    #[test]
    fn request_rejects_same_branch_and_bad_lines() {
        let (a, b, p) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        assert!(validate_request(a, a, &[line(p, 1)]).is_err());
        assert!(validate_request(a, b, &[]).is_err());
        assert!(validate_request(a, b, &[line(p, 0)]).is_err());
        assert!(validate_request(a, b, &[line(p, 1), line(p, 2)]).is_err());
        assert!(validate_request(a, b, &[line(p, 3)]).is_ok());
    }

    #[test]
    fn partial_approval_per_line() {
        let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
        let items = vec![item(p1, 10, None, None), item(p2, 4, None, None)];

        let plan = plan_approval(&items, &[line(p1, 6), line(p2, 4)]).unwrap();
        assert_eq!(plan, vec![(p1, 6), (p2, 4)]);
        for ((_, approved), i) in plan.iter().zip(&items) {
            assert!(*approved <= i.requested_qty);
        }
    }

    #[test]
    fn unlisted_lines_are_approved_at_zero() {
        let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
        let items = vec![item(p1, 10, None, None), item(p2, 4, None, None)];
        let plan = plan_approval(&items, &[line(p1, 10)]).unwrap();
        assert_eq!(plan, vec![(p1, 10), (p2, 0)]);
    }

    #[test]
    fn approval_above_requested_or_negative_fails() {
        let p = Uuid::new_v4();
        let items = vec![item(p, 5, None, None)];
        assert!(plan_approval(&items, &[line(p, 6)]).is_err());
        assert!(plan_approval(&items, &[line(p, -1)]).is_err());
        assert!(plan_approval(&items, &[line(Uuid::new_v4(), 1)]).is_err());
        assert!(plan_approval(&items, &[]).is_err());
        assert!(plan_approval(&items, &[line(p, 0)]).is_ok());
    }

    #[test]
    fn estimated_arrival_yesterday_is_rejected() {
        let now = Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap();
        let err = parse_estimated_arrival("2026-05-09", now).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(err.to_string().contains("must be in the future"));
    }

    #[test]
    fn estimated_arrival_must_be_strictly_after_now() {
        let now = Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap();
        assert!(parse_estimated_arrival("2026-05-10T12:00:00Z", now).is_err());
        assert_eq!(
            parse_estimated_arrival("2026-05-10T12:00:01Z", now).unwrap(),
            now + Duration::seconds(1)
        );
        assert_eq!(
            parse_estimated_arrival("2026-05-12", now).unwrap(),
            Utc.with_ymd_and_hms(2026, 5, 12, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_estimated_arrival("2026-05-11T09:00:00+03:00", now).unwrap(),
            Utc.with_ymd_and_hms(2026, 5, 11, 6, 0, 0).unwrap()
        );
    }

    #[test]
    fn estimated_arrival_garbage_is_invalid() {
        let err = parse_estimated_arrival("next tuesday", Utc::now()).unwrap_err();
        assert!(err.to_string().contains("valid date"));
    }

    #[test]
    fn receipt_defaults_to_shipped_and_allows_shortfall() {
        let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
        let items = vec![item(p1, 10, Some(8), Some(8)), item(p2, 5, Some(5), Some(5))];

        let plan = plan_receipt(&items, &[line(p1, 6)]).unwrap();
        assert_eq!(plan, vec![(p1, 6), (p2, 5)]);

        let plan = plan_receipt(&items, &[]).unwrap();
        assert_eq!(plan, vec![(p1, 8), (p2, 5)]);
    }

    #[test]
    fn receipt_cannot_exceed_shipped_or_be_negative() {
        let p = Uuid::new_v4();
        let items = vec![item(p, 10, Some(8), Some(8))];
        assert!(plan_receipt(&items, &[line(p, 9)]).is_err());
        assert!(plan_receipt(&items, &[line(p, -1)]).is_err());
        assert!(plan_receipt(&items, &[line(Uuid::new_v4(), 1)]).is_err());
    }

    #[test]
    fn units_are_conserved_across_ship_and_receive() {
        // source 20, ship 8, receive 6 -> 2 stay in transit as the recorded shortfall
        let p = Uuid::new_v4();
        let source_before = 20;
        let mut line_item = item(p, 10, Some(8), Some(8));

        let source_after = source_before - line_item.shipped_qty.unwrap();
        assert_eq!(source_after + line_item.in_transit(), source_before);

        let received = plan_receipt(std::slice::from_ref(&line_item), &[line(p, 6)]).unwrap()[0].1;
        line_item.received_qty = Some(received);
        let dest_after = received;

        assert_eq!(line_item.in_transit(), 2);
        assert_eq!(line_item.discrepancy(), 2);
        assert_eq!(source_after + dest_after + line_item.in_transit(), source_before);
    }

    // --- Against a real database (fresh schema per test) ---

    struct Fixture {
        transfers: TransferService,
        inventory: InventoryRepository,
        source: Uuid,
        dest: Uuid,
        product: Uuid,
    }

    async fn fixture(pool: &PgPool, source_stock: i32) -> Fixture {
        let inventory = InventoryRepository::new(pool.clone());
        let transfers = TransferService::new(TransferRepository::new(pool.clone()), inventory.clone(), pool.clone());
        let (source, dest, product) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        inventory
            .insert_stock_level(pool, "owner-a", product, source, source_stock, 0, 0)
            .await
            .unwrap();
        Fixture {
            transfers,
            inventory,
            source,
            dest,
            product,
        }
    }

    async fn stock_at(f: &Fixture, pool: &PgPool, branch: Uuid) -> i32 {
        f.inventory
            .get_stock_level(pool, "owner-a", f.product, branch)
            .await
            .unwrap()
            .map_or(0, |l| l.current_stock)
    }

    async fn requested(f: &Fixture, qty: i32) -> Uuid {
        f.transfers
            .request_transfer("owner-a", "clerk", f.source, f.dest, &[line(f.product, qty)])
            .await
            .unwrap()
            .transfer
            .id
    }

    fn shipment() -> ShipmentDetails {
        ShipmentDetails {
            shipped_by: "Juma".into(),
            tracking_number: None,
            estimated_arrival: None,
        }
    }

    #[sqlx::test]
    async fn stock_leaves_on_ship_and_arrives_on_receive(pool: PgPool) {
        let f = fixture(&pool, 20).await;
        let id = requested(&f, 10).await;

        f.transfers.approve_transfer(id, "owner-a", "manager", &[line(f.product, 8)]).await.unwrap();
        // Approval alone moves nothing
        assert_eq!(stock_at(&f, &pool, f.source).await, 20);

        let shipped = f.transfers.ship_transfer(id, "owner-a", &shipment()).await.unwrap();
        assert_eq!(shipped.transfer.status, TransferStatus::Shipped);
        assert_eq!(stock_at(&f, &pool, f.source).await, 12);
        assert_eq!(stock_at(&f, &pool, f.dest).await, 0);

        let received = f
            .transfers
            .receive_transfer(id, "owner-a", "storekeeper", &[line(f.product, 6)])
            .await
            .unwrap();
        assert_eq!(received.transfer.status, TransferStatus::Received);
        assert_eq!(stock_at(&f, &pool, f.dest).await, 6);

        let in_transit: i32 = received.items.iter().map(TransferItem::in_transit).sum();
        assert_eq!(in_transit, 2);
        assert_eq!(
            stock_at(&f, &pool, f.source).await + stock_at(&f, &pool, f.dest).await + in_transit,
            20
        );
    }

    #[sqlx::test]
    async fn shipping_more_than_available_rolls_back(pool: PgPool) {
        let f = fixture(&pool, 5).await;
        let id = requested(&f, 10).await;
        f.transfers.approve_transfer(id, "owner-a", "manager", &[line(f.product, 8)]).await.unwrap();

        let err = f.transfers.ship_transfer(id, "owner-a", &shipment()).await.unwrap_err();
        assert!(err.to_string().contains("Insufficient stock"));
        assert_eq!(stock_at(&f, &pool, f.source).await, 5);

        let detail = f.transfers.get_transfer("owner-a", id).await.unwrap();
        assert_eq!(detail.transfer.status, TransferStatus::Approved);
        assert_eq!(detail.items[0].shipped_qty, None);
    }

    #[sqlx::test]
    async fn concurrent_approvals_let_exactly_one_through(pool: PgPool) {
        let f = fixture(&pool, 20).await;
        let id = requested(&f, 10).await;
        let approvals = [line(f.product, 5)];

        let (first, second) = tokio::join!(
            f.transfers.approve_transfer(id, "owner-a", "manager-1", &approvals),
            f.transfers.approve_transfer(id, "owner-a", "manager-2", &approvals),
        );
        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(AppError::StateConflict(_)))));
    }

    #[sqlx::test]
    async fn status_write_expects_the_previous_status(pool: PgPool) {
        let f = fixture(&pool, 20).await;
        let id = requested(&f, 10).await;
        f.transfers.approve_transfer(id, "owner-a", "manager", &[line(f.product, 5)]).await.unwrap();

        // A writer that read REQUESTED before the approval landed
        let repo = TransferRepository::new(pool.clone());
        let stale = repo.mark_approved(&pool, "owner-a", id, "late-manager").await.unwrap();
        assert!(stale.is_none());

        let err = f.transfers.approve_transfer(id, "owner-a", "late-manager", &[line(f.product, 5)]).await;
        assert!(matches!(err, Err(AppError::StateConflict(_))));
    }

    #[sqlx::test]
    async fn other_tenants_get_not_found(pool: PgPool) {
        let f = fixture(&pool, 20).await;
        let id = requested(&f, 10).await;

        assert!(matches!(
            f.transfers.get_transfer("owner-b", id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            f.transfers.approve_transfer(id, "owner-b", "intruder", &[line(f.product, 10)]).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            f.transfers.reject_transfer(id, "owner-b", "not mine").await,
            Err(AppError::NotFound(_))
        ));
        assert!(f.transfers.list_transfers("owner-b", None).await.unwrap().is_empty());
    }
}
