// src/docs.rs

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::OpenApi;

use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Health / Access ---
        handlers::access::health,
        handlers::access::get_my_access,
        handlers::access::check_plan,

        // --- Stock ---
        handlers::stock::adjust_stock,
        handlers::stock::record_sale,
        handlers::stock::get_stock_levels,
        handlers::stock::get_stock_level,
        handlers::stock::list_movements,

        // --- Inventory ---
        handlers::inventory::initialize_inventory,
        handlers::inventory::generate_alerts,
        handlers::inventory::acknowledge_alert,
        handlers::inventory::start_audit,
        handlers::inventory::reconcile_audit,

        // --- Transfers ---
        handlers::transfers::request_transfer,
        handlers::transfers::list_transfers,
        handlers::transfers::get_transfer,
        handlers::transfers::approve_transfer,
        handlers::transfers::reject_transfer,
        handlers::transfers::ship_transfer,
        handlers::transfers::receive_transfer,

        // --- Purchase orders ---
        handlers::purchase_orders::create_purchase_order,
        handlers::purchase_orders::list_purchase_orders,
        handlers::purchase_orders::get_purchase_order,
        handlers::purchase_orders::submit_purchase_order,
        handlers::purchase_orders::approve_purchase_order,
        handlers::purchase_orders::send_purchase_order,
        handlers::purchase_orders::receive_purchase_order,

        // --- Subscriptions ---
        handlers::subscriptions::create_subscription,
        handlers::subscriptions::activate_subscription,
        handlers::subscriptions::cancel_subscription,
        handlers::subscriptions::payment_status,

        // --- Staff ---
        handlers::staff::create_staff_member,
        handlers::staff::set_staff_status,
        handlers::staff::accept_invitation,
    ),
    components(
        schemas(
            // --- Access / Plan ---
            models::access::Role,
            models::access::AccessResolution,
            models::access::StaffStatus,
            models::access::StaffMember,
            models::plan::PlanTier,
            models::plan::Feature,
            models::plan::AccessCheck,

            // --- Inventory ---
            models::inventory::StockLevel,
            models::inventory::MovementType,
            models::inventory::StockMovement,
            models::inventory::AlertType,
            models::inventory::AlertStatus,
            models::inventory::StockAlert,
            models::inventory::AuditStatus,
            models::inventory::StockAudit,
            models::inventory::StockAuditItem,
            models::inventory::StockAuditDetail,
            models::inventory::InitializationReport,
            models::inventory::InitializationFailure,
            services::inventory_service::AlertGeneration,
            services::inventory_service::Reconciliation,

            // --- Transfers ---
            models::transfer::TransferStatus,
            models::transfer::BranchTransfer,
            models::transfer::TransferItem,
            models::transfer::TransferDetail,

            // --- Purchase orders ---
            models::purchase_order::PurchaseOrderStatus,
            models::purchase_order::PurchaseOrder,
            models::purchase_order::PurchaseOrderItem,
            models::purchase_order::PurchaseOrderDetail,
            models::purchase_order::ReceiptLine,

            // --- Subscriptions ---
            models::subscription::SubscriptionStatus,
            models::subscription::PlanType,
            models::subscription::Subscription,
            models::subscription::SubscriptionStatusView,

            // --- Payloads ---
            handlers::stock::AdjustStockPayload,
            handlers::stock::RecordSalePayload,
            handlers::inventory::InitialStockItem,
            handlers::inventory::InitializeInventoryPayload,
            handlers::inventory::GenerateAlertsPayload,
            handlers::inventory::AcknowledgeAlertPayload,
            handlers::inventory::StartAuditPayload,
            handlers::inventory::PhysicalCountItem,
            handlers::inventory::ReconcileAuditPayload,
            handlers::transfers::RequestedItem,
            handlers::transfers::RequestTransferPayload,
            handlers::transfers::ApprovalItem,
            handlers::transfers::ApproveTransferPayload,
            handlers::transfers::RejectTransferPayload,
            handlers::transfers::ShipTransferPayload,
            handlers::transfers::ReceiptItem,
            handlers::transfers::ReceiveTransferPayload,
            handlers::purchase_orders::OrderLinePayload,
            handlers::purchase_orders::CreatePurchaseOrderPayload,
            handlers::purchase_orders::ApprovePurchaseOrderPayload,
            handlers::purchase_orders::SendPurchaseOrderPayload,
            handlers::purchase_orders::ReceivedLinePayload,
            handlers::purchase_orders::ReceivePurchaseOrderPayload,
            handlers::subscriptions::CreateSubscriptionPayload,
            handlers::subscriptions::ActivateSubscriptionPayload,
            handlers::staff::CreateStaffPayload,
            handlers::staff::SetStaffStatusPayload,
        )
    ),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Access", description = "Caller role, permissions and plan limits"),
        (name = "Stock", description = "Per-branch stock ledger"),
        (name = "Inventory", description = "Bulk setup, low stock alerts and physical audits"),
        (name = "Transfers", description = "Stock movement between branches"),
        (name = "Purchase Orders", description = "Supplier orders from draft to receipt"),
        (name = "Subscriptions", description = "Pro plan billing"),
        (name = "Staff", description = "Staff accounts and their permissions")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme("api_jwt", SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)));
    }
}
