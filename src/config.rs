// src/config.rs

use anyhow::Context;
use axum::extract::FromRef;
use chrono::FixedOffset;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, time::Duration};

use crate::{
    db::{
        AccessRepository, InventoryRepository, PurchaseOrderRepository, SubscriptionRepository,
        TransferRepository, UsageRepository,
    },
    services::{
        access_service::AccessService, auth::AuthService, inventory_service::InventoryService,
        plan_service::PlanService, purchase_order_service::PurchaseOrderService,
        staff_service::StaffService, subscription_service::SubscriptionService,
        transfer_service::TransferService,
    },
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
// East Africa Time
const DEFAULT_TENANT_UTC_OFFSET_HOURS: i32 = 3;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub super_admin_id: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    /// Local reference time for day-bounded usage (daily sales).
    pub tenant_offset: FixedOffset,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let super_admin_id = env::var("SUPER_ADMIN_ID").context("SUPER_ADMIN_ID must be set")?;

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let db_max_connections = match env::var("DB_MAX_CONNECTIONS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("DB_MAX_CONNECTIONS is not a number: {}", raw))?,
            Err(_) => DEFAULT_MAX_CONNECTIONS,
        };

        let offset_hours = match env::var("TENANT_UTC_OFFSET_HOURS") {
            Ok(raw) => raw
                .parse::<i32>()
                .with_context(|| format!("TENANT_UTC_OFFSET_HOURS is not a number: {}", raw))?,
            Err(_) => DEFAULT_TENANT_UTC_OFFSET_HOURS,
        };
        let tenant_offset = FixedOffset::east_opt(offset_hours * 3600)
            .with_context(|| format!("TENANT_UTC_OFFSET_HOURS out of range: {}", offset_hours))?;

        Ok(Self {
            database_url,
            jwt_secret,
            super_admin_id,
            bind_addr,
            db_max_connections,
            tenant_offset,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Config,
    pub auth_service: AuthService,
    pub access_service: AccessService,
    pub plan_service: PlanService,
    pub inventory_service: InventoryService,
    pub transfer_service: TransferService,
    pub purchase_order_service: PurchaseOrderService,
    pub subscription_service: SubscriptionService,
    pub staff_service: StaffService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Failed to connect to the database")?;

        tracing::info!("✅ Database connection established");

        Ok(Self::with_pool(config, db_pool))
    }

    /// Wires the dependency graph on top of an existing pool.
    pub fn with_pool(config: Config, db_pool: PgPool) -> Self {
        // --- Repositories ---
        let access_repo = AccessRepository::new(db_pool.clone());
        let inventory_repo = InventoryRepository::new(db_pool.clone());
        let transfer_repo = TransferRepository::new(db_pool.clone());
        let purchase_order_repo = PurchaseOrderRepository::new(db_pool.clone());
        let subscription_repo = SubscriptionRepository::new(db_pool.clone());
        let usage_repo = UsageRepository::new(db_pool.clone());

        // --- Services ---
        let auth_service = AuthService::new(config.jwt_secret.clone());
        let access_service = AccessService::new(access_repo.clone(), config.super_admin_id.clone());
        let subscription_service = SubscriptionService::new(subscription_repo, db_pool.clone());
        let plan_service = PlanService::new(
            usage_repo,
            subscription_service.clone(),
            config.tenant_offset,
        );
        let inventory_service = InventoryService::new(inventory_repo.clone(), db_pool.clone());
        let transfer_service =
            TransferService::new(transfer_repo, inventory_repo.clone(), db_pool.clone());
        let purchase_order_service =
            PurchaseOrderService::new(purchase_order_repo, inventory_repo, db_pool.clone());
        let staff_service = StaffService::new(
            access_repo,
            plan_service.clone(),
            config.super_admin_id.clone(),
        );

        Self {
            db_pool,
            config,
            auth_service,
            access_service,
            plan_service,
            inventory_service,
            transfer_service,
            purchase_order_service,
            subscription_service,
            staff_service,
        }
    }
}

impl FromRef<AppState> for AccessService {
    fn from_ref(state: &AppState) -> Self {
        state.access_service.clone()
    }
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        state.auth_service.clone()
    }
}
