// src/models/subscription.rs

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "subscription_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "plan_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Monthly,
    Quarterly,
    Yearly,
}

impl PlanType {
    pub fn duration(self) -> Duration {
        match self {
            PlanType::Monthly => Duration::days(30),
            PlanType::Quarterly => Duration::days(90),
            PlanType::Yearly => Duration::days(365),
        }
    }

    /// Price in KES.
    pub fn price(self) -> Decimal {
        match self {
            PlanType::Monthly => Decimal::new(999, 0),
            PlanType::Quarterly => Decimal::new(2_699, 0),
            PlanType::Yearly => Decimal::new(9_999, 0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    #[schema(ignore)]
    pub user_id: String,
    pub plan_type: PlanType,
    pub status: SubscriptionStatus,
    #[schema(example = "999.00")]
    pub amount: Decimal,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[schema(example = "QKX81H2P3L")]
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Status as seen at `now`. Expiry is evaluated lazily, the stored
    /// status stays `active` until something rewrites the row.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SubscriptionStatus {
        match (self.status, self.end_date) {
            (SubscriptionStatus::Active, Some(end)) if end <= now => SubscriptionStatus::Expired,
            (SubscriptionStatus::Active, None) => SubscriptionStatus::Expired,
            (status, _) => status,
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == SubscriptionStatus::Active
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusView {
    pub subscription_id: Uuid,
    pub status: SubscriptionStatus,
    pub transaction_id: Option<String>,
    pub plan_type: PlanType,
    pub end_date: Option<DateTime<Utc>>,
}
