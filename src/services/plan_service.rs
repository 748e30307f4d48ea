// src/services/plan_service.rs

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};

use crate::{
    common::error::AppError,
    db::UsageRepository,
    models::plan::{AccessCheck, Feature, LimitValue, PlanTier},
    services::subscription_service::SubscriptionService,
};

/// Caps for each tier. Free numbers are fixed, pro is unbounded.
pub fn limit_for(tier: PlanTier, feature: Feature) -> LimitValue {
    match (tier, feature) {
        (PlanTier::Free, Feature::Branches) => LimitValue::Count(0),
        (PlanTier::Free, Feature::Staff) => LimitValue::Count(0),
        (PlanTier::Free, Feature::Products) => LimitValue::Count(50),
        (PlanTier::Free, Feature::Suppliers) => LimitValue::Count(5),
        (PlanTier::Free, Feature::Debtors) => LimitValue::Count(10),
        (PlanTier::Free, Feature::DailySales) => LimitValue::Count(20),
        (PlanTier::Free, Feature::Reports) => LimitValue::Flag(false),
        (PlanTier::Pro, Feature::Reports) => LimitValue::Flag(true),
        (PlanTier::Pro, _) => LimitValue::Unlimited,
    }
}

/// Read-only check, the caller decides whether to block.
pub fn check_access(feature: Feature, tier: PlanTier, current_usage: u64) -> AccessCheck {
    let limit = limit_for(tier, feature);
    let allowed = match limit {
        LimitValue::Count(max) => current_usage < u64::from(max),
        LimitValue::Unlimited => true,
        LimitValue::Flag(enabled) => enabled,
    };

    AccessCheck {
        feature,
        tier,
        allowed,
        limit,
        current_usage,
    }
}

/// `[start, end)` of the calendar day containing `now` in the tenant's
/// reference time, expressed in UTC.
pub fn local_day_bounds(now: DateTime<Utc>, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_midnight = now.with_timezone(&offset).date_naive().and_time(NaiveTime::MIN);
    let start = (local_midnight - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc();
    (start, start + Duration::days(1))
}

#[derive(Clone)]
pub struct PlanService {
    usage_repo: UsageRepository,
    subscriptions: SubscriptionService,
    offset: FixedOffset,
}

impl PlanService {
    pub fn new(
        usage_repo: UsageRepository,
        subscriptions: SubscriptionService,
        offset: FixedOffset,
    ) -> Self {
        Self {
            usage_repo,
            subscriptions,
            offset,
        }
    }

    pub async fn tier_for(&self, user_id: &str) -> Result<PlanTier, AppError> {
        let active = self.subscriptions.find_active_for_user(user_id).await?;
        Ok(if active.is_some() { PlanTier::Pro } else { PlanTier::Free })
    }

    /// Usage is recomputed on every call, nothing is cached between checks.
    pub async fn current_usage(&self, user_id: &str, feature: Feature) -> Result<u64, AppError> {
        match feature {
            Feature::Reports => Ok(0),
            Feature::DailySales => {
                let (from, to) = local_day_bounds(Utc::now(), self.offset);
                self.usage_repo.count_sales_between(user_id, from, to).await
            }
            countable => self.usage_repo.count(user_id, countable).await,
        }
    }

    pub async fn check_feature(&self, user_id: &str, feature: Feature) -> Result<AccessCheck, AppError> {
        let tier = self.tier_for(user_id).await?;

        // Pro never needs the count for countable features, but we still
        // report it so the client can show usage.
        let usage = self.current_usage(user_id, feature).await?;
        Ok(check_access(feature, tier, usage))
    }

    /// Blocks the caller's action when the plan does not allow it.
    pub async fn ensure_allowed(&self, user_id: &str, feature: Feature) -> Result<AccessCheck, AppError> {
        let check = self.check_feature(user_id, feature).await?;
        if !check.allowed {
            return Err(AppError::Forbidden(upgrade_message(&check)));
        }
        Ok(check)
    }
}

fn upgrade_message(check: &AccessCheck) -> String {
    match check.limit {
        LimitValue::Count(max) => format!(
            "The {:?} plan allows {} {:?} (currently {}). Upgrade to Pro to add more.",
            check.tier, max, check.feature, check.current_usage
        ),
        _ => format!("{:?} is not available on the {:?} plan.", check.feature, check.tier),
    }
}
