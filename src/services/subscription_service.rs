// src/services/subscription_service.rs

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::SubscriptionRepository,
    models::subscription::{PlanType, Subscription, SubscriptionStatus, SubscriptionStatusView},
};

/// Checks that a subscription in `current` may be activated.
pub fn ensure_activatable(current: SubscriptionStatus) -> Result<(), AppError> {
    match current {
        SubscriptionStatus::Pending => Ok(()),
        SubscriptionStatus::Active => Err(AppError::AlreadyActive),
        other => Err(AppError::InvalidState(format!(
            "Subscription cannot be activated from status '{:?}'",
            other
        ))),
    }
}

/// Start and end of a subscription activated at `now`. Time left on the
/// subscriptions it replaces is carried over, so the new end is counted
/// from the latest end still in the future.
pub fn activation_window(
    plan_type: PlanType,
    now: DateTime<Utc>,
    superseded: &[Subscription],
) -> (DateTime<Utc>, DateTime<Utc>) {
    let from = superseded
        .iter()
        .filter_map(|s| s.end_date)
        .filter(|end| *end > now)
        .max()
        .unwrap_or(now);
    (now, from + plan_type.duration())
}

#[derive(Clone)]
pub struct SubscriptionService {
    repo: SubscriptionRepository,
    pool: PgPool,
}

impl SubscriptionService {
    pub fn new(repo: SubscriptionRepository, pool: PgPool) -> Self {
        Self { repo, pool }
    }

    /// Checkout: a pending record priced from the plan table.
    pub async fn create_subscription(
        &self,
        user_id: &str,
        plan_type: PlanType,
    ) -> Result<Subscription, AppError> {
        let subscription = self.repo.create_pending(user_id, plan_type, plan_type.price()).await?;
        tracing::info!(subscription_id = %subscription.id, user_id, ?plan_type, "subscription created");
        Ok(subscription)
    }

    pub async fn activate_subscription(
        &self,
        subscription_id: Uuid,
        transaction_id: &str,
    ) -> Result<Subscription, AppError> {
        if transaction_id.trim().is_empty() {
            return Err(AppError::invalid("transactionId is required"));
        }

        let mut tx = self.pool.begin().await?;

        let current = self
            .repo
            .find_for_update(&mut *tx, subscription_id)
            .await?
            .ok_or_else(|| AppError::not_found("Subscription"))?;

        ensure_activatable(current.status)?;

        // One active subscription per user: the ones it replaces are closed
        let superseded = self
            .repo
            .supersede_active(&mut *tx, &current.user_id, subscription_id)
            .await?;

        let (start, end) = activation_window(current.plan_type, Utc::now(), &superseded);
        let activated = self
            .repo
            .activate(&mut *tx, subscription_id, transaction_id.trim(), start, end)
            .await?
            .ok_or_else(|| AppError::InvalidState("Subscription is no longer pending".into()))?;

        tx.commit().await?;

        tracing::info!(
            %subscription_id,
            user_id = %activated.user_id,
            superseded = superseded.len(),
            "subscription activated"
        );
        Ok(activated)
    }

    pub async fn cancel_subscription(
        &self,
        subscription_id: Uuid,
        user_id: &str,
    ) -> Result<Subscription, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = self
            .repo
            .find_for_update(&mut *tx, subscription_id)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| AppError::not_found("Subscription"))?;

        if !matches!(current.status, SubscriptionStatus::Pending | SubscriptionStatus::Active) {
            return Err(AppError::InvalidState(format!(
                "Subscription cannot be cancelled from status '{:?}'",
                current.status
            )));
        }

        let cancelled = self
            .repo
            .cancel(&mut *tx, subscription_id)
            .await?
            .ok_or_else(|| AppError::InvalidState("Subscription changed concurrently".into()))?;

        tx.commit().await?;

        tracing::info!(%subscription_id, user_id, "subscription cancelled");
        Ok(cancelled)
    }

    /// Status lookup used by the payment status endpoint. `user_id` limits
    /// the lookup to the caller's own records unless `None` (super-admin).
    pub async fn get_status(
        &self,
        subscription_id: Uuid,
        user_id: Option<&str>,
    ) -> Result<SubscriptionStatusView, AppError> {
        let subscription = self
            .repo
            .find(subscription_id)
            .await?
            .filter(|s| user_id.is_none_or(|uid| s.user_id == uid))
            .ok_or_else(|| AppError::not_found("Subscription"))?;

        Ok(SubscriptionStatusView {
            subscription_id: subscription.id,
            status: subscription.effective_status(Utc::now()),
            transaction_id: subscription.transaction_id,
            plan_type: subscription.plan_type,
            end_date: subscription.end_date,
        })
    }

    /// The subscription currently granting access, with lapsed ones
    /// filtered out at read time.
    pub async fn find_active_for_user(&self, user_id: &str) -> Result<Option<Subscription>, AppError> {
        let latest = self.repo.find_latest_active(user_id).await?;
        Ok(latest.filter(|s| s.is_active_at(Utc::now())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;

    fn subscription(status: SubscriptionStatus, end_date: Option<DateTime<Utc>>) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: Uuid::new_v4(),
            user_id: "owner-1".into(),
            plan_type: PlanType::Monthly,
            status,
            amount: Decimal::new(999, 0),
            start_date: end_date.map(|e| e - Duration::days(30)),
            end_date,
            transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn only_pending_can_be_activated() {
        assert!(ensure_activatable(SubscriptionStatus::Pending).is_ok());
        assert!(matches!(
            ensure_activatable(SubscriptionStatus::Active),
            Err(AppError::AlreadyActive)
        ));
        assert!(matches!(
            ensure_activatable(SubscriptionStatus::Expired),
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            ensure_activatable(SubscriptionStatus::Cancelled),
            Err(AppError::InvalidState(_))
        ));
    }

    #[test]
    fn activation_window_uses_plan_duration() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let (start, end) = activation_window(PlanType::Quarterly, now, &[]);
        assert_eq!(start, now);
        assert_eq!(end - start, Duration::days(90));
        assert!(end > now);
    }

    #[test]
    fn activation_carries_over_time_left_on_the_replaced_subscription() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let running = subscription(SubscriptionStatus::Active, Some(now + Duration::days(10)));
        let lapsed = subscription(SubscriptionStatus::Active, Some(now - Duration::days(3)));

        let (start, end) = activation_window(PlanType::Yearly, now, &[lapsed.clone(), running]);
        assert_eq!(start, now);
        assert_eq!(end, now + Duration::days(375));

        // Nothing left to carry
        let (_, end) = activation_window(PlanType::Monthly, now, &[lapsed]);
        assert_eq!(end, now + Duration::days(30));
    }

    #[test]
    fn expiry_is_evaluated_lazily_at_read_time() {
        let now = Utc::now();
        let lapsed = subscription(SubscriptionStatus::Active, Some(now - Duration::minutes(1)));
        assert_eq!(lapsed.status, SubscriptionStatus::Active);
        assert_eq!(lapsed.effective_status(now), SubscriptionStatus::Expired);
        assert!(!lapsed.is_active_at(now));

        let running = subscription(SubscriptionStatus::Active, Some(now + Duration::days(3)));
        assert!(running.is_active_at(now));
    }

    #[test]
    fn end_date_equal_to_now_counts_as_expired() {
        let now = Utc::now();
        let edge = subscription(SubscriptionStatus::Active, Some(now));
        assert_eq!(edge.effective_status(now), SubscriptionStatus::Expired);
    }

    #[test]
    fn non_active_statuses_pass_through() {
        let now = Utc::now();
        assert_eq!(
            subscription(SubscriptionStatus::Pending, None).effective_status(now),
            SubscriptionStatus::Pending
        );
        assert_eq!(
            subscription(SubscriptionStatus::Cancelled, Some(now + Duration::days(1))).effective_status(now),
            SubscriptionStatus::Cancelled
        );
    }

    // --- Against a real database (fresh schema per test) ---

    #[sqlx::test]
    async fn second_activation_replaces_the_first(pool: PgPool) {
        let service = SubscriptionService::new(SubscriptionRepository::new(pool.clone()), pool.clone());

        let monthly = service.create_subscription("owner-a", PlanType::Monthly).await.unwrap();
        let yearly = service.create_subscription("owner-a", PlanType::Yearly).await.unwrap();

        let first = service.activate_subscription(monthly.id, "MPESA-1").await.unwrap();
        let second = service.activate_subscription(yearly.id, "MPESA-2").await.unwrap();

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM subscriptions WHERE user_id = $1 AND status = 'active'",
        )
        .bind("owner-a")
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(active, 1);

        let replaced = service.get_status(monthly.id, Some("owner-a")).await.unwrap();
        assert_eq!(replaced.status, SubscriptionStatus::Expired);

        // The unused month is carried into the yearly plan
        let first_end = first.end_date.unwrap();
        assert_eq!(second.end_date.unwrap(), first_end + Duration::days(365));

        let current = service.find_active_for_user("owner-a").await.unwrap().unwrap();
        assert_eq!(current.id, yearly.id);
    }

    #[sqlx::test]
    async fn activating_twice_reports_already_active(pool: PgPool) {
        let service = SubscriptionService::new(SubscriptionRepository::new(pool.clone()), pool.clone());
        let monthly = service.create_subscription("owner-a", PlanType::Monthly).await.unwrap();

        service.activate_subscription(monthly.id, "MPESA-1").await.unwrap();
        assert!(matches!(
            service.activate_subscription(monthly.id, "MPESA-1").await,
            Err(AppError::AlreadyActive)
        ));
    }
}
