use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::subscriptions::{SubscriptionEntity, UpsertSubscriptionEntity};

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    /// Inserts or overwrites the row keyed on `stripe_subscription_id`.
    async fn upsert(
        &self,
        upsert_subscription_entity: UpsertSubscriptionEntity,
    ) -> Result<SubscriptionEntity>;

    async fn find_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<SubscriptionEntity>>;

    async fn find_active_by_user(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    async fn mark_canceled(
        &self,
        stripe_subscription_id: &str,
        canceled_at: DateTime<Utc>,
    ) -> Result<usize>;

    async fn set_cancel_at_period_end(
        &self,
        stripe_subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<usize>;
}
