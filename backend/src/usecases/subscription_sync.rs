use std::sync::Arc;

use axum::http::StatusCode;
use crates::domain::{
    entities::users::UserEntity,
    repositories::{subscriptions::SubscriptionRepository, users::UserRepository},
    value_objects::{plans::PriceCatalog, subscriptions::SyncReport},
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    axum_http::error_responses::ApiError,
    usecases::{
        gateways::PaymentGateway,
        webhook_reconciler::{WebhookError, mirror_subscription},
    },
};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Failed to reach Stripe")]
    Stripe(#[source] anyhow::Error),
    #[error("Failed to sync subscription")]
    Internal(#[from] anyhow::Error),
}

impl ApiError for SyncError {
    fn status_code(&self) -> StatusCode {
        match self {
            SyncError::Validation(_) => StatusCode::BAD_REQUEST,
            SyncError::NotFound(_) => StatusCode::NOT_FOUND,
            SyncError::Stripe(_) => StatusCode::BAD_GATEWAY,
            SyncError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            SyncError::Validation(_) => "VALIDATION_ERROR",
            SyncError::NotFound(_) => "NOT_FOUND",
            SyncError::Stripe(_) => "STRIPE_ERROR",
            SyncError::Internal(_) => "SYNC_ERROR",
        }
    }
}

/// Pulls authoritative subscription state from Stripe and overwrites local records.
pub struct SubscriptionSyncUseCase<U, S, P>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PaymentGateway + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    subscription_repo: Arc<S>,
    payment_gateway: Arc<P>,
    prices: PriceCatalog,
}

impl<U, S, P> SubscriptionSyncUseCase<U, S, P>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        subscription_repo: Arc<S>,
        payment_gateway: Arc<P>,
        prices: PriceCatalog,
    ) -> Self {
        Self {
            user_repo,
            subscription_repo,
            payment_gateway,
            prices,
        }
    }

    pub async fn sync_user_by_id(&self, user_id: Uuid) -> Result<SyncReport, SyncError> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "sync: failed to load user");
                SyncError::Internal(err)
            })?
            .ok_or_else(|| SyncError::NotFound("User not found".to_string()))?;

        self.sync_user(&user).await
    }

    pub async fn sync_user_by_email(&self, email: &str) -> Result<SyncReport, SyncError> {
        let user = self
            .user_repo
            .find_by_email(email)
            .await
            .map_err(|err| {
                error!(email, db_error = ?err, "sync: failed to load user by email");
                SyncError::Internal(err)
            })?
            .ok_or_else(|| SyncError::NotFound(format!("No user with email {}", email)))?;

        self.sync_user(&user).await
    }

    /// Every user that has ever reached Stripe checkout.
    pub async fn list_syncable_users(&self) -> Result<Vec<UserEntity>, SyncError> {
        self.user_repo
            .list_with_stripe_customer()
            .await
            .map_err(|err| {
                error!(db_error = ?err, "sync: failed to list users with a customer id");
                SyncError::Internal(err)
            })
    }

    pub async fn sync_user(&self, user: &UserEntity) -> Result<SyncReport, SyncError> {
        let user_id = user.id;
        let Some(customer_id) = user.stripe_customer_id.as_deref() else {
            return Err(SyncError::Validation("No Stripe customer found".to_string()));
        };

        let subscriptions = self
            .payment_gateway
            .list_active_subscriptions(customer_id, 1)
            .await
            .map_err(|err| {
                error!(%user_id, customer_id, error = ?err, "sync: failed to list Stripe subscriptions");
                SyncError::Stripe(err)
            })?;

        let Some(subscription) = subscriptions.into_iter().next() else {
            info!(%user_id, customer_id, "sync: no active subscription at Stripe");
            return Err(SyncError::NotFound(
                "No active subscription found in Stripe".to_string(),
            ));
        };

        let price_id = subscription.price_id().unwrap_or_default();
        let Some(plan) = self.prices.plan_for_price(price_id) else {
            warn!(%user_id, subscription_id = %subscription.id, price_id, "sync: unknown price");
            return Err(SyncError::Validation(format!(
                "Unknown price {} on subscription {}",
                price_id, subscription.id
            )));
        };

        let (row, mut changeset) =
            mirror_subscription(user_id, plan, &subscription).map_err(|err| match err {
                WebhookError::InvalidPayload(message) => SyncError::Validation(message),
                other => SyncError::Internal(anyhow::anyhow!(other.to_string())),
            })?;
        changeset.stripe_customer_id = Some(customer_id.to_string());

        let report = SyncReport {
            subscription_id: row.stripe_subscription_id.clone(),
            plan: row.plan.clone(),
            status: row.status.clone(),
            current_period_end: row.current_period_end,
            cancel_at_period_end: row.cancel_at_period_end,
        };

        self.user_repo
            .apply_subscription_changes(user_id, changeset)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "sync: failed to overwrite user subscription");
                SyncError::Internal(err)
            })?;

        self.subscription_repo.upsert(row).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "sync: failed to upsert subscription row");
            SyncError::Internal(err)
        })?;

        info!(
            %user_id,
            subscription_id = %report.subscription_id,
            plan = %report.plan,
            status = %report.status,
            "sync: subscription synced"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::{gateways::MockPaymentGateway, users::fixtures};
    use crates::{
        domain::{
            entities::subscriptions::SubscriptionEntity,
            repositories::{
                subscriptions::MockSubscriptionRepository, users::MockUserRepository,
            },
        },
        payments::stripe_client::StripeSubscription,
    };
    use serde_json::json;

    fn prices() -> PriceCatalog {
        PriceCatalog::new(
            "price_basic".to_string(),
            "price_creator".to_string(),
            "price_team".to_string(),
        )
    }

    fn stripe_subscription(price_id: &str) -> StripeSubscription {
        serde_json::from_value(json!({
            "id": "sub_live",
            "customer": "cus_42",
            "status": "active",
            "cancel_at_period_end": true,
            "current_period_start": 1_740_787_200,
            "current_period_end": 1_743_465_600,
            "items": { "data": [{ "price": { "id": price_id, "unit_amount": 900 } }] }
        }))
        .unwrap()
    }

    fn customer(user_id: Uuid) -> UserEntity {
        let mut user = fixtures::user(user_id);
        user.stripe_customer_id = Some("cus_42".to_string());
        user
    }

    #[tokio::test]
    async fn user_without_customer_is_a_validation_error() {
        let usecase = SubscriptionSyncUseCase::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(MockSubscriptionRepository::new()),
            Arc::new(MockPaymentGateway::new()),
            prices(),
        );

        let err = usecase
            .sync_user(&fixtures::user(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn no_active_subscription_is_not_found() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_list_active_subscriptions()
            .withf(|customer_id, limit| customer_id.to_string() == "cus_42" && *limit == 1)
            .returning(|_, _| Ok(vec![]));

        let usecase = SubscriptionSyncUseCase::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(MockSubscriptionRepository::new()),
            Arc::new(gateway),
            prices(),
        );

        let err = usecase
            .sync_user(&customer(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_price_writes_nothing() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_list_active_subscriptions()
            .returning(|_, _| Ok(vec![stripe_subscription("price_retired")]));

        let usecase = SubscriptionSyncUseCase::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(MockSubscriptionRepository::new()),
            Arc::new(gateway),
            prices(),
        );

        let err = usecase
            .sync_user(&customer(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn overwrites_user_and_row_from_stripe() {
        let user_id = Uuid::new_v4();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_list_active_subscriptions()
            .returning(|_, _| Ok(vec![stripe_subscription("price_team")]));

        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_apply_subscription_changes()
            .withf(move |id, changeset| {
                *id == user_id
                    && changeset.subscription_plan.as_deref() == Some("team")
                    && changeset.subscription_id.as_deref() == Some("sub_live")
                    && changeset.cancel_at_period_end == Some(true)
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_upsert()
            .withf(|row| row.plan == "team" && row.amount == 900 && row.interval == "month")
            .times(1)
            .returning(|row| {
                Ok(SubscriptionEntity {
                    id: Uuid::new_v4(),
                    user_id: row.user_id,
                    stripe_subscription_id: row.stripe_subscription_id,
                    stripe_customer_id: row.stripe_customer_id,
                    stripe_price_id: row.stripe_price_id,
                    status: row.status,
                    plan: row.plan,
                    current_period_start: row.current_period_start,
                    current_period_end: row.current_period_end,
                    cancel_at_period_end: row.cancel_at_period_end,
                    canceled_at: row.canceled_at,
                    amount: row.amount,
                    currency: row.currency,
                    interval: row.interval,
                    created_at: row.updated_at,
                    updated_at: row.updated_at,
                })
            });

        let usecase = SubscriptionSyncUseCase::new(
            Arc::new(user_repo),
            Arc::new(subscription_repo),
            Arc::new(gateway),
            prices(),
        );

        let report = usecase.sync_user(&customer(user_id)).await.unwrap();
        assert_eq!(report.subscription_id, "sub_live");
        assert_eq!(report.plan, "team");
        assert_eq!(report.status, "active");
        assert!(report.cancel_at_period_end);
        assert_eq!(report.current_period_end.timestamp(), 1_743_465_600);
    }
}
