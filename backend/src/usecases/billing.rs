use std::{collections::HashMap, sync::Arc};

use axum::http::StatusCode;
use chrono::Utc;
use crates::domain::{
    entities::users::UserSubscriptionChangeset,
    repositories::{subscriptions::SubscriptionRepository, users::UserRepository},
    value_objects::{
        enums::subscription_statuses::SubscriptionStatus,
        plans::PriceCatalog,
        subscriptions::{
            CancelSubscriptionDto, CancelSubscriptionModel, CheckoutSessionDto,
            CheckoutSessionModel, PortalSessionDto,
        },
        users::SessionIdentity,
    },
};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    axum_http::error_responses::ApiError,
    usecases::{gateways::PaymentGateway, users::ensure_user},
};

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("{0}")]
    Validation(&'static str),
    #[error(
        "You already have an active subscription. Please manage your subscription in the customer portal."
    )]
    AlreadySubscribed,
    #[error("User not found")]
    UserNotFound,
    #[error("No Stripe customer found. Please subscribe to a plan first.")]
    NoCustomer,
    #[error("No active subscription found")]
    NoActiveSubscription,
    #[error("{0}")]
    Stripe(&'static str, #[source] anyhow::Error),
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError for BillingError {
    fn status_code(&self) -> StatusCode {
        match self {
            BillingError::Validation(_)
            | BillingError::AlreadySubscribed
            | BillingError::NoCustomer => StatusCode::BAD_REQUEST,
            BillingError::UserNotFound | BillingError::NoActiveSubscription => {
                StatusCode::NOT_FOUND
            }
            BillingError::Stripe(..) => StatusCode::BAD_GATEWAY,
            BillingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            BillingError::Validation(_) | BillingError::NoCustomer => "VALIDATION_ERROR",
            BillingError::AlreadySubscribed => "ALREADY_SUBSCRIBED",
            BillingError::UserNotFound | BillingError::NoActiveSubscription => "NOT_FOUND",
            BillingError::Stripe(..) => "STRIPE_ERROR",
            BillingError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn extra(&self) -> Option<Map<String, Value>> {
        match self {
            BillingError::AlreadySubscribed => {
                let mut extra = Map::new();
                extra.insert("redirectToPortal".to_string(), Value::Bool(true));
                Some(extra)
            }
            _ => None,
        }
    }
}

pub type BillingResult<T> = std::result::Result<T, BillingError>;

/// Checkout, customer portal and cancellation against Stripe.
pub struct BillingUseCase<U, S, P>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PaymentGateway + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    subscription_repo: Arc<S>,
    payment_gateway: Arc<P>,
    prices: PriceCatalog,
    portal_return_url: String,
}

impl<U, S, P> BillingUseCase<U, S, P>
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
        portal_return_url: String,
    ) -> Self {
        Self {
            user_repo,
            subscription_repo,
            payment_gateway,
            prices,
            portal_return_url,
        }
    }

    pub async fn create_checkout_session(
        &self,
        identity: SessionIdentity,
        checkout_session_model: CheckoutSessionModel,
    ) -> BillingResult<CheckoutSessionDto> {
        let user_id = identity.user_id;

        let price_id = checkout_session_model
            .price_id
            .filter(|price_id| !price_id.trim().is_empty())
            .ok_or(BillingError::Validation("Price ID is required"))?;

        let plan = self
            .prices
            .plan_for_price(&price_id)
            .ok_or(BillingError::Validation("Invalid price ID"))?;

        let user = ensure_user(self.user_repo.as_ref(), &identity)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "billing: failed to load user for checkout");
                BillingError::Internal(err)
            })?;

        if user.has_active_subscription() {
            let err = BillingError::AlreadySubscribed;
            warn!(
                %user_id,
                status = err.status_code().as_u16(),
                "billing: checkout attempted with an active subscription"
            );
            return Err(err);
        }

        let customer_id = match user.stripe_customer_id.clone() {
            Some(customer_id) => customer_id,
            None => {
                let customer_id = self
                    .payment_gateway
                    .create_customer(&user.email, user.name.clone(), user_id)
                    .await
                    .map_err(|err| {
                        error!(%user_id, error = ?err, "billing: failed to create Stripe customer");
                        BillingError::Stripe("Failed to create checkout session", err)
                    })?;

                self.user_repo
                    .apply_subscription_changes(
                        user_id,
                        UserSubscriptionChangeset {
                            stripe_customer_id: Some(customer_id.clone()),
                            ..Default::default()
                        },
                    )
                    .await
                    .map_err(|err| {
                        error!(%user_id, db_error = ?err, "billing: failed to link Stripe customer");
                        BillingError::Internal(err)
                    })?;

                info!(%user_id, %customer_id, "billing: Stripe customer created");
                customer_id
            }
        };

        let metadata = HashMap::from([
            ("user_id".to_string(), user_id.to_string()),
            ("plan".to_string(), plan.to_string()),
        ]);

        let session = self
            .payment_gateway
            .create_checkout_session(&price_id, &customer_id, metadata)
            .await
            .map_err(|err| {
                error!(%user_id, %price_id, error = ?err, "billing: failed to create checkout session");
                BillingError::Stripe("Failed to create checkout session", err)
            })?;

        info!(%user_id, plan = %plan, session_id = %session.id, "billing: checkout session created");

        Ok(CheckoutSessionDto {
            session_id: session.id,
            url: session.url.unwrap_or_default(),
        })
    }

    pub async fn create_portal_session(&self, user_id: Uuid) -> BillingResult<PortalSessionDto> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "billing: failed to load user for portal");
                BillingError::Internal(err)
            })?
            .ok_or(BillingError::UserNotFound)?;

        let customer_id = user.stripe_customer_id.ok_or(BillingError::NoCustomer)?;

        let url = self
            .payment_gateway
            .create_billing_portal_session(&customer_id, &self.portal_return_url)
            .await
            .map_err(|err| {
                error!(%user_id, error = ?err, "billing: failed to create portal session");
                BillingError::Stripe("Failed to create portal session", err)
            })?;

        Ok(PortalSessionDto { url })
    }

    pub async fn cancel_subscription(
        &self,
        user_id: Uuid,
        cancel_subscription_model: CancelSubscriptionModel,
    ) -> BillingResult<CancelSubscriptionDto> {
        let at_period_end = cancel_subscription_model.cancel_at_period_end;

        let subscription = self
            .subscription_repo
            .find_active_by_user(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "billing: failed to load subscription for cancel");
                BillingError::Internal(err)
            })?
            .ok_or(BillingError::NoActiveSubscription)?;
        let subscription_id = subscription.stripe_subscription_id.as_str();

        let stripe_result = if at_period_end {
            self.payment_gateway
                .set_cancel_at_period_end(subscription_id)
                .await
        } else {
            self.payment_gateway
                .cancel_subscription_now(subscription_id)
                .await
        };
        stripe_result.map_err(|err| {
            error!(%user_id, subscription_id, error = ?err, "billing: Stripe cancellation failed");
            BillingError::Stripe("Failed to cancel subscription", err)
        })?;

        let changeset = if at_period_end {
            self.subscription_repo
                .set_cancel_at_period_end(subscription_id, true)
                .await
                .map_err(BillingError::Internal)?;
            UserSubscriptionChangeset {
                cancel_at_period_end: Some(true),
                ..Default::default()
            }
        } else {
            self.subscription_repo
                .mark_canceled(subscription_id, Utc::now())
                .await
                .map_err(BillingError::Internal)?;
            UserSubscriptionChangeset {
                subscription_status: Some(SubscriptionStatus::Canceled.to_string()),
                cancel_at_period_end: Some(false),
                ..Default::default()
            }
        };

        self.user_repo
            .apply_subscription_changes(user_id, changeset)
            .await
            .map_err(|err| {
                error!(%user_id, subscription_id, db_error = ?err, "billing: failed to mirror cancellation");
                BillingError::Internal(err)
            })?;

        info!(%user_id, subscription_id, at_period_end, "billing: subscription canceled");

        Ok(CancelSubscriptionDto {
            success: true,
            message: if at_period_end {
                "Subscription will cancel at the end of the billing period".to_string()
            } else {
                "Subscription canceled immediately".to_string()
            },
        })
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
        payments::stripe_client::StripeCheckoutSession,
    };
    use mockall::predicate::eq;

    fn prices() -> PriceCatalog {
        PriceCatalog::new(
            "price_basic".to_string(),
            "price_creator".to_string(),
            "price_team".to_string(),
        )
    }

    fn identity(user_id: Uuid) -> SessionIdentity {
        SessionIdentity {
            user_id,
            email: Some("listener@example.com".to_string()),
            name: Some("Listener".to_string()),
            image: None,
        }
    }

    fn usecase(
        user_repo: MockUserRepository,
        subscription_repo: MockSubscriptionRepository,
        gateway: MockPaymentGateway,
    ) -> BillingUseCase<MockUserRepository, MockSubscriptionRepository, MockPaymentGateway> {
        BillingUseCase::new(
            Arc::new(user_repo),
            Arc::new(subscription_repo),
            Arc::new(gateway),
            prices(),
            "https://studio.test/dashboard".to_string(),
        )
    }

    fn active_row(user_id: Uuid) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id,
            stripe_subscription_id: "sub_9".to_string(),
            stripe_customer_id: "cus_9".to_string(),
            stripe_price_id: "price_basic".to_string(),
            status: "active".to_string(),
            plan: "basic".to_string(),
            current_period_start: now,
            current_period_end: now,
            cancel_at_period_end: false,
            canceled_at: None,
            amount: 900,
            currency: "usd".to_string(),
            interval: "month".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn checkout_rejects_prices_outside_the_catalog() {
        let usecase = usecase(
            MockUserRepository::new(),
            MockSubscriptionRepository::new(),
            MockPaymentGateway::new(),
        );

        let err = usecase
            .create_checkout_session(
                identity(Uuid::new_v4()),
                CheckoutSessionModel {
                    price_id: Some("price_other".to_string()),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Invalid price ID");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn checkout_with_active_subscription_redirects_to_portal() {
        let mut user_repo = MockUserRepository::new();
        user_repo.expect_find_by_id().returning(|id| {
            let mut user = fixtures::user(id);
            user.subscription_status = Some("active".to_string());
            Ok(Some(user))
        });

        let usecase = usecase(
            user_repo,
            MockSubscriptionRepository::new(),
            MockPaymentGateway::new(),
        );

        let err = usecase
            .create_checkout_session(
                identity(Uuid::new_v4()),
                CheckoutSessionModel {
                    price_id: Some("price_creator".to_string()),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), "ALREADY_SUBSCRIBED");
        assert_eq!(
            err.extra().and_then(|extra| extra.get("redirectToPortal").cloned()),
            Some(Value::Bool(true))
        );
    }

    #[tokio::test]
    async fn checkout_creates_and_links_customer_then_tags_metadata() {
        let user_id = Uuid::new_v4();

        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_id()
            .returning(|id| Ok(Some(fixtures::user(id))));
        user_repo
            .expect_apply_subscription_changes()
            .withf(move |id, changeset| {
                *id == user_id && changeset.stripe_customer_id.as_deref() == Some("cus_new")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_customer()
            .times(1)
            .returning(|_, _, _| Ok("cus_new".to_string()));
        gateway
            .expect_create_checkout_session()
            .withf(move |price_id, customer_id, metadata| {
                price_id.to_string() == "price_creator"
                    && customer_id.to_string() == "cus_new"
                    && metadata.get("user_id") == Some(&user_id.to_string())
                    && metadata.get("plan").map(String::as_str) == Some("creator")
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(StripeCheckoutSession {
                    id: "cs_test".to_string(),
                    url: Some("https://checkout.stripe.com/c/cs_test".to_string()),
                })
            });

        let usecase = usecase(user_repo, MockSubscriptionRepository::new(), gateway);

        let session = usecase
            .create_checkout_session(
                identity(user_id),
                CheckoutSessionModel {
                    price_id: Some("price_creator".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(session.session_id, "cs_test");
    }

    #[tokio::test]
    async fn portal_requires_a_customer() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_id()
            .returning(|id| Ok(Some(fixtures::user(id))));

        let usecase = usecase(
            user_repo,
            MockSubscriptionRepository::new(),
            MockPaymentGateway::new(),
        );

        let err = usecase
            .create_portal_session(Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::NoCustomer));
    }

    #[tokio::test]
    async fn cancel_without_active_row_is_not_found() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_active_by_user()
            .returning(|_| Ok(None));

        let usecase = usecase(
            MockUserRepository::new(),
            subscription_repo,
            MockPaymentGateway::new(),
        );

        let err = usecase
            .cancel_subscription(Uuid::new_v4(), CancelSubscriptionModel::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cancel_at_period_end_only_flags_the_row() {
        let user_id = Uuid::new_v4();

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_active_by_user()
            .with(eq(user_id))
            .returning(|user_id| Ok(Some(active_row(user_id))));
        subscription_repo
            .expect_set_cancel_at_period_end()
            .withf(|id, flag| id.to_string() == "sub_9" && *flag)
            .times(1)
            .returning(|_, _| Ok(1));

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_set_cancel_at_period_end()
            .times(1)
            .returning(|_| Ok(()));

        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_apply_subscription_changes()
            .withf(|_, changeset| {
                changeset.cancel_at_period_end == Some(true)
                    && changeset.subscription_status.is_none()
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let usecase = usecase(user_repo, subscription_repo, gateway);

        let canceled = usecase
            .cancel_subscription(user_id, CancelSubscriptionModel::default())
            .await
            .unwrap();
        assert_eq!(
            canceled.message,
            "Subscription will cancel at the end of the billing period"
        );
    }

    #[tokio::test]
    async fn immediate_cancel_marks_row_canceled() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_active_by_user()
            .returning(|user_id| Ok(Some(active_row(user_id))));
        subscription_repo
            .expect_mark_canceled()
            .times(1)
            .returning(|_, _| Ok(1));

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_cancel_subscription_now()
            .times(1)
            .returning(|_| Ok(()));

        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_apply_subscription_changes()
            .withf(|_, changeset| changeset.subscription_status.as_deref() == Some("canceled"))
            .returning(|_, _| Ok(()));

        let usecase = usecase(user_repo, subscription_repo, gateway);

        let canceled = usecase
            .cancel_subscription(
                Uuid::new_v4(),
                CancelSubscriptionModel {
                    cancel_at_period_end: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(canceled.message, "Subscription canceled immediately");
    }
}
