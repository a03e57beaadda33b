use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use crates::{
    domain::{
        entities::{
            subscriptions::UpsertSubscriptionEntity,
            users::{UserEntity, UserSubscriptionChangeset},
        },
        repositories::{
            credit_ledger::CreditLedgerRepository, subscriptions::SubscriptionRepository,
            users::UserRepository,
        },
        value_objects::{
            credits::{AllocateCreditsModel, AllocationOutcome},
            enums::{
                subscription_plans::SubscriptionPlan, subscription_statuses::SubscriptionStatus,
            },
            plans::PriceCatalog,
        },
    },
    payments::stripe_client::{StripeEvent, StripeInvoice, StripeSubscription},
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{axum_http::error_responses::ApiError, usecases::gateways::PaymentGateway};

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Missing stripe-signature header")]
    MissingSignature,
    #[error("Webhook signature verification failed")]
    InvalidSignature,
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
    #[error("Webhook processing failed")]
    Internal(#[from] anyhow::Error),
}

impl ApiError for WebhookError {
    fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::MissingSignature
            | WebhookError::InvalidSignature
            | WebhookError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            WebhookError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            WebhookError::MissingSignature | WebhookError::InvalidSignature => {
                "WEBHOOK_SIGNATURE_ERROR"
            }
            WebhookError::InvalidPayload(_) => "INVALID_PAYLOAD",
            WebhookError::Internal(_) => "WEBHOOK_ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationStatus {
    Granted { amount: i32 },
    AlreadyGranted,
}

/// What a verified event did to local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied {
        event_type: String,
        allocation: Option<AllocationStatus>,
    },
    Ignored {
        event_type: String,
        reason: String,
    },
}

impl WebhookOutcome {
    fn applied(event_type: &str, allocation: Option<AllocationStatus>) -> Self {
        WebhookOutcome::Applied {
            event_type: event_type.to_string(),
            allocation,
        }
    }

    fn ignored(event_type: &str, reason: &str) -> Self {
        WebhookOutcome::Ignored {
            event_type: event_type.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type WebhookResult<T> = std::result::Result<T, WebhookError>;

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Local row and user fields that mirror one Stripe subscription.
pub fn mirror_subscription(
    user_id: Uuid,
    plan: SubscriptionPlan,
    subscription: &StripeSubscription,
) -> WebhookResult<(UpsertSubscriptionEntity, UserSubscriptionChangeset)> {
    let (Some(period_start), Some(period_end)) = (
        timestamp(subscription.period_start()),
        timestamp(subscription.period_end()),
    ) else {
        return Err(WebhookError::InvalidPayload(format!(
            "subscription {} has no billing period",
            subscription.id
        )));
    };

    let status = SubscriptionStatus::from_str(subscription.status.as_deref().unwrap_or_default());
    let customer_id = subscription.customer.clone().unwrap_or_default();

    let row = UpsertSubscriptionEntity {
        user_id,
        stripe_subscription_id: subscription.id.clone(),
        stripe_customer_id: customer_id,
        stripe_price_id: subscription.price_id().unwrap_or_default().to_string(),
        status: status.to_string(),
        plan: plan.to_string(),
        current_period_start: period_start,
        current_period_end: period_end,
        cancel_at_period_end: subscription.cancel_at_period_end,
        canceled_at: timestamp(subscription.canceled_at),
        amount: subscription.amount(),
        currency: subscription.currency(),
        interval: subscription.interval(),
        updated_at: Utc::now(),
    };

    let changeset = UserSubscriptionChangeset {
        stripe_customer_id: subscription.customer.clone(),
        subscription_id: Some(subscription.id.clone()),
        subscription_status: Some(status.to_string()),
        subscription_plan: Some(plan.to_string()),
        subscription_period_end: Some(period_end),
        cancel_at_period_end: Some(subscription.cancel_at_period_end),
    };

    Ok((row, changeset))
}

pub struct WebhookReconcilerUseCase<U, S, C, P>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    C: CreditLedgerRepository + Send + Sync + 'static,
    P: PaymentGateway + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    subscription_repo: Arc<S>,
    credit_ledger_repo: Arc<C>,
    payment_gateway: Arc<P>,
    prices: PriceCatalog,
}

impl<U, S, C, P> WebhookReconcilerUseCase<U, S, C, P>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    C: CreditLedgerRepository + Send + Sync + 'static,
    P: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        subscription_repo: Arc<S>,
        credit_ledger_repo: Arc<C>,
        payment_gateway: Arc<P>,
        prices: PriceCatalog,
    ) -> Self {
        Self {
            user_repo,
            subscription_repo,
            credit_ledger_repo,
            payment_gateway,
            prices,
        }
    }

    pub async fn handle(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> WebhookResult<WebhookOutcome> {
        let signature = signature.ok_or_else(|| {
            warn!(
                payload_len = payload.len(),
                "webhooks: request without stripe-signature header"
            );
            WebhookError::MissingSignature
        })?;

        let event = self
            .payment_gateway
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                warn!(
                    error = %err,
                    status = StatusCode::BAD_REQUEST.as_u16(),
                    "webhooks: signature verification failed"
                );
                WebhookError::InvalidSignature
            })?;

        let event_type = event.type_.clone();
        info!(
            event_type = %event_type,
            event_id = ?event.id,
            livemode = ?event.livemode,
            "webhooks: event verified"
        );

        let outcome = match event_type.as_str() {
            "customer.subscription.created" => self.on_subscription_changed(&event, true).await?,
            "customer.subscription.updated" => self.on_subscription_changed(&event, false).await?,
            "customer.subscription.deleted" => self.on_subscription_deleted(&event).await?,
            "invoice.payment_succeeded" => self.on_invoice_paid(&event).await?,
            "invoice.payment_failed" => {
                let invoice: StripeInvoice = parse_object(&event)?;
                warn!(
                    invoice_id = ?invoice.id,
                    subscription_id = ?invoice.subscription_id(),
                    customer_id = ?invoice.customer,
                    "webhooks: invoice payment failed"
                );
                WebhookOutcome::ignored(
                    &event_type,
                    "payment failures are reflected by subscription updates",
                )
            }
            _ => {
                debug!(event_type = %event_type, "webhooks: unhandled event type");
                WebhookOutcome::ignored(&event_type, "unhandled event type")
            }
        };

        if let WebhookOutcome::Ignored { reason, .. } = &outcome {
            info!(event_type = %event_type, reason = %reason, "webhooks: event ignored");
        }

        Ok(outcome)
    }

    /// Finds the local user by Stripe customer id, falling back to the user id
    /// stamped into the subscription metadata at checkout.
    async fn resolve_user(
        &self,
        subscription: &StripeSubscription,
    ) -> WebhookResult<Option<UserEntity>> {
        if let Some(customer_id) = subscription.customer.as_deref() {
            let user = self
                .user_repo
                .find_by_stripe_customer_id(customer_id)
                .await
                .map_err(|err| {
                    error!(
                        customer_id,
                        db_error = ?err,
                        "webhooks: failed to look up user by customer id"
                    );
                    WebhookError::Internal(err)
                })?;
            if user.is_some() {
                return Ok(user);
            }
        }

        let Some(user_id) = subscription.metadata_user_id() else {
            return Ok(None);
        };

        self.user_repo.find_by_id(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "webhooks: failed to look up user by metadata id");
            WebhookError::Internal(err)
        })
    }

    async fn on_subscription_changed(
        &self,
        event: &StripeEvent,
        created: bool,
    ) -> WebhookResult<WebhookOutcome> {
        let subscription: StripeSubscription = parse_object(event)?;
        let subscription_id = subscription.id.clone();

        let Some(user) = self.resolve_user(&subscription).await? else {
            warn!(
                %subscription_id,
                customer_id = ?subscription.customer,
                "webhooks: no local user for subscription"
            );
            return Ok(WebhookOutcome::ignored(&event.type_, "no local user"));
        };

        let price_id = subscription.price_id().unwrap_or_default();
        let Some(plan) = self.prices.plan_for_price(price_id) else {
            warn!(
                %subscription_id,
                price_id,
                user_id = %user.id,
                "webhooks: subscription price is not in the catalog"
            );
            return Ok(WebhookOutcome::ignored(&event.type_, "unknown price"));
        };

        let (row, changeset) = mirror_subscription(user.id, plan, &subscription)?;
        let period_start = row.current_period_start;
        let status = SubscriptionStatus::from_str(&row.status);

        self.subscription_repo.upsert(row).await.map_err(|err| {
            error!(
                %subscription_id,
                user_id = %user.id,
                db_error = ?err,
                "webhooks: failed to upsert subscription"
            );
            WebhookError::Internal(err)
        })?;

        self.user_repo
            .apply_subscription_changes(user.id, changeset)
            .await
            .map_err(|err| {
                error!(
                    %subscription_id,
                    user_id = %user.id,
                    db_error = ?err,
                    "webhooks: failed to mirror subscription onto user"
                );
                WebhookError::Internal(err)
            })?;

        info!(
            %subscription_id,
            user_id = %user.id,
            plan = %plan,
            status = %status,
            created,
            "webhooks: subscription reconciled"
        );

        // Keyed on the period start, so whichever of created, updated or the
        // invoice lands first grants and the others find the entry.
        let allocation = if status.grants_credits() {
            Some(
                self.allocate(user.id, plan, &subscription_id, period_start)
                    .await?,
            )
        } else {
            None
        };

        Ok(WebhookOutcome::applied(&event.type_, allocation))
    }

    async fn on_subscription_deleted(&self, event: &StripeEvent) -> WebhookResult<WebhookOutcome> {
        let subscription: StripeSubscription = parse_object(event)?;
        let subscription_id = subscription.id.as_str();

        let Some(row) = self
            .subscription_repo
            .find_by_stripe_subscription_id(subscription_id)
            .await
            .map_err(|err| {
                error!(subscription_id, db_error = ?err, "webhooks: failed to load subscription");
                WebhookError::Internal(err)
            })?
        else {
            warn!(subscription_id, "webhooks: deleted subscription has no local row");
            return Ok(WebhookOutcome::ignored(&event.type_, "no local subscription"));
        };

        let canceled_at = timestamp(subscription.canceled_at).unwrap_or_else(Utc::now);
        self.subscription_repo
            .mark_canceled(subscription_id, canceled_at)
            .await
            .map_err(|err| {
                error!(subscription_id, db_error = ?err, "webhooks: failed to mark subscription canceled");
                WebhookError::Internal(err)
            })?;

        // Plan and balance stay as they are until the user resubscribes or syncs.
        let changeset = UserSubscriptionChangeset {
            subscription_status: Some(SubscriptionStatus::Canceled.to_string()),
            cancel_at_period_end: Some(false),
            ..Default::default()
        };
        self.user_repo
            .apply_subscription_changes(row.user_id, changeset)
            .await
            .map_err(|err| {
                error!(
                    subscription_id,
                    user_id = %row.user_id,
                    db_error = ?err,
                    "webhooks: failed to mark user subscription canceled"
                );
                WebhookError::Internal(err)
            })?;

        info!(subscription_id, user_id = %row.user_id, "webhooks: subscription canceled");
        Ok(WebhookOutcome::applied(&event.type_, None))
    }

    async fn on_invoice_paid(&self, event: &StripeEvent) -> WebhookResult<WebhookOutcome> {
        let invoice: StripeInvoice = parse_object(event)?;

        let Some(subscription_id) = invoice.subscription_id().map(str::to_string) else {
            return Ok(WebhookOutcome::ignored(
                &event.type_,
                "invoice is not for a subscription",
            ));
        };

        if !invoice.opens_billing_period() {
            info!(
                %subscription_id,
                invoice_id = ?invoice.id,
                billing_reason = ?invoice.billing_reason,
                "webhooks: paid invoice does not open a billing period"
            );
            return Ok(WebhookOutcome::ignored(
                &event.type_,
                "invoice does not open a billing period",
            ));
        }

        let period_start = timestamp(invoice.billing_period_start()).ok_or_else(|| {
            WebhookError::InvalidPayload(format!(
                "invoice {:?} has no billing period",
                invoice.id
            ))
        })?;

        let Some(row) = self
            .subscription_repo
            .find_by_stripe_subscription_id(&subscription_id)
            .await
            .map_err(|err| {
                error!(%subscription_id, db_error = ?err, "webhooks: failed to load subscription for invoice");
                WebhookError::Internal(err)
            })?
        else {
            warn!(%subscription_id, "webhooks: paid invoice has no local subscription");
            return Ok(WebhookOutcome::ignored(&event.type_, "no local subscription"));
        };

        let plan = row.plan();
        if !plan.is_paid() {
            return Ok(WebhookOutcome::ignored(&event.type_, "subscription is not on a paid plan"));
        }

        let allocation = self
            .allocate(row.user_id, plan, &subscription_id, period_start)
            .await?;

        Ok(WebhookOutcome::applied(&event.type_, Some(allocation)))
    }

    async fn allocate(
        &self,
        user_id: Uuid,
        plan: SubscriptionPlan,
        subscription_id: &str,
        period_start: DateTime<Utc>,
    ) -> WebhookResult<AllocationStatus> {
        let model = AllocateCreditsModel {
            user_id,
            plan,
            subscription_id: subscription_id.to_string(),
            period_start,
        };
        let idempotency_key = model.idempotency_key();

        let outcome = self
            .credit_ledger_repo
            .allocate(model)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    subscription_id,
                    %idempotency_key,
                    db_error = ?err,
                    "webhooks: failed to allocate monthly credits"
                );
                WebhookError::Internal(err)
            })?;

        match outcome {
            AllocationOutcome::Granted(entry) => {
                info!(
                    %user_id,
                    subscription_id,
                    plan = %plan,
                    amount = entry.amount,
                    %idempotency_key,
                    "webhooks: monthly credits granted"
                );
                Ok(AllocationStatus::Granted {
                    amount: entry.amount,
                })
            }
            AllocationOutcome::AlreadyGranted => {
                info!(
                    %user_id,
                    subscription_id,
                    %idempotency_key,
                    "webhooks: credits for this period already granted"
                );
                Ok(AllocationStatus::AlreadyGranted)
            }
        }
    }
}

fn parse_object<T: DeserializeOwned>(event: &StripeEvent) -> WebhookResult<T> {
    serde_json::from_value(event.data.object.clone()).map_err(|err| {
        warn!(
            event_type = %event.type_,
            error = %err,
            status = StatusCode::BAD_REQUEST.as_u16(),
            "webhooks: malformed event object"
        );
        WebhookError::InvalidPayload(err.to_string())
    })
}

#[cfg(test)]
mod tests;
