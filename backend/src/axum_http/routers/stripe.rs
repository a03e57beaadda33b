use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
};
use axum_extra::extract::WithRejection;
use crates::{
    domain::{
        repositories::{
            credit_ledger::CreditLedgerRepository, subscriptions::SubscriptionRepository,
            users::UserRepository,
        },
        value_objects::subscriptions::{CancelSubscriptionModel, CheckoutSessionModel},
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            credit_ledger::CreditLedgerPostgres, subscriptions::SubscriptionPostgres,
            users::UserPostgres,
        },
    },
    payments::stripe_client::StripeClient,
};
use serde_json::json;
use tracing::debug;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::{AppError, error_response},
    config::config_model::DotEnvyConfig,
    usecases::{
        billing::BillingUseCase,
        gateways::PaymentGateway,
        webhook_reconciler::{WebhookOutcome, WebhookReconcilerUseCase},
    },
};

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
    config: Arc<DotEnvyConfig>,
) -> Router {
    let user_repository = Arc::new(UserPostgres::new(Arc::clone(&db_pool)));
    let subscription_repository = Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool)));
    let credit_ledger_repository = Arc::new(CreditLedgerPostgres::new(Arc::clone(&db_pool)));

    let billing_usecase = BillingUseCase::new(
        Arc::clone(&user_repository),
        Arc::clone(&subscription_repository),
        Arc::clone(&stripe_client),
        config.stripe.prices.clone(),
        config.app.portal_return_url(),
    );

    let webhook_usecase = WebhookReconcilerUseCase::new(
        user_repository,
        subscription_repository,
        credit_ledger_repository,
        stripe_client,
        config.stripe.prices.clone(),
    );

    Router::new()
        .route("/create-checkout-session", post(create_checkout_session))
        .route("/create-portal-session", post(create_portal_session))
        .route("/cancel-subscription", post(cancel_subscription))
        .with_state(Arc::new(billing_usecase))
        .merge(
            Router::new()
                .route("/webhooks", post(stripe_webhook))
                .with_state(Arc::new(webhook_usecase)),
        )
}

pub async fn create_checkout_session<U, S, P>(
    State(billing_usecase): State<Arc<BillingUseCase<U, S, P>>>,
    auth: AuthUser,
    WithRejection(Json(checkout_session_model), _): WithRejection<
        Json<CheckoutSessionModel>,
        AppError,
    >,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PaymentGateway + Send + Sync + 'static,
{
    match billing_usecase
        .create_checkout_session(auth.identity(), checkout_session_model)
        .await
    {
        Ok(session) => Json(session).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn create_portal_session<U, S, P>(
    State(billing_usecase): State<Arc<BillingUseCase<U, S, P>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PaymentGateway + Send + Sync + 'static,
{
    match billing_usecase.create_portal_session(user_id).await {
        Ok(portal) => Json(portal).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn cancel_subscription<U, S, P>(
    State(billing_usecase): State<Arc<BillingUseCase<U, S, P>>>,
    AuthUser { user_id, .. }: AuthUser,
    body: Option<Json<CancelSubscriptionModel>>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PaymentGateway + Send + Sync + 'static,
{
    let cancel_subscription_model = body.map(|Json(model)| model).unwrap_or_default();

    match billing_usecase
        .cancel_subscription(user_id, cancel_subscription_model)
        .await
    {
        Ok(canceled) => Json(canceled).into_response(),
        Err(err) => error_response(&err),
    }
}

/// Stripe posts here unauthenticated; the signature is the only credential.
pub async fn stripe_webhook<U, S, C, P>(
    State(webhook_usecase): State<Arc<WebhookReconcilerUseCase<U, S, C, P>>>,
    headers: HeaderMap,
    payload: Bytes,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    C: CreditLedgerRepository + Send + Sync + 'static,
    P: PaymentGateway + Send + Sync + 'static,
{
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match webhook_usecase.handle(&payload, signature).await {
        Ok(outcome) => {
            if let WebhookOutcome::Ignored { event_type, reason } = &outcome {
                debug!(%event_type, reason = %reason, "webhooks: event acknowledged without changes");
            }
            Json(json!({ "received": true })).into_response()
        }
        Err(err) => error_response(&err),
    }
}
