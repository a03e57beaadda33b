use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use crates::{
    domain::{
        repositories::{subscriptions::SubscriptionRepository, users::UserRepository},
        value_objects::plans::PriceCatalog,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{subscriptions::SubscriptionPostgres, users::UserPostgres},
    },
    payments::stripe_client::StripeClient,
};
use serde_json::json;
use tracing::info;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::error_response,
    usecases::{
        gateways::PaymentGateway, subscription_sync::SubscriptionSyncUseCase,
        users::UserUseCase,
    },
};

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
    prices: PriceCatalog,
) -> Router {
    let user_repository = Arc::new(UserPostgres::new(Arc::clone(&db_pool)));
    let subscription_repository = Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool)));

    let user_usecase =
        UserUseCase::new(Arc::clone(&user_repository), Arc::clone(&subscription_repository));
    let sync_usecase = SubscriptionSyncUseCase::new(
        user_repository,
        subscription_repository,
        stripe_client,
        prices,
    );

    Router::new()
        .route("/status", get(subscription_status))
        .with_state(Arc::new(user_usecase))
        .merge(
            Router::new()
                .route("/sync", post(sync_subscription))
                .with_state(Arc::new(sync_usecase)),
        )
}

pub async fn subscription_status<U, S>(
    State(user_usecase): State<Arc<UserUseCase<U, S>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
{
    match user_usecase.subscription_status(user_id).await {
        Ok(status) => Json(status).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn sync_subscription<U, S, P>(
    State(sync_usecase): State<Arc<SubscriptionSyncUseCase<U, S, P>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PaymentGateway + Send + Sync + 'static,
{
    info!(%user_id, "subscriptions: sync requested");
    match sync_usecase.sync_user_by_id(user_id).await {
        Ok(report) => Json(json!({ "success": true, "subscription": report })).into_response(),
        Err(err) => error_response(&err),
    }
}
