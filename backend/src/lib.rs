pub mod auth;
pub mod axum_http;
pub mod config;
pub mod usecases;

use std::sync::Arc;

use anyhow::Result;
use crates::{
    generation::suno_client::SunoClient, infra::db::postgres::postgres_connection,
    payments::stripe_client::StripeClient,
};
use tracing::info;

pub async fn run() -> Result<()> {
    let dotenvy_env = config::config_loader::load()?;
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(&dotenvy_env.database.url)?;
    info!("Postgres connection has been established");

    let stripe_client = StripeClient::new(
        dotenvy_env.stripe.secret_key.clone(),
        dotenvy_env.stripe.webhook_secret.clone(),
        dotenvy_env.app.checkout_success_url(),
        dotenvy_env.app.checkout_cancel_url(),
    )?;

    let suno_client = SunoClient::new(
        dotenvy_env.suno.api_key.clone(),
        dotenvy_env.suno.base_url.clone(),
        dotenvy_env.suno.task_base_url.clone(),
    )?;
    info!("Payment and generation clients are ready");

    axum_http::http_serve::start(
        Arc::new(dotenvy_env),
        Arc::new(postgres_pool),
        Arc::new(stripe_client),
        Arc::new(suno_client),
    )
    .await?;

    Ok(())
}
