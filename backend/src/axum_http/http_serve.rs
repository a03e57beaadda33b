use crate::{
    auth::AuthSecret,
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
};
use anyhow::Result;
use axum::{
    Extension, Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    generation::suno_client::SunoClient,
    infra::db::postgres::postgres_connection::PgPoolSquad,
    payments::stripe_client::StripeClient,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

pub async fn start(
    config: Arc<DotEnvyConfig>,
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
    suno_client: Arc<SunoClient>,
) -> Result<()> {
    let auth_secret = Arc::new(AuthSecret(config.auth.jwt_secret.clone()));

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest("/api/user", routers::users::routes(Arc::clone(&db_pool)))
        .nest(
            "/api/subscription",
            routers::subscriptions::routes(
                Arc::clone(&db_pool),
                Arc::clone(&stripe_client),
                config.stripe.prices.clone(),
            ),
        )
        .nest(
            "/api/stripe",
            routers::stripe::routes(
                Arc::clone(&db_pool),
                Arc::clone(&stripe_client),
                Arc::clone(&config),
            ),
        )
        .nest(
            "/api/credits",
            routers::credits::routes(Arc::clone(&db_pool), Arc::clone(&suno_client)),
        )
        .nest(
            "/api/music",
            routers::music::routes(
                Arc::clone(&db_pool),
                Arc::clone(&suno_client),
                Arc::clone(&config),
            ),
        )
        .nest("/api/projects", routers::projects::routes(Arc::clone(&db_pool)))
        .nest("/api/tracks", routers::tracks::routes(Arc::clone(&db_pool)))
        .route("/api/health-check", get(default_routers::health_check))
        .layer(Extension(auth_secret))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::PUT,
                    Method::DELETE,
                ])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
