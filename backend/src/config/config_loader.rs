use anyhow::{Context, Result};
use crates::{
    domain::value_objects::plans::PriceCatalog,
    generation::suno_client::{DEFAULT_BASE_URL, DEFAULT_TASK_BASE_URL},
};

use super::config_model::{App, Auth, BackendServer, Database, DotEnvyConfig, Stripe, Suno};

fn required(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .with_context(|| format!("{} is invalid", key))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parsed_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} is invalid", key)),
        None => Ok(default),
    }
}

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: parsed_or("SERVER_BODY_LIMIT", 10)?,
        timeout: parsed_or("SERVER_TIMEOUT", 30)?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
    };

    let auth = Auth {
        jwt_secret: required("AUTH_JWT_SECRET")?,
    };

    let stripe = load_stripe()?;

    let base_url = required("APP_BASE_URL")?.trim_end_matches('/').to_string();
    let app = App {
        callback_base_url: optional("CALLBACK_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| base_url.clone()),
        base_url,
    };

    let suno = Suno {
        api_key: required("SUNOAPI_KEY")?,
        base_url: optional("SUNOAPI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        task_base_url: optional("SUNOAPI_TASK_BASE_URL")
            .unwrap_or_else(|| DEFAULT_TASK_BASE_URL.to_string()),
        callback_token: optional("SUNO_CALLBACK_TOKEN"),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        auth,
        stripe,
        app,
        suno,
    })
}

/// Stripe settings only. The sync tool needs these without the HTTP server's.
pub fn load_stripe() -> Result<Stripe> {
    dotenvy::dotenv().ok();

    Ok(Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
        prices: PriceCatalog::new(
            required("STRIPE_PRICE_BASIC")?,
            required("STRIPE_PRICE_CREATOR")?,
            required("STRIPE_PRICE_TEAM")?,
        ),
    })
}

pub fn load_database() -> Result<Database> {
    dotenvy::dotenv().ok();

    Ok(Database {
        url: required("DATABASE_URL")?,
    })
}
