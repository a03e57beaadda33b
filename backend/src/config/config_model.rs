use crates::domain::value_objects::plans::PriceCatalog;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub auth: Auth,
    pub stripe: Stripe,
    pub app: App,
    pub suno: Suno,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    /// MiB
    pub body_limit: u64,
    /// Seconds
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Auth {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
    pub prices: PriceCatalog,
}

#[derive(Debug, Clone)]
pub struct App {
    pub base_url: String,
    pub callback_base_url: String,
}

impl App {
    pub fn checkout_success_url(&self) -> String {
        format!(
            "{}/dashboard?session_id={{CHECKOUT_SESSION_ID}}&success=true",
            self.base_url
        )
    }

    pub fn checkout_cancel_url(&self) -> String {
        format!("{}/pricing?canceled=true", self.base_url)
    }

    pub fn portal_return_url(&self) -> String {
        format!("{}/dashboard", self.base_url)
    }

    pub fn music_callback_url(&self) -> String {
        format!("{}/api/music/callback", self.callback_base_url)
    }
}

#[derive(Debug, Clone)]
pub struct Suno {
    pub api_key: String,
    pub base_url: String,
    pub task_base_url: String,
    pub callback_token: Option<String>,
}
