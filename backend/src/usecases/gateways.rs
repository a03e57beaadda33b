use std::collections::HashMap;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use crates::{
    domain::value_objects::generation::{ProviderClip, ProviderGenerationRequest},
    generation::suno_client::{ProviderBalance, SunoClient, SunoError},
    payments::stripe_client::{
        StripeCheckoutSession, StripeClient, StripeEvent, StripeSubscription,
    },
};
use axum::http::StatusCode;
use serde_json::Value;
use uuid::Uuid;

use crate::axum_http::error_responses::ApiError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_customer(
        &self,
        email: &str,
        name: Option<String>,
        user_id: Uuid,
    ) -> AnyResult<String>;

    async fn create_checkout_session(
        &self,
        price_id: &str,
        customer_id: &str,
        metadata: HashMap<String, String>,
    ) -> AnyResult<StripeCheckoutSession>;

    async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> AnyResult<String>;

    async fn set_cancel_at_period_end(&self, subscription_id: &str) -> AnyResult<()>;

    async fn cancel_subscription_now(&self, subscription_id: &str) -> AnyResult<()>;

    async fn list_active_subscriptions(
        &self,
        customer_id: &str,
        limit: u8,
    ) -> AnyResult<Vec<StripeSubscription>>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent>;
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_customer(
        &self,
        email: &str,
        name: Option<String>,
        user_id: Uuid,
    ) -> AnyResult<String> {
        self.create_customer(email, name.as_deref(), user_id).await
    }

    async fn create_checkout_session(
        &self,
        price_id: &str,
        customer_id: &str,
        metadata: HashMap<String, String>,
    ) -> AnyResult<StripeCheckoutSession> {
        self.create_checkout_session(price_id, customer_id, metadata)
            .await
    }

    async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> AnyResult<String> {
        self.create_billing_portal_session(customer_id, return_url)
            .await
    }

    async fn set_cancel_at_period_end(&self, subscription_id: &str) -> AnyResult<()> {
        self.set_cancel_at_period_end(subscription_id).await
    }

    async fn cancel_subscription_now(&self, subscription_id: &str) -> AnyResult<()> {
        self.cancel_subscription_now(subscription_id).await
    }

    async fn list_active_subscriptions(
        &self,
        customer_id: &str,
        limit: u8,
    ) -> AnyResult<Vec<StripeSubscription>> {
        self.list_active_subscriptions(customer_id, limit).await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent> {
        self.verify_webhook_signature(payload, signature)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MusicGateway: Send + Sync {
    async fn get_credits(&self) -> Result<ProviderBalance, SunoError>;

    async fn generate(
        &self,
        request: ProviderGenerationRequest,
    ) -> Result<Vec<ProviderClip>, SunoError>;

    async fn task_status(&self, task_id: &str) -> Result<Option<ProviderClip>, SunoError>;

    async fn submit_task(&self, path: &str, body: Value) -> Result<String, SunoError>;
}

#[async_trait]
impl MusicGateway for SunoClient {
    async fn get_credits(&self) -> Result<ProviderBalance, SunoError> {
        self.get_credits().await
    }

    async fn generate(
        &self,
        request: ProviderGenerationRequest,
    ) -> Result<Vec<ProviderClip>, SunoError> {
        self.generate(&request).await
    }

    async fn task_status(&self, task_id: &str) -> Result<Option<ProviderClip>, SunoError> {
        self.task_status(task_id).await
    }

    async fn submit_task(&self, path: &str, body: Value) -> Result<String, SunoError> {
        self.submit_task(path, &body).await
    }
}

impl ApiError for SunoError {
    fn status_code(&self) -> StatusCode {
        match self {
            SunoError::Api { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            SunoError::Network(_) => StatusCode::BAD_GATEWAY,
            SunoError::Request(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            SunoError::Api { .. } => "API_ERROR",
            SunoError::Network(_) => "NETWORK_ERROR",
            SunoError::Request(_) => "REQUEST_ERROR",
        }
    }
}
