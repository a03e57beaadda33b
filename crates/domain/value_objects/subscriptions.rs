use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::subscriptions::SubscriptionEntity;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDto {
    pub id: Uuid,
    pub stripe_subscription_id: String,
    pub stripe_price_id: String,
    pub status: String,
    pub plan: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<DateTime<Utc>>,
    pub amount: i64,
    pub currency: String,
    pub interval: String,
}

impl From<SubscriptionEntity> for SubscriptionDto {
    fn from(value: SubscriptionEntity) -> Self {
        Self {
            id: value.id,
            stripe_subscription_id: value.stripe_subscription_id,
            stripe_price_id: value.stripe_price_id,
            status: value.status,
            plan: value.plan,
            current_period_start: value.current_period_start,
            current_period_end: value.current_period_end,
            cancel_at_period_end: value.cancel_at_period_end,
            canceled_at: value.canceled_at,
            amount: value.amount,
            currency: value.currency,
            interval: value.interval,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionModel {
    pub price_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionDto {
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortalSessionDto {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancelSubscriptionDto {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CancelSubscriptionModel {
    #[serde(default = "default_cancel_at_period_end")]
    pub cancel_at_period_end: bool,
}

fn default_cancel_at_period_end() -> bool {
    true
}

impl Default for CancelSubscriptionModel {
    fn default() -> Self {
        Self {
            cancel_at_period_end: true,
        }
    }
}

/// Result of pulling a customer's subscription from Stripe and overwriting local state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub subscription_id: String,
    pub plan: String,
    pub status: String,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
}
