use std::{collections::HashMap, time::Duration};

use anyhow::Result;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use super::signature::{self, DEFAULT_TOLERANCE_SECS};

const STRIPE_API_BASE: &str = "https://api.stripe.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    success_url: String,
    cancel_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub api_version: Option<String>,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
    decline_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> Default for StripeList<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<i64>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub billing_cycle_anchor: Option<i64>,
    #[serde(default)]
    pub items: StripeList<StripeSubscriptionItem>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub price: Option<StripePrice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: String,
    pub unit_amount: Option<i64>,
    pub currency: Option<String>,
    pub recurring: Option<StripeRecurring>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeRecurring {
    pub interval: Option<String>,
}

impl StripeSubscription {
    fn first_item(&self) -> Option<&StripeSubscriptionItem> {
        self.items.data.first()
    }

    fn first_price(&self) -> Option<&StripePrice> {
        self.first_item().and_then(|item| item.price.as_ref())
    }

    /// Returns the subscription period start timestamp, falling back to the first item
    /// or the billing cycle anchor when the top-level field is absent.
    pub fn period_start(&self) -> Option<i64> {
        self.current_period_start
            .or_else(|| self.first_item().and_then(|item| item.current_period_start))
            .or(self.billing_cycle_anchor)
    }

    /// Returns the subscription period end timestamp, falling back to the first item when needed.
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end
            .or_else(|| self.first_item().and_then(|item| item.current_period_end))
    }

    pub fn price_id(&self) -> Option<&str> {
        self.first_price().map(|price| price.id.as_str())
    }

    pub fn amount(&self) -> i64 {
        self.first_price()
            .and_then(|price| price.unit_amount)
            .unwrap_or(0)
    }

    pub fn currency(&self) -> String {
        self.first_price()
            .and_then(|price| price.currency.clone())
            .unwrap_or_else(|| "usd".to_string())
    }

    pub fn interval(&self) -> String {
        self.first_price()
            .and_then(|price| price.recurring.as_ref())
            .and_then(|recurring| recurring.interval.clone())
            .unwrap_or_else(|| "month".to_string())
    }

    /// Local user id stamped on the subscription at checkout.
    pub fn metadata_user_id(&self) -> Option<Uuid> {
        self.metadata
            .get("user_id")
            .or_else(|| self.metadata.get("userId"))
            .and_then(|value| Uuid::parse_str(value).ok())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    pub id: Option<String>,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    pub billing_reason: Option<String>,
    pub period_start: Option<i64>,
    pub period_end: Option<i64>,
    #[serde(default)]
    pub lines: StripeList<StripeInvoiceLine>,
    pub parent: Option<StripeInvoiceParent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceLine {
    pub period: Option<StripePeriod>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePeriod {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceParent {
    pub subscription_details: Option<StripeInvoiceSubscriptionDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceSubscriptionDetails {
    pub subscription: Option<String>,
}

impl StripeInvoice {
    /// Newer API versions move the subscription id under `parent.subscription_details`.
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription.as_deref().or_else(|| {
            self.parent
                .as_ref()
                .and_then(|parent| parent.subscription_details.as_ref())
                .and_then(|details| details.subscription.as_deref())
        })
    }

    /// True for the first invoice of a subscription and for renewals. Proration
    /// and manual invoices pay inside a period that was already granted.
    pub fn opens_billing_period(&self) -> bool {
        matches!(
            self.billing_reason.as_deref(),
            Some("subscription_create" | "subscription_cycle")
        )
    }

    /// Start of the billing period this invoice pays for. The invoice-level
    /// `period_start` describes the previous period, so line items win.
    pub fn billing_period_start(&self) -> Option<i64> {
        self.lines
            .data
            .first()
            .and_then(|line| line.period.as_ref())
            .and_then(|period| period.start)
            .or(self.period_start)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

impl StripeClient {
    pub fn new(
        secret_key: String,
        webhook_secret: String,
        success_url: String,
        cancel_url: String,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            secret_key,
            webhook_secret,
            success_url,
            cancel_url,
        })
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_error_message = ?details.as_ref().and_then(|d| d.message.as_deref()),
            stripe_decline_code = ?details.as_ref().and_then(|d| d.decline_code.as_deref()),
            context = %context,
            "stripe api request failed"
        );

        anyhow::bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    async fn post_form(
        &self,
        path: &str,
        body: &[(String, String)],
        context: &str,
    ) -> Result<reqwest::Response> {
        let resp = self
            .http
            .post(format!("{}{}", STRIPE_API_BASE, path))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(body)
            .send()
            .await?;
        Self::ensure_success(resp, context).await
    }

    /// Creates a Stripe customer for the given user.
    pub async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
        user_id: Uuid,
    ) -> Result<String> {
        // https://stripe.com/docs/api/customers/create
        let mut body = vec![
            ("email".to_string(), email.to_string()),
            ("metadata[user_id]".to_string(), user_id.to_string()),
        ];
        if let Some(name) = name {
            body.push(("name".to_string(), name.to_string()));
        }

        let resp = self.post_form("/v1/customers", &body, "create customer").await?;

        #[derive(Deserialize)]
        struct CustomerResp {
            id: String,
        }

        let parsed: CustomerResp = resp.json().await?;
        Ok(parsed.id)
    }

    /// Creates a subscription-mode Checkout Session. The metadata is copied onto
    /// the resulting subscription so webhooks can find the local user.
    pub async fn create_checkout_session(
        &self,
        price_id: &str,
        customer_id: &str,
        metadata: HashMap<String, String>,
    ) -> Result<StripeCheckoutSession> {
        // https://stripe.com/docs/api/checkout/sessions/create
        let mut body: Vec<(String, String)> = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("customer".to_string(), customer_id.to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("line_items[0][price]".to_string(), price_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            ("allow_promotion_codes".to_string(), "true".to_string()),
            ("billing_address_collection".to_string(), "auto".to_string()),
        ];

        for (key, value) in metadata {
            body.push((format!("metadata[{}]", key), value.clone()));
            body.push((format!("subscription_data[metadata][{}]", key), value));
        }

        let resp = self
            .post_form("/v1/checkout/sessions", &body, "create checkout session")
            .await?;

        let session: StripeCheckoutSession = resp.json().await?;
        if session.url.is_none() {
            anyhow::bail!("Stripe Checkout session URL is missing");
        }
        Ok(session)
    }

    /// Creates a Billing Portal session and returns its URL.
    pub async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String> {
        // https://stripe.com/docs/api/customer_portal/sessions/create
        let body = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];

        let resp = self
            .post_form("/v1/billing_portal/sessions", &body, "create portal session")
            .await?;

        #[derive(Deserialize)]
        struct PortalResp {
            url: String,
        }

        let parsed: PortalResp = resp.json().await?;
        Ok(parsed.url)
    }

    /// Marks a Stripe subscription to cancel at period end.
    pub async fn set_cancel_at_period_end(&self, subscription_id: &str) -> Result<()> {
        // https://stripe.com/docs/api/subscriptions/update#update_subscription-cancel_at_period_end
        let body = vec![("cancel_at_period_end".to_string(), "true".to_string())];
        self.post_form(
            &format!("/v1/subscriptions/{}", subscription_id),
            &body,
            "cancel subscription at period end",
        )
        .await?;

        Ok(())
    }

    /// Cancels a Stripe subscription immediately.
    pub async fn cancel_subscription_now(&self, subscription_id: &str) -> Result<()> {
        // https://stripe.com/docs/api/subscriptions/cancel
        let resp = self
            .http
            .delete(format!(
                "{}/v1/subscriptions/{}",
                STRIPE_API_BASE, subscription_id
            ))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        Self::ensure_success(resp, "cancel subscription").await?;

        Ok(())
    }

    /// Lists the customer's active subscriptions, newest first.
    pub async fn list_active_subscriptions(
        &self,
        customer_id: &str,
        limit: u8,
    ) -> Result<Vec<StripeSubscription>> {
        // https://stripe.com/docs/api/subscriptions/list
        let resp = self
            .http
            .get(format!("{}/v1/subscriptions", STRIPE_API_BASE))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .query(&[
                ("customer", customer_id.to_string()),
                ("status", "active".to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "list subscriptions").await?;

        let list: StripeList<StripeSubscription> = resp.json().await?;
        Ok(list.data)
    }

    /// Verifies the webhook signature and parses the event.
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent> {
        signature::verify(
            payload,
            signature_header,
            &self.webhook_secret,
            DEFAULT_TOLERANCE_SECS,
            Utc::now().timestamp(),
        )?;

        let event: StripeEvent = serde_json::from_slice(payload)?;
        Ok(event)
    }
}
