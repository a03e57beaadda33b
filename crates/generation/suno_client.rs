use std::time::Duration;

use reqwest::{StatusCode, header::AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::domain::value_objects::generation::{ProviderClip, ProviderGenerationRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.sunoapi.com/api/v1";
pub const DEFAULT_TASK_BASE_URL: &str = "https://api.sunoapi.org/api/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SunoError {
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("Unable to reach SunoAPI service. Please check your connection.")]
    Network(String),
    #[error("{0}")]
    Request(String),
}

impl SunoError {
    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            SunoError::Network(err.to_string())
        } else {
            SunoError::Request(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct ProviderBalance {
    pub credits: i64,
    #[serde(default)]
    pub extra_credits: i64,
}

#[derive(Debug, Deserialize)]
struct TaskEnvelope {
    code: i64,
    msg: Option<String>,
    data: Option<TaskData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskData {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusEnvelope {
    code: Option<i64>,
    #[serde(default)]
    data: Vec<ProviderClip>,
}

/// Client for the SunoAPI music provider.
pub struct SunoClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    task_base_url: String,
}

impl SunoClient {
    pub fn new(api_key: String, base_url: String, task_base_url: String) -> anyhow::Result<Self> {
        if api_key.is_empty() {
            warn!("suno_client: SUNOAPI_KEY is empty, provider calls will be rejected");
        }
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            task_base_url: task_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Sends one attempt. Create and task calls are not idempotent at the
    /// provider, so failures go straight back to the caller.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, SunoError> {
        let resp = request
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(SunoError::from_transport)?;
        let status = resp.status();

        if !status.is_success() {
            return Err(Self::api_error(resp).await);
        }

        debug!(%status, url = %resp.url(), "suno_client: provider response");
        Ok(resp)
    }

    async fn api_error(resp: reqwest::Response) -> SunoError {
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        let message = body
            .get("message")
            .or_else(|| body.get("error"))
            .or_else(|| body.get("msg"))
            .and_then(Value::as_str)
            .unwrap_or("An error occurred with the SunoAPI service")
            .to_string();

        error!(%status, %message, "suno_client: provider request failed");
        SunoError::Api {
            status: status.as_u16(),
            message,
        }
    }

    /// Live credit balance held at the provider.
    pub async fn get_credits(&self) -> Result<ProviderBalance, SunoError> {
        let resp = self
            .send(self.http.get(format!("{}/get-credits", self.base_url)))
            .await?;
        resp.json::<ProviderBalance>()
            .await
            .map_err(|err| SunoError::Request(err.to_string()))
    }

    /// Submits a generation and returns the clips the provider created.
    pub async fn generate(
        &self,
        request: &ProviderGenerationRequest,
    ) -> Result<Vec<ProviderClip>, SunoError> {
        let resp = self
            .send(
                self.http
                    .post(format!("{}/suno/create", self.base_url))
                    .json(request),
            )
            .await?;

        let body: Value = resp
            .json()
            .await
            .map_err(|err| SunoError::Request(err.to_string()))?;
        parse_generated_clips(body)
    }

    /// Polls a generation task. `None` means the provider is still working on it.
    pub async fn task_status(&self, task_id: &str) -> Result<Option<ProviderClip>, SunoError> {
        let resp = self
            .send(
                self.http
                    .get(format!("{}/suno/task/{}", self.base_url, task_id)),
            )
            .await?;

        if resp.status() == StatusCode::ACCEPTED {
            return Ok(None);
        }

        let envelope: StatusEnvelope = resp
            .json()
            .await
            .map_err(|err| SunoError::Request(err.to_string()))?;

        if envelope.code != Some(200) {
            return Ok(None);
        }
        Ok(envelope.data.into_iter().next())
    }

    /// Posts to one of the task endpoints (`/generate/extend`, `/wav/generate`,
    /// `/mp4/generate`) and returns the provider task id.
    pub async fn submit_task(&self, path: &str, body: &Value) -> Result<String, SunoError> {
        let resp = self
            .send(
                self.http
                    .post(format!("{}{}", self.task_base_url, path))
                    .json(body),
            )
            .await?;

        let envelope: TaskEnvelope = resp
            .json()
            .await
            .map_err(|err| SunoError::Request(err.to_string()))?;
        task_id_from_envelope(envelope)
    }
}

fn task_id_from_envelope(envelope: TaskEnvelope) -> Result<String, SunoError> {
    match (envelope.code, envelope.data) {
        (200, Some(data)) => Ok(data.task_id),
        (_, _) => Err(SunoError::Api {
            status: 400,
            message: envelope
                .msg
                .unwrap_or_else(|| "Provider rejected the task".to_string()),
        }),
    }
}

/// The create endpoint answers with a bare array, `{ "data": [...] }`, or a single clip.
pub fn parse_generated_clips(body: Value) -> Result<Vec<ProviderClip>, SunoError> {
    let clips = match body {
        Value::Object(mut map) if map.get("data").is_some_and(Value::is_array) => {
            map.remove("data").unwrap_or(Value::Array(Vec::new()))
        }
        Value::Array(items) => Value::Array(items),
        Value::Object(map) => Value::Array(vec![Value::Object(map)]),
        other => {
            return Err(SunoError::Request(format!(
                "unexpected generation response: {other}"
            )));
        }
    };

    serde_json::from_value(clips).map_err(|err| SunoError::Request(err.to_string()))
}
