//! Backend query client used by the proxy agent.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use agora_core::config::Config;

const USER_QUERY_PATH: &str = "/chatbot/irbot-app/userquery";
const API_KEY_HEADER: &str = "x-irbot-secure";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("IRBOT_API_KEY is not set")]
    MissingApiKey,

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Sends a user query to the backend and returns its JSON response.
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn query(&self, query: &str, session_id: &str) -> Result<Value, BackendError>;
}

#[derive(Serialize)]
struct UserQuery<'a> {
    query: &'a str,
    session_id: &'a str,
}

pub struct HttpBackendClient {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpBackendClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.backend_base_url(),
            config.backend_api_key(),
            Duration::from_secs(config.backend_timeout_secs()),
        )
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn query(&self, query: &str, session_id: &str) -> Result<Value, BackendError> {
        let api_key = self.api_key.as_deref().ok_or(BackendError::MissingApiKey)?;

        debug!(base_url = %self.base_url, session_id, "Querying backend");
        let response = self
            .client
            .post(format!("{}{USER_QUERY_PATH}", self.base_url))
            .header(API_KEY_HEADER, api_key)
            .timeout(self.timeout)
            .json(&UserQuery { query, session_id })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }

        Ok(response.json().await?)
    }
}
