//! HTTP paged query client

use async_trait::async_trait;
use ferry_config::WarehouseSourceConfig;
use reqwest::StatusCode;
use tracing::warn;

use super::{Page, PageRequest, WarehouseClient};
use crate::error::{Result, SourceError};

/// Fetches pages by POSTing a `PageRequest` as JSON to an export endpoint
#[derive(Debug, Clone)]
pub struct HttpWarehouseClient {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpWarehouseClient {
    /// Build a client from source config; the bearer token is read from
    /// `token_env` when set
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client creation fails (e.g., TLS misconfiguration)
    pub fn from_config(config: &WarehouseSourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ferry/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| SourceError::unavailable(format!("warehouse HTTP client: {}", e)))?;

        let token = config.token_env.as_deref().and_then(|var| {
            let value = std::env::var(var).ok();
            if value.is_none() {
                warn!(variable = var, "warehouse token variable is unset");
            }
            value
        });

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            token,
        })
    }
}

#[async_trait]
impl WarehouseClient for HttpWarehouseClient {
    async fn fetch(&self, request: &PageRequest) -> Result<Page> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        match response.status() {
            status if status.is_success() => Ok(response.json::<Page>().await?),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SourceError::unavailable(
                format!("warehouse endpoint refused credentials ({})", response.status()),
            )),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SourceError::unavailable(format!(
                    "warehouse endpoint returned {}: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                )))
            }
        }
    }
}
