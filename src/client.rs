use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::FetchError;

/// Something that can GET a URL and hand back its JSON body.
#[async_trait]
pub trait JsonFetcher: Send + Sync {
  async fn get_json(&self, url: &str) -> Result<Value, FetchError>;
}

/// HTTP fetcher backed by reqwest.
#[derive(Clone)]
pub struct HttpFetcher {
  client: Client,
}

impl HttpFetcher {
  pub fn new() -> Result<Self> {
    Self::with_settings(
      Duration::from_secs(30),
      concat!("pagefetch/", env!("CARGO_PKG_VERSION")),
    )
  }

  pub fn with_settings(timeout: Duration, user_agent: &str) -> Result<Self> {
    let client = Client::builder()
      .timeout(timeout)
      .user_agent(user_agent)
      .gzip(true)
      .deflate(true)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

#[async_trait]
impl JsonFetcher for HttpFetcher {
  async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
    let parsed = url::Url::parse(url).map_err(|e| FetchError::Transport {
      url: url.to_string(),
      message: format!("invalid URL: {}", e),
    })?;

    debug!(url, "GET");
    let response = self
      .client
      .get(parsed)
      .send()
      .await
      .map_err(|e| FetchError::Transport {
        url: url.to_string(),
        message: e.to_string(),
      })?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status {
        url: url.to_string(),
        status: status.as_u16(),
      });
    }

    let body = response.bytes().await.map_err(|e| FetchError::Transport {
      url: url.to_string(),
      message: e.to_string(),
    })?;

    serde_json::from_slice(&body).map_err(|e| FetchError::Decode {
      url: url.to_string(),
      message: e.to_string(),
    })
  }
}
