// src/services/transport.rs

//! Downstream message transport.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::TransportConfig;
use crate::utils::http::{DEFAULT_USER_AGENT, create_async_client};
use crate::utils::join_url;

/// Accepts a formatted message for a destination.
///
/// Implementations must be safe to call again with the same message after a
/// failure.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, message: &str, destination: &str) -> Result<()>;
}

/// Request body of the gateway's `sendText` endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendTextRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    session: &'a str,
}

/// Sends messages through a WhatsApp HTTP gateway (`POST /api/sendText`).
pub struct HttpTransport {
    client: Client,
    send_url: Url,
    session: String,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let client = create_async_client(DEFAULT_USER_AGENT, config.timeout())?;
        Self::with_client(client, config)
    }

    pub fn with_client(client: Client, config: &TransportConfig) -> Result<Self> {
        Ok(Self {
            client,
            send_url: join_url(&config.endpoint, "api/sendText")?,
            session: config.session.clone(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, message: &str, destination: &str) -> Result<()> {
        let body = SendTextRequest {
            chat_id: destination,
            text: message,
            session: &self.session,
        };

        self.client
            .post(self.send_url.clone())
            .json(&body)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AppError::delivery(destination, e))?;

        Ok(())
    }
}
