use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{Probe, ProbeError};

const USER_AGENT: &str = concat!("uptime-monitor/", env!("CARGO_PKG_VERSION"));

/// HTTP GET probe backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(Self::build_client()?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Builds the shared client. The per-request timeout is applied on each
    /// probe, so the client itself carries none.
    pub fn build_client() -> Result<Client, reqwest::Error> {
        Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(4)
            .gzip(true)
            .build()
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, url: &str, timeout: Duration) -> Result<(), ProbeError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProbeError::HttpStatus(status.as_u16()))
        }
    }
}

fn classify(e: reqwest::Error) -> ProbeError {
    if e.is_timeout() {
        ProbeError::Timeout
    } else if e.is_connect() {
        ProbeError::ConnectionFailed(e.to_string())
    } else {
        ProbeError::Other(e.to_string())
    }
}
