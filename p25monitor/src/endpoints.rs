//! HTTP clients for the qualification, follow and traffic-capture endpoints
//!
//! The monitor only sees the three traits; [`HttpEndpoints`] implements all
//! of them against a running decoder service.

use async_trait::async_trait;
use p25model::{ControlChannelQualities, FollowRequest, GroupCaptureRequest, QualifyRequest};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const QUALIFY_PATH: &str = "/qualify";
pub const CONTROL_CHANNELS_PATH: &str = "/channels/control";
pub const GROUP_TRAFFIC_PATH: &str = "/channels/traffic/group";

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered {status}")]
    Status { url: String, status: StatusCode },

    /// The endpoint answered but found no control channel.
    #[error("no control channel qualified")]
    NoQualities,

    #[error("no answer within {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, EndpointError>;

/// Probes a frequency for a control channel.
#[async_trait]
pub trait QualifyEndpoint: Send + Sync {
    async fn qualify(&self, request: &QualifyRequest) -> Result<ControlChannelQualities>;
}

/// Asks for a control channel to be followed.
#[async_trait]
pub trait FollowEndpoint: Send + Sync {
    async fn follow(&self, request: &FollowRequest) -> Result<()>;
}

/// Asks for a group call to be captured.
#[async_trait]
pub trait TrafficCaptureEndpoint: Send + Sync {
    async fn capture_group(&self, request: &GroupCaptureRequest) -> Result<()>;
}

/// reqwest client bound to one decoder service base URL.
#[derive(Debug, Clone)]
pub struct HttpEndpoints {
    client: Client,
    base_url: String,
}

impl HttpEndpoints {
    /// `timeout` bounds every call, connection included.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let url = self.url(path);
        debug!("POST {}", url);
        Ok(self.client.post(&url).json(body).send().await?)
    }

    /// Posts a request whose answer only matters for its status.
    async fn post_accepted<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<()> {
        let response = self.post(path, body).await?;
        if !response.status().is_success() {
            return Err(EndpointError::Status {
                url: self.url(path),
                status: response.status(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl QualifyEndpoint for HttpEndpoints {
    async fn qualify(&self, request: &QualifyRequest) -> Result<ControlChannelQualities> {
        let response = self.post(QUALIFY_PATH, request).await?;
        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::NO_CONTENT => Err(EndpointError::NoQualities),
            status => Err(EndpointError::Status {
                url: self.url(QUALIFY_PATH),
                status,
            }),
        }
    }
}

#[async_trait]
impl FollowEndpoint for HttpEndpoints {
    async fn follow(&self, request: &FollowRequest) -> Result<()> {
        self.post_accepted(CONTROL_CHANNELS_PATH, request).await
    }
}

#[async_trait]
impl TrafficCaptureEndpoint for HttpEndpoints {
    async fn capture_group(&self, request: &GroupCaptureRequest) -> Result<()> {
        self.post_accepted(GROUP_TRAFFIC_PATH, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let endpoints = HttpEndpoints::with_client(Client::new(), "http://localhost:8080/");
        assert_eq!(endpoints.base_url(), "http://localhost:8080");
        assert_eq!(endpoints.url(QUALIFY_PATH), "http://localhost:8080/qualify");
    }
}
