//! Request transport
//!
//! [`HttpTransport`] issues exactly one HTTP request per call.
//! [`RateLimitedTransport`] wraps any [`Transport`] and, on a 429, sleeps
//! until the `x-ratelimit-reset` deadline and replays the same request once.
//! Whatever the replay returns is handed back, 429 included.
//!
//! Callers await every send before issuing the next one, so at most one
//! request per run is ever in flight.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TransportError;

/// Header carrying the throttle deadline as epoch milliseconds.
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// A request relative to the API base (`projects`, `flags/{proj}/{flag}`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    pub fn post<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self, TransportError> {
        Self::with_body(Method::POST, path.into(), body)
    }

    pub fn patch<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self, TransportError> {
        Self::with_body(Method::PATCH, path.into(), body)
    }

    fn with_body<B: Serialize>(
        method: Method,
        path: String,
        body: &B,
    ) -> Result<Self, TransportError> {
        let body = serde_json::to_value(body).map_err(|source| TransportError::Encode {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            method,
            path,
            body: Some(body),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        serde_json::from_str(&self.body).map_err(|source| TransportError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Plain reqwest-backed transport with the caller's API key.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    /// `base_url` is the API root, e.g. `https://app.launchdarkly.com/api/v2`.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url).map_err(|e| TransportError::InvalidBaseUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = format!("{}/{}", self.base_url, request.path.trim_start_matches('/'));
        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .header(AUTHORIZATION, self.api_key.as_str())
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        tracing::debug!(method = %request.method, path = %request.path, status = status.as_u16(), "request completed");
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

/// How long to wait before replaying a throttled request.
///
/// Missing or unparsable headers, and deadlines already in the past, give a
/// zero delay.
pub fn reset_delay(headers: &HeaderMap, now: SystemTime) -> Duration {
    let Some(raw) = headers
        .get(RATE_LIMIT_RESET_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        tracing::warn!("throttled response without {RATE_LIMIT_RESET_HEADER}; retrying immediately");
        return Duration::ZERO;
    };

    let Ok(reset_ms) = raw.trim().parse::<u64>() else {
        tracing::warn!(value = raw, "unparsable {RATE_LIMIT_RESET_HEADER}; retrying immediately");
        return Duration::ZERO;
    };

    let deadline = UNIX_EPOCH + Duration::from_millis(reset_ms);
    deadline.duration_since(now).unwrap_or(Duration::ZERO)
}

/// Replays a throttled request exactly once after the reset window.
pub struct RateLimitedTransport<T> {
    inner: T,
}

impl<T: Transport> RateLimitedTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for RateLimitedTransport<T> {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let response = self.inner.send(request).await?;
        if response.status != StatusCode::TOO_MANY_REQUESTS {
            return Ok(response);
        }

        let wait = reset_delay(&response.headers, SystemTime::now());
        tracing::info!(
            method = %request.method,
            path = %request.path,
            wait_ms = wait.as_millis() as u64,
            "rate limited; waiting for reset window"
        );
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        tracing::info!(method = %request.method, path = %request.path, "replaying throttled request");
        self.inner.send(request).await
    }
}

/// Records requests instead of sending them.
///
/// Creations answer `201` echoing the request body, everything else `200`,
/// so a full run can be rehearsed offline.
#[derive(Debug, Default)]
pub struct DryRunTransport {
    requests: Mutex<Vec<ApiRequest>>,
}

impl DryRunTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Transport for DryRunTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let status = if request.method == Method::POST {
            StatusCode::CREATED
        } else {
            StatusCode::OK
        };
        let body = request
            .body
            .as_ref()
            .map(Value::to_string)
            .unwrap_or_default();
        Ok(ApiResponse {
            status,
            headers: HeaderMap::new(),
            body,
        })
    }
}
