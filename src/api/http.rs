use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::{ApiError, ApiResult, EmployeeApi};
use crate::domain::{EmployeeFields, EmployeeId, EmployeeRecord, ServerPage, ServerPageKey};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid API URL: {url}")]
    InvalidUrl { url: String },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Clone, Debug)]
pub struct HttpOptions {
    pub base_url: String,
    pub timeout_seconds: usize,
    pub proxy: Option<String>,
    /// Requests per second across every call made by this client; 0 disables the limit.
    pub rate: u32,
    /// Honour `HTTP_PROXY`-style environment variables when no explicit proxy is set.
    pub system_proxy: bool,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/".to_string(),
            timeout_seconds: 10,
            proxy: None,
            rate: 0,
            system_proxy: true,
        }
    }
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// reqwest-backed client for the directory REST endpoints.
pub struct HttpEmployeeApi {
    client: reqwest::Client,
    base_url: Url,
    limiter: Option<DirectLimiter>,
}

impl HttpEmployeeApi {
    pub fn new(options: &HttpOptions) -> Result<Self, ClientError> {
        let base_url = parse_base_url(&options.base_url)?;
        let client = build_client(
            options.proxy.as_deref(),
            options.timeout_seconds,
            options.system_proxy,
        )?;
        let limiter = NonZeroU32::new(options.rate).map(|r| RateLimiter::direct(Quota::per_second(r)));
        Ok(Self {
            client,
            base_url,
            limiter,
        })
    }

    pub fn page_url(&self, key: &ServerPageKey) -> ApiResult<Url> {
        let page = key.page.to_string();
        self.endpoint(&[
            "employees",
            "page",
            page.as_str(),
            "sort",
            key.sort_field.as_str(),
            key.sort_order.as_str(),
            "filters",
            key.filter.as_str(),
        ])
    }

    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::network(format!("cannot append a path to {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        if let Some(limiter) = self.limiter.as_ref() {
            limiter.until_ready().await;
        }
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let invalid = || ClientError::InvalidUrl {
        url: raw.to_string(),
    };
    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }
    Ok(url)
}

fn build_client(
    proxy: Option<&str>,
    timeout_seconds: usize,
    system_proxy: bool,
) -> Result<reqwest::Client, ClientError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(concat!("empdir/", env!("CARGO_PKG_VERSION"))),
    );
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );

    let timeout = Duration::from_secs(timeout_seconds.try_into().unwrap_or(10));
    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout);

    match proxy.filter(|p| !p.trim().is_empty()) {
        Some(proxy) => {
            let proxy_cfg = reqwest::Proxy::all(proxy).map_err(|e| ClientError::ProxySetup {
                proxy: proxy.to_string(),
                source: e,
            })?;
            builder = builder.proxy(proxy_cfg);
        }
        None if !system_proxy => {
            builder = builder.no_proxy();
        }
        None => {}
    }

    builder
        .build()
        .map_err(|e| ClientError::HttpClientBuild { source: e })
}

async fn error_from_response(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ApiError::server(status, server_message(&body))
}

/// Pulls a human-readable message out of an error body: `message` or `error`
/// from a JSON object, else the raw text.
fn server_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        for key in ["message", "error"] {
            if let Some(m) = value.get(key).and_then(|v| v.as_str()) {
                return Some(m.to_string());
            }
        }
    }
    Some(trimmed.to_string())
}

async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status().as_u16();
    response.json::<T>().await.map_err(|e| {
        if e.is_decode() {
            ApiError::server(status, Some(format!("invalid response body: {e}")))
        } else {
            ApiError::network(e.to_string())
        }
    })
}

impl EmployeeApi for HttpEmployeeApi {
    fn fetch_page(&self, key: ServerPageKey) -> impl Future<Output = ApiResult<ServerPage>> + Send {
        async move {
            let url = self.page_url(&key)?;
            log::debug!("GET {url}");
            let response = self.send(self.client.get(url)).await?;
            decode(response).await
        }
    }

    fn create(&self, fields: EmployeeFields) -> impl Future<Output = ApiResult<EmployeeRecord>> + Send {
        async move {
            let url = self.endpoint(&["employees"])?;
            log::debug!("POST {url}");
            let response = self.send(self.client.post(url).json(&fields)).await?;
            decode(response).await
        }
    }

    fn update(&self, record: EmployeeRecord) -> impl Future<Output = ApiResult<EmployeeRecord>> + Send {
        async move {
            let id = record.id.to_string();
            let url = self.endpoint(&["employees", id.as_str()])?;
            log::debug!("PUT {url}");
            let response = self.send(self.client.put(url).json(&record)).await?;
            decode(response).await
        }
    }

    fn delete(&self, id: EmployeeId) -> impl Future<Output = ApiResult<()>> + Send {
        async move {
            let id = id.to_string();
            let url = self.endpoint(&["employees", id.as_str()])?;
            log::debug!("DELETE {url}");
            self.send(self.client.delete(url)).await?;
            Ok(())
        }
    }
}
