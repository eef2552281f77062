//! Synchronous request primitives against the director REST API.
//!
//! `ClientRequest` wraps a shared `reqwest::Client` plus the director base URL
//! and, for context-scoped clients, a correlation id that is attached to every
//! request. It offers the verbed operations the domain layer composes:
//!
//! - [`SyncOp::get`] — GET and decode a JSON body.
//! - [`SyncOp::raw_get`] — GET and buffer the body.
//! - [`SyncOp::raw_get_to`] — GET and stream the body into a writer.
//! - [`SyncOp::raw_put`] — PUT a raw payload.
//!
//! Non-2xx responses become `DirectorError::Endpoint`, which keeps the status
//! code and body so callers can still branch on e.g. 404. Nothing here
//! retries: transient failures propagate immediately.
//!
//! Cloning a `ClientRequest` is cheap and the clone shares the connection
//! pool. [`SyncOp::with_context`] returns a new value and never touches the
//! receiver.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::DirectorConfig;
use crate::error::{DirectorError, Result};

/// Status, headers and (unless streamed) body of a director response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Buffered body. Empty when the body was streamed to a writer.
    pub body: Bytes,
}

/// Serializes a JSON request body.
pub(crate) fn encode_json<B: Serialize>(path: &str, body: &B) -> Result<Bytes> {
    serde_json::to_vec(body)
        .map(Bytes::from)
        .map_err(|e| DirectorError::Encode {
            path: path.to_string(),
            source: Box::new(e),
        })
}

/// Appends `query` to `path` as an URL-encoded query string.
pub(crate) fn with_query<Q: Serialize>(path: &str, query: &Q) -> Result<String> {
    let encoded = serde_urlencoded::to_string(query).map_err(|e| DirectorError::Encode {
        path: path.to_string(),
        source: Box::new(e),
    })?;
    Ok(format!("{path}?{encoded}"))
}

/// Headers for a JSON request body.
pub fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

/// Operations that complete within a single request/response exchange.
#[async_trait]
pub trait SyncOp: Clone + Send + Sync {
    /// A copy of `self` that tags every request with the correlation id `id`.
    fn with_context(&self, id: &str) -> Self;

    /// GETs `path` and decodes the JSON body into `T`.
    async fn get<T: DeserializeOwned + Send>(&self, path: &str) -> Result<T>;

    /// GETs `path` and returns the buffered response.
    async fn raw_get(&self, path: &str, headers: &HeaderMap) -> Result<RawResponse>;

    /// GETs `path` and streams the body into `out` instead of buffering it.
    ///
    /// When `cancel` fires mid-stream the call fails with
    /// `DirectorError::Cancelled`; bytes already written stay in `out`.
    async fn raw_get_to(
        &self,
        path: &str,
        out: &mut (dyn AsyncWrite + Unpin + Send),
        headers: &HeaderMap,
        cancel: Option<&CancellationToken>,
    ) -> Result<RawResponse>;

    /// PUTs `body` to `path` and returns the buffered response.
    async fn raw_put(&self, path: &str, body: Bytes, headers: &HeaderMap) -> Result<RawResponse>;
}

/// HTTP request executor for one director endpoint.
#[derive(Debug, Clone)]
pub struct ClientRequest {
    http: reqwest::Client,
    base_url: String,
    context_header: HeaderName,
    context_id: Option<String>,
}

impl ClientRequest {
    /// Creates an unscoped executor. `base_url` should not end with `/`.
    pub fn new(http: reqwest::Client, base_url: &str, context_header: HeaderName) -> Self {
        ClientRequest {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            context_header,
            context_id: None,
        }
    }

    /// Builds an executor (and its HTTP client) from validated settings.
    pub fn from_config(config: &DirectorConfig) -> Result<Self> {
        config.validate()?;
        let header = HeaderName::from_bytes(config.context_header.as_bytes()).map_err(|e| {
            DirectorError::Config {
                message: format!("invalid context_header '{}'", config.context_header),
                source: Some(Box::new(e)),
            }
        })?;
        Ok(ClientRequest::new(
            config.build_http_client()?,
            &config.normalized_base_url(),
            header,
        ))
    }

    /// The correlation id attached to requests, if this executor is scoped.
    pub fn context_id(&self) -> Option<&str> {
        self.context_id.as_deref()
    }

    /// Director base URL, without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends one request and returns the response unread.
    ///
    /// Only transport failures are errors here; the status code is left for
    /// the caller to interpret.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        headers: &HeaderMap,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method.clone(), &url).headers(headers.clone());
        if let Some(id) = &self.context_id {
            match HeaderValue::from_str(id) {
                Ok(value) => req = req.header(self.context_header.clone(), value),
                Err(_) => {
                    return Err(DirectorError::config(format!(
                        "context id '{id}' is not a valid header value"
                    )));
                }
            }
        }
        if let Some(payload) = body {
            req = req.body(payload);
        }

        let resp = req.send().await.map_err(|source| DirectorError::Transport {
            path: path.to_string(),
            source,
        })?;

        debug!(
            method = %method,
            path,
            status = resp.status().as_u16(),
            context_id = self.context_id.as_deref(),
            "director request"
        );
        Ok(resp)
    }

    /// Sends one request and buffers the whole body, whatever the status.
    ///
    /// Used directly by the task layer, which treats `302 Found` as success.
    pub(crate) async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        headers: &HeaderMap,
    ) -> Result<RawResponse> {
        let resp = self.send(method, path, body, headers).await?;
        let status = resp.status();
        let resp_headers = resp.headers().clone();
        let body = resp.bytes().await.map_err(|source| DirectorError::Transport {
            path: path.to_string(),
            source,
        })?;
        Ok(RawResponse {
            status,
            headers: resp_headers,
            body,
        })
    }

    async fn execute_checked(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        headers: &HeaderMap,
    ) -> Result<RawResponse> {
        let resp = self.execute(method, path, body, headers).await?;
        ensure_success(resp, path)
    }
}

/// Turns a non-2xx response into `DirectorError::Endpoint`.
pub(crate) fn ensure_success(resp: RawResponse, path: &str) -> Result<RawResponse> {
    if resp.status.is_success() {
        Ok(resp)
    } else {
        Err(DirectorError::Endpoint {
            status: resp.status,
            path: path.to_string(),
            body: String::from_utf8_lossy(&resp.body).into_owned(),
        })
    }
}

/// Resolves when `cancel` fires; never resolves without a token.
pub(crate) async fn cancelled(cancel: Option<&CancellationToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

#[async_trait]
impl SyncOp for ClientRequest {
    fn with_context(&self, id: &str) -> Self {
        ClientRequest {
            context_id: Some(id.to_string()),
            ..self.clone()
        }
    }

    async fn get<T: DeserializeOwned + Send>(&self, path: &str) -> Result<T> {
        let resp = self.raw_get(path, &HeaderMap::new()).await?;
        serde_json::from_slice(&resp.body).map_err(|source| DirectorError::Decode {
            path: path.to_string(),
            source,
        })
    }

    async fn raw_get(&self, path: &str, headers: &HeaderMap) -> Result<RawResponse> {
        self.execute_checked(Method::GET, path, None, headers).await
    }

    async fn raw_get_to(
        &self,
        path: &str,
        out: &mut (dyn AsyncWrite + Unpin + Send),
        headers: &HeaderMap,
        cancel: Option<&CancellationToken>,
    ) -> Result<RawResponse> {
        let operation = || DirectorError::Cancelled {
            operation: format!("GET '{path}'"),
        };

        let mut resp = tokio::select! {
            _ = cancelled(cancel) => return Err(operation()),
            resp = self.send(Method::GET, path, None, headers) => resp?,
        };

        let status = resp.status();
        let resp_headers = resp.headers().clone();
        if !status.is_success() {
            let body = match resp.bytes().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(
                        path,
                        status = status.as_u16(),
                        error = %e,
                        "failed to read error body"
                    );
                    Bytes::new()
                }
            };
            return Err(DirectorError::Endpoint {
                status,
                path: path.to_string(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        loop {
            let chunk = tokio::select! {
                _ = cancelled(cancel) => return Err(operation()),
                chunk = resp.chunk() => chunk.map_err(|source| DirectorError::Transport {
                    path: path.to_string(),
                    source,
                })?,
            };
            let Some(chunk) = chunk else { break };
            out.write_all(&chunk)
                .await
                .map_err(|source| DirectorError::Io {
                    path: path.to_string(),
                    source,
                })?;
        }
        out.flush().await.map_err(|source| DirectorError::Io {
            path: path.to_string(),
            source,
        })?;

        Ok(RawResponse {
            status,
            headers: resp_headers,
            body: Bytes::new(),
        })
    }

    async fn raw_put(&self, path: &str, body: Bytes, headers: &HeaderMap) -> Result<RawResponse> {
        self.execute_checked(Method::PUT, path, Some(body), headers)
            .await
    }
}
