//! The director client: one synchronous and one task executor composed into
//! a single value.
//!
//! `Client` owns a [`SyncOp`] (normally [`ClientRequest`]) for operations that
//! complete in one exchange and an [`AsyncOp`] (normally
//! [`TaskClientRequest`]) for operations the director runs as a background
//! task. The domain operations themselves live next to their types:
//!
//! - [`crate::orphaned_vms`] — `orphaned_vms`
//! - [`crate::resurrection`] — `enable_resurrection_all`
//! - [`crate::cleanup`] — `clean_up`
//! - [`crate::resources`] — `download_resource_unchecked`
//! - [`crate::certificates`] — `certificate_expiry`
//!
//! A `Client` is immutable. [`Client::with_context`] builds a new client whose
//! executors are both scoped to the correlation id; the original keeps
//! sending unscoped requests. Both share the underlying connection pool.

use crate::config::DirectorConfig;
use crate::error::Result;
use crate::request::{ClientRequest, SyncOp};
use crate::task::{AsyncOp, PollConfig, TaskClientRequest};
use crate::time_parser::TimeParser;

/// Director client composed of a sync and a task executor.
#[derive(Debug, Clone)]
pub struct Client<R = ClientRequest, T = TaskClientRequest> {
    pub(crate) client_request: R,
    pub(crate) task_client_request: T,
    pub(crate) time_parser: TimeParser,
}

impl Client {
    /// Builds an unscoped client from validated settings. Both executors
    /// share one connection pool.
    pub fn from_config(config: &DirectorConfig) -> Result<Self> {
        let request = ClientRequest::from_config(config)?;
        let task = TaskClientRequest::new(request.clone(), config.poll_config());
        Ok(Client::new(request, task))
    }

    /// A copy of `self` with different task polling settings.
    pub fn with_poll_config(&self, poll: PollConfig) -> Self {
        Client {
            client_request: self.client_request.clone(),
            task_client_request: self.task_client_request.with_poll_config(poll),
            time_parser: self.time_parser.clone(),
        }
    }
}

impl<R: SyncOp, T: AsyncOp> Client<R, T> {
    /// Composes a client from already-built executors.
    pub fn new(client_request: R, task_client_request: T) -> Self {
        Client {
            client_request,
            task_client_request,
            time_parser: TimeParser::default(),
        }
    }

    /// A copy of `self` that parses director timestamps with `parser`.
    pub fn with_time_parser(&self, parser: TimeParser) -> Self {
        Client {
            client_request: self.client_request.clone(),
            task_client_request: self.task_client_request.clone(),
            time_parser: parser,
        }
    }

    /// A new client whose requests all carry the correlation id `id`.
    pub fn with_context(&self, id: &str) -> Self {
        Client {
            client_request: self.client_request.with_context(id),
            task_client_request: self.task_client_request.with_context(id),
            time_parser: self.time_parser.clone(),
        }
    }

    /// The synchronous executor.
    pub fn client_request(&self) -> &R {
        &self.client_request
    }

    /// The task executor.
    pub fn task_client_request(&self) -> &T {
        &self.task_client_request
    }
}

/// In-memory executors that record every call, for unit tests of the
/// domain layer.
#[cfg(test)]
pub(crate) mod fakes {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use bytes::Bytes;
    use reqwest::StatusCode;
    use reqwest::header::HeaderMap;
    use serde::de::DeserializeOwned;
    use tokio::io::{AsyncWrite, AsyncWriteExt};
    use tokio_util::sync::CancellationToken;

    use crate::error::{DirectorError, Result};
    use crate::request::{RawResponse, SyncOp};
    use crate::task::AsyncOp;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) struct Call {
        pub method: &'static str,
        pub path: String,
        pub body: Option<String>,
        pub context_id: Option<String>,
    }

    pub(crate) type CallLog = Arc<Mutex<Vec<Call>>>;

    /// Answers GETs from a path → (status, body) table; unknown paths 404.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct FakeSync {
        pub log: CallLog,
        responses: Arc<HashMap<String, (StatusCode, String)>>,
        context_id: Option<String>,
    }

    impl FakeSync {
        pub fn with_responses(log: CallLog, responses: &[(&str, StatusCode, &str)]) -> Self {
            let responses = responses
                .iter()
                .map(|(path, status, body)| (path.to_string(), (*status, body.to_string())))
                .collect();
            FakeSync {
                log,
                responses: Arc::new(responses),
                context_id: None,
            }
        }

        fn record(&self, method: &'static str, path: &str, body: Option<&Bytes>) {
            self.log.lock().unwrap().push(Call {
                method,
                path: path.to_string(),
                body: body.map(|b| String::from_utf8_lossy(b).into_owned()),
                context_id: self.context_id.clone(),
            });
        }

        fn respond(&self, path: &str) -> Result<RawResponse> {
            let (status, body) = self
                .responses
                .get(path)
                .cloned()
                .unwrap_or((StatusCode::NOT_FOUND, "Not Found".to_string()));
            crate::request::ensure_success(
                RawResponse {
                    status,
                    headers: HeaderMap::new(),
                    body: Bytes::from(body),
                },
                path,
            )
        }
    }

    #[async_trait]
    impl SyncOp for FakeSync {
        fn with_context(&self, id: &str) -> Self {
            FakeSync {
                context_id: Some(id.to_string()),
                ..self.clone()
            }
        }

        async fn get<T: DeserializeOwned + Send>(&self, path: &str) -> Result<T> {
            self.record("GET", path, None);
            let resp = self.respond(path)?;
            serde_json::from_slice(&resp.body).map_err(|source| DirectorError::Decode {
                path: path.to_string(),
                source,
            })
        }

        async fn raw_get(&self, path: &str, _headers: &HeaderMap) -> Result<RawResponse> {
            self.record("GET", path, None);
            self.respond(path)
        }

        async fn raw_get_to(
            &self,
            path: &str,
            out: &mut (dyn AsyncWrite + Unpin + Send),
            _headers: &HeaderMap,
            _cancel: Option<&CancellationToken>,
        ) -> Result<RawResponse> {
            self.record("GET", path, None);
            let resp = self.respond(path)?;
            out.write_all(&resp.body).await.unwrap();
            Ok(resp)
        }

        async fn raw_put(
            &self,
            path: &str,
            body: Bytes,
            _headers: &HeaderMap,
        ) -> Result<RawResponse> {
            self.record("PUT", path, Some(&body));
            self.respond(path)
        }
    }

    /// Accepts every task and returns a fixed result payload.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct FakeTasks {
        pub log: CallLog,
        pub result: Bytes,
        context_id: Option<String>,
    }

    impl FakeTasks {
        pub fn returning(log: CallLog, result: &str) -> Self {
            FakeTasks {
                log,
                result: Bytes::from(result.to_string()),
                context_id: None,
            }
        }
    }

    #[async_trait]
    impl AsyncOp for FakeTasks {
        fn with_context(&self, id: &str) -> Self {
            FakeTasks {
                context_id: Some(id.to_string()),
                ..self.clone()
            }
        }

        async fn post_result(
            &self,
            path: &str,
            body: Bytes,
            _headers: &HeaderMap,
            _cancel: Option<&CancellationToken>,
        ) -> Result<Bytes> {
            self.log.lock().unwrap().push(Call {
                method: "POST",
                path: path.to_string(),
                body: Some(String::from_utf8_lossy(&body).into_owned()),
                context_id: self.context_id.clone(),
            });
            Ok(self.result.clone())
        }
    }
}
