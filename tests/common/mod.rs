//! Shared helpers for the wiremock-backed flow tests.

#![allow(dead_code)]

use std::time::Duration;

use director_client::{Client, DirectorConfig, DirectorImpl, PollConfig};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Polling settings fast enough for tests.
pub fn fast_poll() -> PollConfig {
    PollConfig::new(Duration::from_millis(10), Duration::from_secs(5))
}

/// Installs a test-writer tracing subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A client pointed at the mock server, polling with [`fast_poll`].
pub fn mock_client(server: &MockServer) -> Client {
    init_tracing();
    Client::from_config(&DirectorConfig::new(&server.uri()))
        .expect("mock config is valid")
        .with_poll_config(fast_poll())
}

/// A director façade pointed at the mock server.
pub fn mock_director(server: &MockServer) -> DirectorImpl {
    DirectorImpl::new(mock_client(server))
}

/// Mounts `GET /tasks/{id}` answering `state`, and the result endpoint.
pub async fn mount_task(server: &MockServer, id: u64, state: &str, result: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/tasks/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": id,
            "state": state,
            "description": "clean up",
            "result": result,
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/tasks/{id}/output")))
        .and(query_param("type", "result"))
        .respond_with(ResponseTemplate::new(200).set_body_string(result))
        .mount(server)
        .await;
}
