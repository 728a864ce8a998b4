//! Common test utilities for server integration tests.
//!
//! Builds the full router in-process over a fresh queue with a manual clock,
//! so tests drive real handlers without binding a port.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use codenews_core::{
    create_authenticator, load_config_from_str,
    testing::{ManualClock, ScriptedFaults},
    Config, InMemoryTicketStore, SqliteTicketStore, TicketQueue, TicketStore,
};
use codenews_server::{api::create_router, state::AppState};

pub use codenews_core::testing::fixtures;

/// Auth setup for a fixture.
pub enum TestAuth {
    None,
    /// `(key, user_id, role)` entries.
    ApiKeys(Vec<(&'static str, &'static str, &'static str)>),
}

pub struct TestConfig {
    pub auth: TestAuth,
    pub sqlite: bool,
    pub enforce_unique_codes: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            auth: TestAuth::None,
            sqlite: false,
            enforce_unique_codes: true,
        }
    }
}

impl TestConfig {
    fn to_toml(&self) -> String {
        let mut toml = String::new();
        match &self.auth {
            TestAuth::None => toml.push_str("[auth]\nmethod = \"none\"\n"),
            TestAuth::ApiKeys(keys) => {
                toml.push_str("[auth]\nmethod = \"api_key\"\n");
                for (key, user_id, role) in keys {
                    toml.push_str(&format!(
                        "\n[[auth.api_keys]]\nkey = \"{}\"\nuser_id = \"{}\"\nrole = \"{}\"\n",
                        key, user_id, role
                    ));
                }
            }
        }
        toml.push_str(&format!(
            "\n[queue]\nenforce_unique_codes = {}\n",
            self.enforce_unique_codes
        ));
        toml
    }
}

/// Test fixture that holds the router and the queue's collaborators.
pub struct TestFixture {
    pub router: Router,
    pub store: Arc<dyn TicketStore>,
    pub clock: Arc<ManualClock>,
    pub faults: Arc<ScriptedFaults>,
    temp_dir: Option<TempDir>,
}

/// Response from a test request.
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    /// Fixture with no auth and an in-memory store.
    pub fn new() -> Self {
        Self::with_config(TestConfig::default())
    }

    pub fn with_config(test_config: TestConfig) -> Self {
        let config: Config =
            load_config_from_str(&test_config.to_toml()).expect("Failed to parse test config");

        let (store, temp_dir): (Arc<dyn TicketStore>, Option<TempDir>) = if test_config.sqlite {
            let temp_dir = TempDir::new().expect("Failed to create temp dir");
            let store = SqliteTicketStore::new(&temp_dir.path().join("test.db"))
                .expect("Failed to create ticket store");
            (Arc::new(store), Some(temp_dir))
        } else {
            (Arc::new(InMemoryTicketStore::new()), None)
        };

        let clock = Arc::new(ManualClock::new(fixtures::morning()));
        let faults = Arc::new(ScriptedFaults::new());
        let queue = TicketQueue::new(Arc::clone(&store))
            .with_clock(clock.clone())
            .with_faults(faults.clone())
            .with_policy(config.queue.policy())
            .with_profiles(config.queue.profile_policy());

        let authenticator =
            Arc::from(create_authenticator(&config.auth).expect("Failed to create authenticator"));
        let state = Arc::new(AppState::new(config, authenticator, Arc::new(queue)));

        Self {
            router: create_router(state),
            store,
            clock,
            faults,
            temp_dir,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send("GET", path, None, &[]).await
    }

    pub async fn get_as(&self, path: &str, api_key: &str) -> TestResponse {
        self.send("GET", path, None, &[("X-API-Key", api_key)])
            .await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.send("POST", path, Some(body.to_string()), &[]).await
    }

    pub async fn post_as(&self, path: &str, body: Value, api_key: &str) -> TestResponse {
        self.send("POST", path, Some(body.to_string()), &[("X-API-Key", api_key)])
            .await
    }

    /// POST with an empty body (the call-cycle commands take none).
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.send("POST", path, None, &[]).await
    }

    /// POST a raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.send("POST", path, Some(body.to_string()), &[]).await
    }

    /// Issue a ticket and return its id.
    pub async fn issue(&self, code: &str, priority: &str, procedure: &str) -> u64 {
        let response = self
            .post(
                "/api/v1/tickets",
                serde_json::json!({
                    "sequence_code": code,
                    "priority": priority,
                    "procedure": procedure,
                }),
            )
            .await;
        assert_eq!(
            response.status,
            StatusCode::CREATED,
            "issue {} failed: {}",
            code,
            response.body
        );
        response.body["id"].as_u64().expect("ticket id")
    }

    async fn send(
        &self,
        method: &str,
        path: &str,
        body: Option<String>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if body.is_some() {
            builder = builder.header("Content-Type", "application/json");
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder
            .body(body.map(Body::from).unwrap_or_else(Body::empty))
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}

/// Sequence codes of a JSON ticket list.
pub fn codes(body: &Value) -> Vec<String> {
    body.as_array()
        .expect("expected a JSON array")
        .iter()
        .map(|t| t["sequence_code"].as_str().unwrap_or_default().to_string())
        .collect()
}
