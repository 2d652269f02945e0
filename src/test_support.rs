//! Shared helpers for tests: a fake Messages API endpoint and a config pointing at it.

use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::Value;

use crate::config::Config;

struct FakeState {
    status: StatusCode,
    body: String,
    captured: Mutex<Vec<(HeaderMap, Value)>>,
}

pub struct FakeUpstream {
    pub endpoint: String,
    state: Arc<FakeState>,
}

impl FakeUpstream {
    /// Requests received so far, as (headers, JSON body).
    pub fn captured(&self) -> Vec<(HeaderMap, Value)> {
        self.state.captured.lock().unwrap().clone()
    }
}

/// Serve a canned reply on `127.0.0.1:<random>/v1/messages`.
pub async fn spawn_upstream(status: StatusCode, body: String) -> FakeUpstream {
    let state = Arc::new(FakeState {
        status,
        body,
        captured: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/v1/messages", post(fake_messages))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeUpstream {
        endpoint: format!("http://{}/v1/messages", addr),
        state,
    }
}

async fn fake_messages(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    state.captured.lock().unwrap().push((headers, body));
    (state.status, state.body.clone())
}

/// An endpoint nothing is listening on.
pub async fn closed_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/v1/messages", addr)
}

pub fn test_config(endpoint: &str) -> Config {
    Config {
        api_key: "test-key".to_string(),
        endpoint: endpoint.to_string(),
        ..Config::default()
    }
}
