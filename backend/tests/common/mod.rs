// Not every helper is used in every test
#![allow(dead_code)]

use std::{collections::HashSet, sync::Arc};

use axum::{body::Body, http::Request, response::Response, Router};
use backend::{middleware::BearerAuth, server, types::Environment, user_queue::UserRequestQueue};
use http_body_util::BodyExt;
use tower::ServiceExt;
use work_queue::{
    types::ReceiveRequest, InMemoryTransport, Producer, QueueMonitor, QueueTransport,
};

/// Token accepted by the test router
pub const TEST_TOKEN: &str = "test-token";

/// Router backed by an in-memory queue
pub struct TestSetup {
    pub router: Router,
    pub transport: Arc<InMemoryTransport>,
    pub queue_url: String,
}

impl TestSetup {
    pub async fn new() -> Self {
        Self::with_environment(Environment::Development).await
    }

    pub async fn with_environment(environment: Environment) -> Self {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .try_init()
            .ok();

        let transport = Arc::new(InMemoryTransport::new());
        let queue_url = transport
            .create_queue("backend-test", Default::default())
            .await
            .expect("Failed to create queue");

        let user_queue = Arc::new(UserRequestQueue::new(
            Producer::new(transport.clone(), queue_url.clone()),
            0,
        ));
        let monitor = QueueMonitor::new(transport.clone(), queue_url.clone());
        let auth = BearerAuth::new(HashSet::from([TEST_TOKEN.to_string()]));

        Self {
            router: server::router(environment, user_queue, monitor, auth),
            transport,
            queue_url,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed")
    }

    pub async fn post_json(&self, route: &str, payload: &serde_json::Value) -> Response {
        let request = Request::builder()
            .uri(route)
            .method("POST")
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {TEST_TOKEN}"))
            .body(Body::from(payload.to_string()))
            .expect("Failed to build request");
        self.send(request).await
    }

    pub async fn delete(&self, route: &str) -> Response {
        let request = Request::builder()
            .uri(route)
            .method("DELETE")
            .header("Authorization", format!("Bearer {TEST_TOKEN}"))
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }

    pub async fn get(&self, route: &str) -> Response {
        let request = Request::builder()
            .uri(route)
            .method("GET")
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }

    /// Receives every visible message body from the test queue
    pub async fn queued_bodies(&self) -> Vec<serde_json::Value> {
        self.transport
            .receive(
                &self.queue_url,
                ReceiveRequest {
                    max_messages: 10,
                    wait_time_seconds: 0,
                    visibility_timeout: 30,
                },
            )
            .await
            .expect("Failed to receive")
            .into_iter()
            .map(|message| serde_json::from_str(&message.body).expect("Invalid envelope"))
            .collect()
    }
}

pub async fn parse_body(response: Response) -> serde_json::Value {
    let body = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&body).expect("Invalid JSON body")
}
