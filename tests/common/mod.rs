#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use followgraph::app::visibility::VisibilityPolicy;
use followgraph::domain::user::PrivacyStatus;
use followgraph::infra::db::Db;
use followgraph::infra::store::{MemoryRelationshipStore, PgRelationshipStore, RelationshipStore};
use followgraph::AppState;

// ---------------------------------------------------------------------------
// TestApp: one in-memory store per test
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub state: AppState,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }

    /// `user_id`s of a listing response, in order.
    pub fn item_ids(&self) -> Vec<Uuid> {
        self.json()["items"]
            .as_array()
            .expect("response has no items")
            .iter()
            .map(|item| Uuid::parse_str(item["user_id"].as_str().unwrap()).unwrap())
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TestUser {
    pub id: Uuid,
}

pub async fn app() -> TestApp {
    TestApp::with_policy(VisibilityPolicy::default())
}

impl TestApp {
    pub fn with_policy(policy: VisibilityPolicy) -> Self {
        let store: Arc<dyn RelationshipStore> =
            Arc::new(MemoryRelationshipStore::new(Duration::from_secs(2)));
        let state = AppState::new(store, policy);
        let router = followgraph::http::router(state.clone());
        TestApp { router, state }
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(&self, method: Method, path: &str, caller: Option<Uuid>) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        if let Some(caller) = caller {
            builder = builder.header("x-user-id", caller.to_string());
        }

        let request = builder.body(Body::empty()).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    pub async fn get(&self, path: &str, caller: &TestUser) -> TestResponse {
        self.request(Method::GET, path, Some(caller.id)).await
    }

    pub async fn post(&self, path: &str, caller: &TestUser) -> TestResponse {
        self.request(Method::POST, path, Some(caller.id)).await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Registers a user directly in the store, the way the account service would.
    pub async fn create_user(&self, privacy: PrivacyStatus) -> TestUser {
        let id = Uuid::new_v4();
        self.state
            .store
            .upsert_user(id, privacy)
            .await
            .expect("upsert_user failed");
        TestUser { id }
    }

    pub async fn public_user(&self) -> TestUser {
        self.create_user(PrivacyStatus::Public).await
    }

    pub async fn private_user(&self) -> TestUser {
        self.create_user(PrivacyStatus::Private).await
    }

    pub async fn follow(&self, caller: &TestUser, target: &TestUser) -> TestResponse {
        self.post(&format!("/v1/users/{}/follow", target.id), caller).await
    }

    pub async fn unfollow(&self, caller: &TestUser, target: &TestUser) -> TestResponse {
        self.post(&format!("/v1/users/{}/unfollow", target.id), caller).await
    }

    pub async fn accept(&self, caller: &TestUser, requester: &TestUser) -> TestResponse {
        self.post(&format!("/v1/users/{}/accept", requester.id), caller).await
    }

    pub async fn deny(&self, caller: &TestUser, requester: &TestUser) -> TestResponse {
        self.post(&format!("/v1/users/{}/deny", requester.id), caller).await
    }

    pub async fn followed(&self, viewer: &TestUser, user: &TestUser, status: Option<&str>) -> TestResponse {
        let path = match status {
            Some(status) => format!("/v1/users/{}/followed?status={}", user.id, status),
            None => format!("/v1/users/{}/followed", user.id),
        };
        self.get(&path, viewer).await
    }

    pub async fn followers(&self, viewer: &TestUser, user: &TestUser, status: Option<&str>) -> TestResponse {
        let path = match status {
            Some(status) => format!("/v1/users/{}/followers?status={}", user.id, status),
            None => format!("/v1/users/{}/followers", user.id),
        };
        self.get(&path, viewer).await
    }

    /// (follower_count, followed_count) as served by `GET /v1/users/:id`.
    pub async fn counts(&self, user: &TestUser) -> (i64, i64) {
        let resp = self.get(&format!("/v1/users/{}", user.id), user).await;
        assert_eq!(resp.status, StatusCode::OK);
        let body = resp.json();
        (
            body["follower_count"].as_i64().unwrap(),
            body["followed_count"].as_i64().unwrap(),
        )
    }
}

// ---------------------------------------------------------------------------
// Postgres: opt-in through TEST_DATABASE_URL
// ---------------------------------------------------------------------------

/// Connects to `TEST_DATABASE_URL` and applies the schema. Returns `None`
/// when the variable is unset so the suite still passes without a database.
/// Tests share the database and stay apart by using fresh user ids.
pub async fn pg_store(lock_timeout: Duration) -> Option<(PgRelationshipStore, PgPool)> {
    let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping postgres test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(8)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&database_url)
        .await
        .expect("cannot connect to test database");

    let db = Db::from_pool(pool.clone());
    db.migrate().await.expect("migrations failed");

    Some((PgRelationshipStore::new(db, lock_timeout), pool))
}
