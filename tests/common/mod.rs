#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use uuid::Uuid;

use sss_case_api::auth::{generate_jwt, Claims, JwtIdentityProvider};
use sss_case_api::clock::FixedClock;
use sss_case_api::database::MemoryStore;
use sss_case_api::{router, AppState};

pub const SECRET: &str = "integration-test-secret";
pub const COOKIE: &str = "sb-access-token";

pub const STAFF: &str = "aaaaaaaa-0000-4000-8000-000000000001";
pub const STAFF_NO_NAME: &str = "aaaaaaaa-0000-4000-8000-000000000002";
pub const TEACHER: &str = "aaaaaaaa-0000-4000-8000-000000000003";
pub const PARENT: &str = "aaaaaaaa-0000-4000-8000-000000000004";
pub const UNPROVISIONED: &str = "aaaaaaaa-0000-4000-8000-0000000000ff";

pub const ANA: &str = "bbbbbbbb-0000-4000-8000-000000000001";
pub const BEN: &str = "bbbbbbbb-0000-4000-8000-000000000002";
pub const CHLOE: &str = "bbbbbbbb-0000-4000-8000-000000000003";

pub const CASE_ANA_URGENT: &str = "cccccccc-0000-4000-8000-000000000001";
pub const CASE_BEN_URGENT: &str = "cccccccc-0000-4000-8000-000000000002";
pub const CASE_ANA_CLOSED: &str = "cccccccc-0000-4000-8000-000000000003";
pub const CASE_BEN_ROUTINE: &str = "cccccccc-0000-4000-8000-000000000004";
pub const CASE_CHLOE_ROUTINE: &str = "cccccccc-0000-4000-8000-000000000005";

pub const CHECK_IN: &str = "dddddddd-0000-4000-8000-000000000001";
pub const SOCIAL_GROUP: &str = "dddddddd-0000-4000-8000-000000000002";
pub const HOMEWORK_CLUB: &str = "dddddddd-0000-4000-8000-000000000003";
pub const READING: &str = "dddddddd-0000-4000-8000-000000000004";

pub const REFERRAL_FILE: &str = "99999999-0000-4000-8000-000000000001";

const SEED: &str = include_str!("../../fixtures/seed.yaml");

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date")
}

/// Router on an ephemeral port over a freshly seeded store. Each test gets its own.
pub struct TestServer {
    pub base_url: String,
    client: reqwest::Client,
}

pub async fn spawn() -> Result<TestServer> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let store = MemoryStore::from_yaml(SEED).context("seed fixture failed to load")?;
    let identity = JwtIdentityProvider::new(SECRET, None, COOKIE)?;
    let state = AppState::new(Arc::new(store), Arc::new(identity), Arc::new(FixedClock::on(today())));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router(state)).await;
    });

    Ok(TestServer {
        base_url: format!("http://{}", addr),
        client: reqwest::Client::new(),
    })
}

pub fn token_for(user_id: &str) -> String {
    let id = Uuid::parse_str(user_id).expect("valid user id");
    generate_jwt(&Claims::new(id, None, 1), SECRET).expect("token")
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    /// Request authenticated as `user_id` through the Authorization header.
    pub fn as_user(&self, user_id: &str, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path)).bearer_auth(token_for(user_id))
    }

    pub fn staff(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.as_user(STAFF, method, path)
    }

    /// GET as staff, returning status and envelope.
    pub async fn staff_get(&self, path: &str) -> Result<(StatusCode, Value)> {
        envelope(self.staff(reqwest::Method::GET, path).send().await?).await
    }
}

pub async fn envelope(response: Response) -> Result<(StatusCode, Value)> {
    let status = response.status();
    let body = response.json::<Value>().await.context("response body is not JSON")?;
    Ok((status, body))
}

/// `id` of every row in `data`, in order.
pub fn ids(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .map(|rows| rows.iter().filter_map(|r| r["id"].as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}
