//! Drives a running server over HTTP. Start it first, then:
//!
//! ```text
//! STORAGE_BACKEND=memory cargo run &
//! cargo test --test integration_auth_e2e -- --ignored
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::{StatusCode, redirect::Policy};
use serde_json::{Value, json};

struct TestContext {
    client: reqwest::Client,
    base_url: String,
}

impl TestContext {
    fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .cookie_store(true)
                .redirect(Policy::none())
                .build()
                .unwrap(),
            base_url: std::env::var("E2E_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.post(self.url(path)).json(&body).send().await.unwrap()
    }
}

fn timestamp() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis()
}

#[tokio::test]
#[ignore = "needs a running server"]
async fn test_register_login_logout() {
    let context = TestContext::new();
    let stamp = timestamp() % 1_000_000_000;
    let username = format!("user{}", stamp);
    let email = format!("{}@example.com", username);

    let response = context.get(&format!("/api/users/exists?email={}", email)).await;
    assert_eq!(response.json::<Value>().await.unwrap()["response"], false);

    let response = context
        .post(
            "/api/auth/register",
            json!({
                "username": username,
                "email": email,
                "password": "SecurePass123!@#",
                "confirm-password": "SecurePass123!@#",
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED, "Registration failed");

    let response = context
        .post(
            "/api/auth/login",
            json!({ "email": email, "password": "WrongPass123!@#" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = context
        .post(
            "/api/auth/login",
            json!({ "email": email, "password": "SecurePass123!@#" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK, "Login failed");

    let response = context.get("/api/home").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], format!("Hey, still there {}?", username));

    let response = context.get("/api/users/me").await;
    let me: Value = response.json().await.unwrap();
    assert_eq!(me["email"], email);
    assert!(me.get("password_hash").is_none());

    let response = context.post("/api/auth/logout", json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], format!("Bye {}!", username));

    let response = context.get("/api/home").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "/login");
}
