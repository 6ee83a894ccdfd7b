//! Shared harness for the integration tests.
//!
//! Every test gets its own server on a random port backed by a fresh
//! in-memory store, plus a fake email relay that records what was sent.

#![allow(dead_code)]

use actix_web::{web, App, HttpResponse, HttpServer};
use serde_json::Value;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;
use wellness_academy::auth::{generate_token, hash_password, TokenPayload};
use wellness_academy::configuration::{get_configuration, Settings};
use wellness_academy::models::{NewUser, Role};
use wellness_academy::startup::run;
use wellness_academy::store::{AcademyStore, InMemoryStore};

pub const ADMIN_EMAIL: &str = "admin@academy.test";
pub const ADMIN_PASSWORD: &str = "AdminPass123";
pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

pub type Outbox = Arc<Mutex<Vec<Value>>>;

/// How long the fake relay waits before accepting a message
#[derive(Clone, Copy)]
struct RelayDelay(Duration);

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryStore>,
    pub settings: Settings,
    pub admin_id: Uuid,
    pub admin_token: String,
    pub outbox: Outbox,
    pub client: reqwest::Client,
}

async fn record_email(
    body: web::Json<Value>,
    outbox: web::Data<Outbox>,
    delay: web::Data<RelayDelay>,
) -> HttpResponse {
    if !delay.0.is_zero() {
        actix_web::rt::time::sleep(delay.0).await;
    }
    if let Ok(mut sent) = outbox.lock() {
        sent.push(body.into_inner());
    }
    HttpResponse::Ok().finish()
}

fn spawn_email_relay(delay: Duration) -> (String, Outbox) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let outbox: Outbox = Arc::new(Mutex::new(Vec::new()));

    let data = web::Data::new(outbox.clone());
    let delay = web::Data::new(RelayDelay(delay));
    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .app_data(delay.clone())
            .route("/email", web::post().to(record_email))
    })
    .listen(listener)
    .expect("Failed to bind email relay")
    .run();
    let _ = tokio::spawn(server);

    (format!("http://127.0.0.1:{}", port), outbox)
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Start the application after applying `customize` to the test settings
pub async fn spawn_app_with(customize: impl FnOnce(&mut Settings)) -> TestApp {
    spawn_app_with_relay_delay(Duration::ZERO, customize).await
}

/// Like `spawn_app_with`, with an email relay that answers after `delay`
pub async fn spawn_app_with_relay_delay(
    delay: Duration,
    customize: impl FnOnce(&mut Settings),
) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let (relay_url, outbox) = spawn_email_relay(delay);

    let mut settings = test_settings(&address);
    settings.email_client.base_url = relay_url;
    settings.email_client.timeout_milliseconds = 1000 + delay.as_millis() as u64;
    customize(&mut settings);

    let store = Arc::new(InMemoryStore::new());
    let admin = store
        .create_user(NewUser {
            email: ADMIN_EMAIL.to_string(),
            password_hash: hash_password(ADMIN_PASSWORD).unwrap(),
            first_name: Some("Ada".to_string()),
            last_name: None,
            role: Role::Admin,
            is_active: true,
            email_verified: true,
        })
        .await
        .expect("Failed to seed admin");
    let admin_token = token_for(&settings, admin.id, ADMIN_EMAIL, Role::Admin);

    let server = run(listener, store.clone(), settings.clone()).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        settings,
        admin_id: admin.id,
        admin_token,
        outbox,
        client: reqwest::Client::new(),
    }
}

/// Configuration the tests run with before any per-test customization
pub fn test_settings(address: &str) -> Settings {
    let mut settings = get_configuration().expect("Failed to read configuration.");
    settings.application.base_url = address.to_string();
    settings.auth.enforce = true;
    settings.payments.webhook_secret = Some(WEBHOOK_SECRET.to_string());
    settings
}

pub fn token_for(settings: &Settings, user_id: Uuid, email: &str, role: Role) -> String {
    generate_token(
        &TokenPayload {
            user_id,
            email: email.to_string(),
            role,
        },
        &settings.jwt,
    )
    .expect("Failed to generate token")
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Token for a made-up user of the given role; no account is created
    pub fn token_with_role(&self, role: Role) -> String {
        token_for(&self.settings, Uuid::new_v4(), "someone@academy.test", role)
    }

    pub async fn post(&self, path: &str, body: &Value, token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request.")
    }

    pub async fn put(&self, path: &str, body: &Value, token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.put(self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request.")
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request.")
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.delete(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request.")
    }

    /// POST as the seeded admin and return the JSON body, asserting `status`
    pub async fn admin_post(&self, path: &str, body: Value, status: u16) -> Value {
        let response = self.post(path, &body, Some(&self.admin_token)).await;
        assert_eq!(status, response.status().as_u16(), "POST {}", path);
        response.json().await.expect("Failed to parse response")
    }

    pub async fn admin_get(&self, path: &str) -> Value {
        let response = self.get(path, Some(&self.admin_token)).await;
        assert_eq!(200, response.status().as_u16(), "GET {}", path);
        response.json().await.expect("Failed to parse response")
    }

    /// Payment callback signed with the configured webhook secret
    pub async fn post_payment(&self, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url("/payments/complete"))
            .header("X-Webhook-Secret", WEBHOOK_SECRET)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub fn sent_emails(&self) -> Vec<Value> {
        self.outbox.lock().unwrap().clone()
    }

    /// Emails are sent in the background; poll the relay until `count` arrived
    pub async fn wait_for_emails(&self, count: usize) -> Vec<Value> {
        for _ in 0..50 {
            let sent = self.sent_emails();
            if sent.len() >= count {
                return sent;
            }
            actix_web::rt::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("Expected {} emails, relay received {}", count, self.sent_emails().len());
    }

    /// Give background sends a moment, then return whatever arrived
    pub async fn settled_emails(&self) -> Vec<Value> {
        actix_web::rt::time::sleep(Duration::from_millis(300)).await;
        self.sent_emails()
    }
}
