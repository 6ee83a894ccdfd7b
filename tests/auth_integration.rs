//! Login, tokens, password reset and the authorization guard over HTTP

mod common;

use common::{spawn_app, spawn_app_with, spawn_app_with_relay_delay, ADMIN_EMAIL, ADMIN_PASSWORD};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use wellness_academy::models::Role;

fn reset_token_from(email: &Value) -> String {
    let text = email["text"].as_str().expect("Email has no text part");
    let start = text.find("token=").expect("No reset link in email") + "token=".len();
    let raw: String = text[start..]
        .chars()
        .take_while(|c| !c.is_whitespace())
        .collect();
    urlencoding::decode(&raw).unwrap().into_owned()
}

// --- Login ---

#[tokio::test]
async fn login_returns_token_pair_for_valid_credentials() {
    let app = spawn_app().await;

    let response = app
        .post(
            "/auth/login",
            &json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
            None,
        )
        .await;

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert!(body["accessToken"].is_string());
    assert!(body["refreshToken"].is_string());
    assert_eq!(body["tokenType"], "Bearer");
    assert_eq!(body["user"]["email"], ADMIN_EMAIL);
    assert_eq!(body["user"]["role"], "ADMIN");
    assert!(body["user"].get("passwordHash").is_none());
}

#[tokio::test]
async fn login_returns_401_for_wrong_password_and_unknown_email() {
    let app = spawn_app().await;

    for body in [
        json!({ "email": ADMIN_EMAIL, "password": "WrongPass123" }),
        json!({ "email": "nobody@academy.test", "password": ADMIN_PASSWORD }),
    ] {
        let response = app.post("/auth/login", &body, None).await;
        assert_eq!(401, response.status().as_u16());
        let error: Value = response.json().await.unwrap();
        assert_eq!(error["code"], "INVALID_CREDENTIALS");
    }
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/auth/login"))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(400, response.status().as_u16());
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["code"], "VALIDATION_ERROR");
}

// --- Tokens ---

#[tokio::test]
async fn refresh_issues_new_tokens_and_rejects_access_tokens() {
    let app = spawn_app().await;
    let login: Value = app
        .post(
            "/auth/login",
            &json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
            None,
        )
        .await
        .json()
        .await
        .unwrap();

    let response = app
        .post(
            "/auth/refresh",
            &json!({ "refreshToken": login["refreshToken"] }),
            None,
        )
        .await;
    assert_eq!(200, response.status().as_u16());

    let response = app
        .post(
            "/auth/refresh",
            &json!({ "refreshToken": login["accessToken"] }),
            None,
        )
        .await;
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn me_requires_a_valid_token() {
    let app = spawn_app().await;

    assert_eq!(401, app.get("/auth/me", None).await.status().as_u16());
    assert_eq!(
        401,
        app.get("/auth/me", Some("not-a-token")).await.status().as_u16()
    );

    let response = app.get("/auth/me", Some(&app.admin_token)).await;
    assert_eq!(200, response.status().as_u16());
    let me: Value = response.json().await.unwrap();
    assert_eq!(me["email"], ADMIN_EMAIL);
}

#[tokio::test]
async fn me_requires_a_token_even_when_enforcement_is_off() {
    let app = spawn_app_with(|s| s.auth.enforce = false).await;

    assert_eq!(401, app.get("/auth/me", None).await.status().as_u16());
}

// --- Guarded scopes ---

#[tokio::test]
async fn admin_routes_reject_missing_token() {
    let app = spawn_app().await;

    let response = app.get("/admin/formations", None).await;

    assert_eq!(401, response.status().as_u16());
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["code"], "MISSING_TOKEN");
}

#[tokio::test]
async fn content_routes_admit_staff_and_refuse_clients() {
    let app = spawn_app().await;
    let employee = app.token_with_role(Role::Employee);
    let client = app.token_with_role(Role::Client);

    assert_eq!(
        200,
        app.get("/admin/formations", Some(&employee)).await.status().as_u16()
    );
    assert_eq!(
        403,
        app.get("/admin/formations", Some(&client)).await.status().as_u16()
    );
}

#[tokio::test]
async fn user_routes_are_admin_only() {
    let app = spawn_app().await;
    let employee = app.token_with_role(Role::Employee);

    assert_eq!(
        403,
        app.get("/admin/users", Some(&employee)).await.status().as_u16()
    );
    assert_eq!(
        200,
        app.get("/admin/users", Some(&app.admin_token)).await.status().as_u16()
    );
}

#[tokio::test]
async fn disabled_enforcement_admits_anonymous_requests() {
    let app = spawn_app_with(|s| s.auth.enforce = false).await;

    let response = app
        .post("/admin/formations", &json!({ "title": "Open Door" }), None)
        .await;
    assert_eq!(201, response.status().as_u16());

    // A valid token is still honoured, including its role
    let client = app.token_with_role(Role::Client);
    assert_eq!(
        403,
        app.get("/admin/formations", Some(&client)).await.status().as_u16()
    );
}

// --- Password reset ---

#[tokio::test]
async fn forgot_password_answers_the_same_for_unknown_email() {
    let app = spawn_app().await;

    let known: Value = app
        .post("/auth/forgot-password", &json!({ "email": ADMIN_EMAIL }), None)
        .await
        .json()
        .await
        .unwrap();
    let unknown = app
        .post(
            "/auth/forgot-password",
            &json!({ "email": "ghost@academy.test" }),
            None,
        )
        .await;

    assert_eq!(200, unknown.status().as_u16());
    let unknown: Value = unknown.json().await.unwrap();
    assert_eq!(known["message"], unknown["message"]);
    assert_eq!(app.wait_for_emails(1).await.len(), 1);
    assert_eq!(app.settled_emails().await.len(), 1);
}

#[tokio::test]
async fn forgot_password_latency_does_not_depend_on_the_account() {
    let relay_delay = Duration::from_millis(800);
    let app = spawn_app_with_relay_delay(relay_delay, |_| {}).await;

    let mut elapsed = Vec::new();
    for email in [ADMIN_EMAIL, "ghost@academy.test"] {
        let started = Instant::now();
        let response = app
            .post("/auth/forgot-password", &json!({ "email": email }), None)
            .await;
        assert_eq!(200, response.status().as_u16());
        elapsed.push(started.elapsed());
    }

    // Neither answer waits for the relay
    for took in &elapsed {
        assert!(*took < Duration::from_millis(500), "answered after {:?}", took);
    }
    let emails = app.wait_for_emails(1).await;
    assert_eq!(emails[0]["to"], ADMIN_EMAIL);
}

#[tokio::test]
async fn reset_link_sets_a_new_password_once() {
    let app = spawn_app().await;

    app.post("/auth/forgot-password", &json!({ "email": ADMIN_EMAIL }), None)
        .await;
    let emails = app.wait_for_emails(1).await;
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0]["to"], ADMIN_EMAIL);
    let token = reset_token_from(&emails[0]);
    assert_eq!(token.len(), 64);

    let short = app
        .post(
            "/auth/reset-password",
            &json!({ "token": token, "newPassword": "short" }),
            None,
        )
        .await;
    assert_eq!(400, short.status().as_u16());

    let response = app
        .post(
            "/auth/reset-password",
            &json!({ "token": token, "newPassword": "FreshStart42" }),
            None,
        )
        .await;
    assert_eq!(200, response.status().as_u16());

    let login = app
        .post(
            "/auth/login",
            &json!({ "email": ADMIN_EMAIL, "password": "FreshStart42" }),
            None,
        )
        .await;
    assert_eq!(200, login.status().as_u16());

    let reused = app
        .post(
            "/auth/reset-password",
            &json!({ "token": token, "newPassword": "AnotherOne42" }),
            None,
        )
        .await;
    assert_eq!(400, reused.status().as_u16());
}

#[tokio::test]
async fn forgot_password_succeeds_when_email_relay_is_down() {
    let app = spawn_app_with(|s| {
        s.email_client.base_url = "http://127.0.0.1:9".to_string();
        s.email_client.timeout_milliseconds = 200;
    })
    .await;

    let response = app
        .post("/auth/forgot-password", &json!({ "email": ADMIN_EMAIL }), None)
        .await;

    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn change_password_checks_the_current_password() {
    let app = spawn_app().await;

    let wrong = app
        .post(
            "/auth/change-password",
            &json!({ "currentPassword": "Nope12345", "newPassword": "Changed123" }),
            Some(&app.admin_token),
        )
        .await;
    assert_eq!(401, wrong.status().as_u16());

    let ok = app
        .post(
            "/auth/change-password",
            &json!({ "currentPassword": ADMIN_PASSWORD, "newPassword": "Changed123" }),
            Some(&app.admin_token),
        )
        .await;
    assert_eq!(200, ok.status().as_u16());

    let login = app
        .post(
            "/auth/login",
            &json!({ "email": ADMIN_EMAIL, "password": "Changed123" }),
            None,
        )
        .await;
    assert_eq!(200, login.status().as_u16());
}
