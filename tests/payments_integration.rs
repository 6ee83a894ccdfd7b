//! Account provisioning from the payment callback

mod common;

use common::{spawn_app, spawn_app_with, test_settings};
use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::Arc;
use wellness_academy::configuration::get_configuration;
use wellness_academy::startup::run;
use wellness_academy::store::{AcademyStore, InMemoryStore};

#[tokio::test]
async fn payment_creates_account_and_mails_credentials() {
    let app = spawn_app().await;

    let response = app
        .post_payment(&json!({ "email": "Buyer@Example.com", "firstName": "Lena" }))
        .await;

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "message": "Payment processed" }));

    let emails = app.wait_for_emails(1).await;
    assert_eq!(emails[0]["to"], "buyer@example.com");
    assert!(emails[0]["html"].as_str().unwrap().contains("Lena"));

    let user = app
        .store
        .find_user_by_email("buyer@example.com")
        .await
        .unwrap()
        .expect("Account not created");
    assert!(user.is_active);
    assert!(user.email_verified);
    assert_eq!(user.first_name.as_deref(), Some("Lena"));
    assert!(app.store.find_profile(user.id).await.unwrap().is_some());
}

#[tokio::test]
async fn new_and_existing_buyers_get_the_same_answer() {
    let app = spawn_app().await;
    let body = json!({ "email": "twice@example.com" });

    let first: Value = app.post_payment(&body).await.json().await.unwrap();
    let second = app.post_payment(&body).await;

    assert_eq!(200, second.status().as_u16());
    let second: Value = second.json().await.unwrap();
    assert_eq!(first, second);
    assert!(second.get("userId").is_none());
    assert!(second.get("accountCreated").is_none());
}

#[tokio::test]
async fn repeated_payment_keeps_existing_account_and_enrolls() {
    let app = spawn_app().await;
    let formation = app
        .admin_post("/admin/formations", json!({ "title": "Biohacking 101" }), 201)
        .await;
    let formation_id = formation["id"].as_str().unwrap();

    app.post_payment(&json!({ "email": "repeat@example.com" })).await;
    let before = app
        .store
        .find_user_by_email("repeat@example.com")
        .await
        .unwrap()
        .unwrap();

    let response = app
        .post_payment(&json!({ "email": "repeat@example.com", "formationId": formation_id }))
        .await;
    assert_eq!(200, response.status().as_u16());

    let after = app
        .store
        .find_user_by_email("repeat@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(before.password_hash, after.password_hash);
    assert_eq!(before.updated_at, after.updated_at);
    // Only the first payment sent a welcome email
    app.wait_for_emails(1).await;
    assert_eq!(app.settled_emails().await.len(), 1);

    let enrollments = app.store.list_enrollments(after.id).await.unwrap();
    assert_eq!(enrollments.len(), 1);
    assert_eq!(enrollments[0].formation_id.to_string(), formation_id);

    // Enrolling twice is idempotent
    app.post_payment(&json!({ "email": "repeat@example.com", "formationId": formation_id }))
        .await;
    let enrollments = app.store.list_enrollments(after.id).await.unwrap();
    assert_eq!(enrollments.len(), 1);
}

#[tokio::test]
async fn payment_for_unknown_formation_creates_nothing() {
    let app = spawn_app().await;

    let response = app
        .post_payment(&json!({ "email": "lost@example.com", "formationId": uuid::Uuid::new_v4() }))
        .await;

    assert_eq!(404, response.status().as_u16());
    assert!(app
        .store
        .find_user_by_email("lost@example.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn payment_requires_valid_email() {
    let app = spawn_app().await;

    for body in [json!({}), json!({ "email": "not-an-email" })] {
        let response = app.post_payment(&body).await;
        assert_eq!(400, response.status().as_u16());
    }
}

#[tokio::test]
async fn unsigned_or_wrongly_signed_payment_is_rejected() {
    let app = spawn_app().await;
    let body = json!({ "email": "forged@example.com" });

    let unsigned = app.post("/payments/complete", &body, None).await;
    assert_eq!(401, unsigned.status().as_u16());

    let wrong = app
        .client
        .post(app.url("/payments/complete"))
        .header("X-Webhook-Secret", "guess")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(401, wrong.status().as_u16());

    assert!(app
        .store
        .find_user_by_email("forged@example.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn shipped_configuration_rejects_unsigned_payment() {
    let shipped = get_configuration().expect("Failed to read configuration.");
    assert!(shipped.auth.enforce);
    let app = spawn_app_with(|s| s.payments = shipped.payments.clone()).await;

    let response = app
        .post("/payments/complete", &json!({ "email": "anyone@example.com" }), None)
        .await;

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn server_refuses_to_start_without_webhook_secret() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let mut settings = test_settings("http://127.0.0.1");

    for secret in [None, Some(String::new())] {
        settings.payments.webhook_secret = secret;
        let listener = listener.try_clone().unwrap();
        let outcome = run(listener, Arc::new(InMemoryStore::new()), settings.clone());
        assert!(outcome.is_err());
    }
}

#[tokio::test]
async fn unsigned_payment_is_accepted_only_with_enforcement_off() {
    let app = spawn_app_with(|s| {
        s.auth.enforce = false;
        s.payments.webhook_secret = None;
    })
    .await;

    let response = app
        .post("/payments/complete", &json!({ "email": "dev@example.com" }), None)
        .await;

    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn payment_succeeds_when_email_relay_is_down() {
    let app = spawn_app_with(|s| {
        s.email_client.base_url = "http://127.0.0.1:9".to_string();
        s.email_client.timeout_milliseconds = 200;
    })
    .await;

    let response = app
        .post_payment(&json!({ "email": "offline@example.com" }))
        .await;

    assert_eq!(200, response.status().as_u16());
    assert!(app
        .store
        .find_user_by_email("offline@example.com")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn provisioned_account_can_sign_in_with_mailed_password() {
    let app = spawn_app().await;

    app.post_payment(&json!({ "email": "signin@example.com" })).await;
    let emails = app.wait_for_emails(1).await;
    let text = emails[0]["text"].as_str().unwrap();
    let password = text
        .lines()
        .find_map(|line| line.strip_prefix("Password: "))
        .expect("No password in welcome email")
        .to_string();

    let response = app
        .post(
            "/auth/login",
            &json!({ "email": "signin@example.com", "password": password }),
            None,
        )
        .await;
    assert_eq!(200, response.status().as_u16());
}
