//! User administration over HTTP

mod common;

use common::spawn_app;
use serde_json::{json, Value};

#[tokio::test]
async fn admin_creates_user_with_generated_password() {
    let app = spawn_app().await;

    let created = app
        .admin_post(
            "/admin/users",
            json!({ "email": "coach@academy.test", "role": "EMPLOYEE", "firstName": "Sam" }),
            201,
        )
        .await;

    assert_eq!(created["user"]["role"], "EMPLOYEE");
    let password = created["generatedPassword"].as_str().unwrap();

    let response = app
        .post(
            "/auth/login",
            &json!({ "email": "coach@academy.test", "password": password }),
            None,
        )
        .await;
    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn admin_create_rejects_weak_password_and_duplicate_email() {
    let app = spawn_app().await;

    let weak = app
        .admin_post(
            "/admin/users",
            json!({ "email": "weak@academy.test", "password": "password" }),
            400,
        )
        .await;
    assert_eq!(weak["code"], "VALIDATION_ERROR");

    app.admin_post(
        "/admin/users",
        json!({ "email": "dup@academy.test", "password": "Strong123" }),
        201,
    )
    .await;
    let dup = app
        .admin_post(
            "/admin/users",
            json!({ "email": "DUP@academy.test", "password": "Strong123" }),
            400,
        )
        .await;
    assert_eq!(dup["code"], "CONFLICT");
}

#[tokio::test]
async fn admin_updates_and_deletes_user() {
    let app = spawn_app().await;
    let created = app
        .admin_post("/admin/users", json!({ "email": "temp@academy.test" }), 201)
        .await;
    let path = format!("/admin/users/{}", created["user"]["id"].as_str().unwrap());

    let response = app
        .put(&path, &json!({ "isActive": false, "lastName": "Doe" }), Some(&app.admin_token))
        .await;
    assert_eq!(200, response.status().as_u16());
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["isActive"], false);
    assert_eq!(updated["lastName"], "Doe");
    assert_eq!(updated["email"], "temp@academy.test");

    let response = app.delete(&path, Some(&app.admin_token)).await;
    assert_eq!(204, response.status().as_u16());
    let response = app.get(&path, Some(&app.admin_token)).await;
    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn admin_grants_enrollment() {
    let app = spawn_app().await;
    let formation = app
        .admin_post("/admin/formations", json!({ "title": "Nutrition" }), 201)
        .await;
    let path = format!("/admin/users/{}/enrollments", app.admin_id);

    let response = app
        .post(
            &path,
            &json!({ "formationId": formation["id"] }),
            Some(&app.admin_token),
        )
        .await;
    assert_eq!(200, response.status().as_u16());

    let enrollments = app.admin_get(&path).await;
    assert_eq!(enrollments.as_array().unwrap().len(), 1);
    assert_eq!(enrollments[0]["formationId"], formation["id"]);
}
