mod common;

use common::TestApp;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn addresses(app: &TestApp, token: &str) -> Vec<Value> {
    app.get("/api/addresses", token)
        .send()
        .await
        .expect("Failed to send list request")
        .json()
        .await
        .expect("Failed to parse addresses")
}

#[tokio::test]
async fn test_first_address_becomes_default() {
    let app = TestApp::spawn().await;
    let buyer = app.account("buyer@example.com", "buyer").await;

    let first = app.create_address(&buyer, "Main street 1").await;
    let second = app.create_address(&buyer, "Side street 2").await;
    assert_eq!(first["is_default"], true);
    assert_eq!(second["is_default"], false);

    let listed = addresses(&app, &buyer).await;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["id"], first["id"]);
}

#[tokio::test]
async fn test_setting_default_clears_the_others() {
    let app = TestApp::spawn().await;
    let buyer = app.account("buyer@example.com", "buyer").await;
    let first = app.create_address(&buyer, "Main street 1").await;
    let second = app.create_address(&buyer, "Side street 2").await;

    let response = app
        .put(&format!("/api/addresses/{}", second["id"]), &buyer)
        .json(&json!({
            "address_line1": "  Side street 2b ",
            "city": "Hamburg",
            "postal_code": "20095",
            "region": "Hamburg",
            "country": "Germany",
            "is_default": true
        }))
        .send()
        .await
        .expect("Failed to send update request");
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.expect("Failed to parse address");
    assert_eq!(updated["address_line1"], "Side street 2b");
    assert_eq!(updated["is_default"], true);

    let listed = addresses(&app, &buyer).await;
    let defaults: Vec<&Value> = listed.iter().filter(|a| a["is_default"] == true).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0]["id"], second["id"]);
    assert!(listed.iter().any(|a| a["id"] == first["id"]));
}

#[tokio::test]
async fn test_deleting_default_promotes_the_next() {
    let app = TestApp::spawn().await;
    let buyer = app.account("buyer@example.com", "buyer").await;
    let first = app.create_address(&buyer, "Main street 1").await;
    let second = app.create_address(&buyer, "Side street 2").await;

    let response = app
        .delete(&format!("/api/addresses/{}", first["id"]), &buyer)
        .send()
        .await
        .expect("Failed to send delete request");
    assert_eq!(response.status(), StatusCode::OK);

    let listed = addresses(&app, &buyer).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], second["id"]);
    assert_eq!(listed[0]["is_default"], true);
}

#[tokio::test]
async fn test_address_validation_and_ownership() {
    let app = TestApp::spawn().await;
    let owner = app.account("owner@example.com", "buyer").await;
    let intruder = app.account("intruder@example.com", "buyer").await;
    let address = app.create_address(&owner, "Main street 1").await;

    let response = app
        .post("/api/addresses", &owner)
        .json(&json!({
            "address_line1": " ",
            "city": "Berlin",
            "postal_code": "!!",
            "region": "Berlin",
            "country": "Germany"
        }))
        .send()
        .await
        .expect("Failed to send create request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert!(body["fields"]["address_line1"].is_array());
    assert!(body["fields"]["postal_code"].is_array());

    let path = format!("/api/addresses/{}", address["id"]);
    let response = app
        .put(&path, &intruder)
        .json(&json!({
            "address_line1": "Elsewhere 9",
            "city": "Berlin",
            "postal_code": "10115",
            "region": "Berlin",
            "country": "Germany"
        }))
        .send()
        .await
        .expect("Failed to send update request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .delete(&path, &intruder)
        .send()
        .await
        .expect("Failed to send delete request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert!(addresses(&app, &intruder).await.is_empty());
    assert_eq!(addresses(&app, &owner).await.len(), 1);
}
