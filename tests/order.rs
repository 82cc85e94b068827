mod common;

use common::TestApp;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_checkout_places_order() {
    let app = TestApp::spawn().await;
    let seller = app.account("seller@example.com", "seller").await;
    let buyer = app.account("buyer@example.com", "buyer").await;
    let mug = app.create_product(&seller, "Mug", 7.5, 5).await;
    let plate = app.create_product(&seller, "Plate", 2.0, 5).await;
    let address = app.create_address(&buyer, "Main street 1").await;

    app.add_to_cart(&buyer, mug["id"].as_str().unwrap(), 2).await;
    let plate_bag = app.add_to_cart(&buyer, plate["id"].as_str().unwrap(), 1).await;
    app.patch(&format!("/api/cart/{}/select", plate_bag["id"]), &buyer)
        .json(&json!({ "is_selected": true }))
        .send()
        .await
        .expect("Failed to send select request");

    let response = app
        .post("/api/orders", &buyer)
        .json(&json!({ "address_id": address["id"] }))
        .send()
        .await
        .expect("Failed to send checkout request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let order: Value = response.json().await.expect("Failed to parse order");
    assert_eq!(order["total_in_cents"], 1500);
    assert_eq!(order["status"], "placed");
    assert_eq!(order["address"]["id"], address["id"]);
    assert_eq!(order["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(order["items"][0]["product_id"], mug["id"]);
    assert_eq!(order["items"][0]["item_count"], 2);

    // Stock went down and only the unselected plate is left in the cart.
    let stored: Value = app
        .client
        .get(app.url(&format!("/api/products/{}", mug["id"].as_str().unwrap())))
        .send()
        .await
        .expect("Failed to send product request")
        .json()
        .await
        .expect("Failed to parse product");
    assert_eq!(stored["stock"], 3);

    let cart: Vec<Value> = app
        .get("/api/cart", &buyer)
        .send()
        .await
        .expect("Failed to send cart request")
        .json()
        .await
        .expect("Failed to parse cart");
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0]["product_id"], plate["id"]);

    let detail: Value = app
        .get(&format!("/api/orders/{}", order["id"]), &buyer)
        .send()
        .await
        .expect("Failed to send order request")
        .json()
        .await
        .expect("Failed to parse order");
    assert_eq!(detail["items"][0]["item"]["title"], "Mug");
    assert_eq!(detail["items"][0]["item"]["price_in_cents"], 750);

    let orders: Vec<Value> = app
        .get("/api/orders", &buyer)
        .send()
        .await
        .expect("Failed to send orders request")
        .json()
        .await
        .expect("Failed to parse orders");
    assert_eq!(orders.len(), 1);
}

#[tokio::test]
async fn test_checkout_opens_a_fresh_cart() {
    let app = TestApp::spawn().await;
    let seller = app.account("seller@example.com", "seller").await;
    let buyer = app.account("buyer@example.com", "buyer").await;
    let mug = app.create_product(&seller, "Mug", 1.0, 5).await;
    let address = app.create_address(&buyer, "Main street 1").await;
    let mug_id = mug["id"].as_str().unwrap();

    app.add_to_cart(&buyer, mug_id, 1).await;
    let response = app
        .post("/api/orders", &buyer)
        .json(&json!({ "address_id": address["id"] }))
        .send()
        .await
        .expect("Failed to send checkout request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let count: i64 = app
        .get("/api/cart/count", &buyer)
        .send()
        .await
        .expect("Failed to send count request")
        .json()
        .await
        .expect("Failed to parse count");
    assert_eq!(count, 0);

    let bag = app.add_to_cart(&buyer, mug_id, 1).await;
    assert_eq!(bag["item_count"], 1);
}

#[tokio::test]
async fn test_checkout_errors() {
    let app = TestApp::spawn().await;
    let seller = app.account("seller@example.com", "seller").await;
    let buyer = app.account("buyer@example.com", "buyer").await;
    let other = app.account("other@example.com", "buyer").await;
    let mug = app.create_product(&seller, "Mug", 1.0, 2).await;
    let address = app.create_address(&buyer, "Main street 1").await;
    let foreign = app.create_address(&other, "Elsewhere 9").await;

    let checkout = |address_id: &Value| {
        app.post("/api/orders", &buyer)
            .json(&json!({ "address_id": address_id }))
            .send()
    };

    let response = checkout(&address["id"]).await.expect("Failed to send checkout");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.add_to_cart(&buyer, mug["id"].as_str().unwrap(), 3).await;

    let response = checkout(&foreign["id"]).await.expect("Failed to send checkout");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = checkout(&address["id"]).await.expect("Failed to send checkout");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let orders: Vec<Value> = app
        .get("/api/orders", &buyer)
        .send()
        .await
        .expect("Failed to send orders request")
        .json()
        .await
        .expect("Failed to parse orders");
    assert!(orders.is_empty());

    let response = app
        .get("/api/orders/999", &buyer)
        .send()
        .await
        .expect("Failed to send order request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ordered_products_and_addresses_cannot_be_deleted() {
    let app = TestApp::spawn().await;
    let seller = app.account("seller@example.com", "seller").await;
    let buyer = app.account("buyer@example.com", "buyer").await;
    let mug = app.create_product(&seller, "Mug", 1.0, 5).await;
    let address = app.create_address(&buyer, "Main street 1").await;

    app.add_to_cart(&buyer, mug["id"].as_str().unwrap(), 1).await;
    let response = app
        .post("/api/orders", &buyer)
        .json(&json!({ "address_id": address["id"] }))
        .send()
        .await
        .expect("Failed to send checkout request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .delete(
            &format!("/api/seller/products/{}", mug["id"].as_str().unwrap()),
            &seller,
        )
        .send()
        .await
        .expect("Failed to send delete request");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .delete(&format!("/api/addresses/{}", address["id"]), &buyer)
        .send()
        .await
        .expect("Failed to send delete request");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
