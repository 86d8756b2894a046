//! Order and payment flows driven end to end: stock accounting across
//! creation and cancellation, and the double-payment guard.

mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn seller_with_product(base_url: &str, stock: i32, price: f64) -> Result<(String, Value)> {
    let (seller_token, seller) = common::register_user(base_url).await?;
    common::assign_role(seller["id"].as_str().expect("seller id"), "seller").await?;

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{base_url}/api/products"))
        .bearer_auth(&seller_token)
        .json(&json!({ "title": "Limited widget", "price": price, "stock": stock }))
        .send()
        .await?;
    anyhow::ensure!(
        res.status() == StatusCode::OK,
        "product create failed: {}",
        res.status()
    );
    let product = res.json::<Value>().await?["data"].clone();
    Ok((seller_token, product))
}

async fn product_stock(base_url: &str, product_id: &str) -> Result<i64> {
    let res = reqwest::get(format!("{base_url}/products/{product_id}")).await?;
    let body = res.json::<Value>().await?;
    body["data"]["stock"]
        .as_i64()
        .ok_or_else(|| anyhow::anyhow!("missing stock in {body}"))
}

#[tokio::test]
async fn order_lifecycle_keeps_stock_consistent() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let (seller_token, product) = seller_with_product(&server.base_url, 5, 10.0).await?;
    let product_id = product["id"].as_str().expect("product id");
    let (buyer_token, _) = common::register_user(&server.base_url).await?;

    // ordering more than available is rejected and leaves stock untouched
    let res = client
        .post(format!("{}/api/orders", server.base_url))
        .bearer_auth(&buyer_token)
        .json(&json!({ "items": [{ "product_id": product_id, "quantity": 6 }] }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(product_stock(&server.base_url, product_id).await?, 5);

    // a valid order decrements stock
    let res = client
        .post(format!("{}/api/orders", server.base_url))
        .bearer_auth(&buyer_token)
        .json(&json!({ "items": [{ "product_id": product_id, "quantity": 3 }] }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let order = res.json::<Value>().await?["data"].clone();
    assert_eq!(product_stock(&server.base_url, product_id).await?, 2);

    // cancellation by the involved seller restores it
    let order_id = order["id"].as_str().expect("order id");
    let res = client
        .put(format!("{}/api/orders/{order_id}/status", server.base_url))
        .bearer_auth(&seller_token)
        .json(&json!({ "status": "cancelled" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(product_stock(&server.base_url, product_id).await?, 5);

    Ok(())
}

#[tokio::test]
async fn order_cannot_be_paid_twice() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let (_seller_token, product) = seller_with_product(&server.base_url, 3, 25.0).await?;
    let product_id = product["id"].as_str().expect("product id");
    let (buyer_token, _) = common::register_user(&server.base_url).await?;

    let res = client
        .post(format!("{}/api/orders", server.base_url))
        .bearer_auth(&buyer_token)
        .json(&json!({ "items": [{ "product_id": product_id, "quantity": 1 }] }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let order_id = res.json::<Value>().await?["data"]["id"]
        .as_str()
        .expect("order id")
        .to_string();

    let res = client
        .post(format!("{}/api/payments/process", server.base_url))
        .bearer_auth(&buyer_token)
        .json(&json!({ "order_id": order_id, "method": "card" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/api/payments/process", server.base_url))
        .bearer_auth(&buyer_token)
        .json(&json!({ "order_id": order_id, "method": "card" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body = res.json::<Value>().await?;
    assert_eq!(body["code"], "CONFLICT");

    Ok(())
}
