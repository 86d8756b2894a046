//! Promotion validation: discount math and the read-only guarantee of the
//! validate endpoint.

mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn seller_with_promotion(base_url: &str, body: Value) -> Result<(String, String)> {
    let (seller_token, seller) = common::register_user(base_url).await?;
    common::assign_role(seller["id"].as_str().expect("seller id"), "seller").await?;

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{base_url}/api/promotions"))
        .bearer_auth(&seller_token)
        .json(&body)
        .send()
        .await?;
    anyhow::ensure!(
        res.status() == StatusCode::OK,
        "promotion create failed: {}",
        res.status()
    );
    let code = res.json::<Value>().await?["data"]["code"]
        .as_str()
        .expect("promotion code")
        .to_string();
    Ok((seller_token, code))
}

fn unique_code(prefix: &str) -> String {
    format!("{prefix}{}", uuid::Uuid::new_v4().simple())
}

#[tokio::test]
async fn validate_returns_discount_without_consuming_usage() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let (token, code) = seller_with_promotion(
        &server.base_url,
        json!({
            "code": unique_code("SAVE"),
            "discount_type": "percentage",
            "discount_value": 20.0,
            "min_purchase": 50.0,
            "usage_limit": 1,
        }),
    )
    .await?;

    let res = client
        .post(format!("{}/api/promotions/validate", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "code": code, "cart_total": 100.0 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["discount_amount"], 20.0);
    assert_eq!(body["data"]["final_total"], 80.0);

    // re-validating at checkout must not burn the single-use slot
    let res = client
        .post(format!("{}/api/promotions/validate", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "code": code, "cart_total": 100.0 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn validate_enforces_min_purchase_and_caps_fixed_discounts() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let (token, code) = seller_with_promotion(
        &server.base_url,
        json!({
            "code": unique_code("FLAT"),
            "discount_type": "fixed",
            "discount_value": 500.0,
            "min_purchase": 50.0,
        }),
    )
    .await?;

    let res = client
        .post(format!("{}/api/promotions/validate", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "code": code, "cart_total": 10.0 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // a fixed discount larger than the cart never drives the total negative
    let res = client
        .post(format!("{}/api/promotions/validate", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "code": code, "cart_total": 100.0 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["discount_amount"], 100.0);
    assert_eq!(body["data"]["final_total"], 0.0);

    Ok(())
}
