mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn product_listing_is_public() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/products?limit=5", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], true);
    assert!(body["data"].is_array());
    Ok(())
}

#[tokio::test]
async fn customers_cannot_create_products() -> Result<()> {
    let server = common::ensure_server().await?;
    let (token, _user) = common::register_user(&server.base_url).await?;

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/api/products", server.base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "title": "Widget",
            "price": 9.99,
            "stock": 3,
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn unknown_product_is_not_found() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!(
            "{}/products/00000000-0000-0000-0000-000000000000",
            server.base_url
        ))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}
