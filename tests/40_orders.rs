mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn empty_order_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let (token, _user) = common::register_user(&server.base_url).await?;

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/api/orders", server.base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "items": [] }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["code"], "BAD_REQUEST");
    Ok(())
}

#[tokio::test]
async fn fresh_user_has_no_orders_or_notifications() -> Result<()> {
    let server = common::ensure_server().await?;
    let (token, _user) = common::register_user(&server.base_url).await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/orders/count", server.base_url))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["data"]["count"], 0);

    let res = client
        .get(format!("{}/api/notifications/count", server.base_url))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["data"]["unread"], 0);
    Ok(())
}

#[tokio::test]
async fn customers_cannot_read_commission_report() -> Result<()> {
    let server = common::ensure_server().await?;
    let (token, _user) = common::register_user(&server.base_url).await?;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/api/commissions", server.base_url))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}
