mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn register_then_login_roundtrip() -> Result<()> {
    let server = common::ensure_server().await?;
    let (token, user) = common::register_user(&server.base_url).await?;
    assert!(!token.is_empty());
    assert_eq!(user["role"], "customer");
    // Password material never leaks into responses
    assert!(user.get("password_hash").is_none());

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/auth/login", server.base_url))
        .json(&serde_json::json!({
            "email": user["email"],
            "password": "secret-pass",
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert!(body["data"]["access_token"].as_str().is_some());
    Ok(())
}

#[tokio::test]
async fn login_with_wrong_password_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let (_token, user) = common::register_user(&server.base_url).await?;

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/auth/login", server.base_url))
        .json(&serde_json::json!({
            "email": user["email"],
            "password": "not-the-password",
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNAUTHORIZED");
    Ok(())
}

#[tokio::test]
async fn protected_api_requires_bearer_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/orders", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn authenticated_profile_fetch() -> Result<()> {
    let server = common::ensure_server().await?;
    let (token, user) = common::register_user(&server.base_url).await?;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/api/settings/profile", server.base_url))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["data"]["email"], user["email"]);
    assert!(body["data"].get("password_hash").is_none());
    Ok(())
}
