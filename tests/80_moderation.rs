//! Superadmin moderation: suspensions lock accounts out until lifted, and
//! seller removal deactivates the account and clears its catalog.

mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn superadmin(base_url: &str) -> Result<String> {
    let (token, user) = common::register_user(base_url).await?;
    common::assign_role(user["id"].as_str().expect("user id"), "superadmin").await?;
    Ok(token)
}

#[tokio::test]
async fn suspension_blocks_requests_until_lifted() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let admin_token = superadmin(&server.base_url).await?;
    let (user_token, user) = common::register_user(&server.base_url).await?;
    let user_id = user["id"].as_str().expect("user id");
    let email = user["email"].as_str().expect("email");

    let res = client
        .put(format!("{}/api/users/{user_id}/suspend", server.base_url))
        .bearer_auth(&admin_token)
        .json(&json!({ "days": 7, "reason": "spam" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    // authenticated requests and fresh logins are both rejected
    let res = client
        .get(format!("{}/api/settings/profile", server.base_url))
        .bearer_auth(&user_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(format!("{}/auth/login", server.base_url))
        .json(&json!({ "email": email, "password": "secret-pass" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .put(format!("{}/api/users/{user_id}/unsuspend", server.base_url))
        .bearer_auth(&admin_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/api/settings/profile", server.base_url))
        .bearer_auth(&user_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn superadmins_cannot_be_suspended() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let admin_token = superadmin(&server.base_url).await?;
    let (_other_token, other) = common::register_user(&server.base_url).await?;
    let other_id = other["id"].as_str().expect("user id");
    common::assign_role(other_id, "superadmin").await?;

    let res = client
        .put(format!("{}/api/users/{other_id}/suspend", server.base_url))
        .bearer_auth(&admin_token)
        .json(&json!({ "days": 3 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn seller_removal_deactivates_account_and_catalog() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let admin_token = superadmin(&server.base_url).await?;
    let (seller_token, seller) = common::register_user(&server.base_url).await?;
    let seller_id = seller["id"].as_str().expect("seller id");
    common::assign_role(seller_id, "seller").await?;

    let res = client
        .post(format!("{}/api/products", server.base_url))
        .bearer_auth(&seller_token)
        .json(&json!({ "title": "Doomed widget", "price": 5.0, "stock": 1 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let product_id = res.json::<Value>().await?["data"]["id"]
        .as_str()
        .expect("product id")
        .to_string();

    // removing a customer is rejected
    let (_token, customer) = common::register_user(&server.base_url).await?;
    let res = client
        .delete(format!(
            "{}/api/users/{}",
            server.base_url,
            customer["id"].as_str().expect("customer id")
        ))
        .bearer_auth(&admin_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .delete(format!("{}/api/users/{seller_id}", server.base_url))
        .bearer_auth(&admin_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    // the catalog is gone and the account no longer works
    let res = reqwest::get(format!("{}/products/{product_id}", server.base_url)).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(format!("{}/api/settings/profile", server.base_url))
        .bearer_auth(&seller_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    Ok(())
}
