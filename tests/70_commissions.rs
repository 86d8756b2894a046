//! Commission report semantics: month scoping of the top tier, zero-volume
//! sellers in the listing, and override precedence over the payout status.

mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn superadmin(base_url: &str) -> Result<String> {
    let (token, user) = common::register_user(base_url).await?;
    common::assign_role(user["id"].as_str().expect("user id"), "superadmin").await?;
    Ok(token)
}

async fn seller(base_url: &str) -> Result<(String, String)> {
    let (token, user) = common::register_user(base_url).await?;
    let id = user["id"].as_str().expect("user id").to_string();
    common::assign_role(&id, "seller").await?;
    Ok((token, id))
}

fn seller_row<'a>(report: &'a Value, seller_id: &str) -> Option<&'a Value> {
    report["data"]["sellers"]
        .as_array()?
        .iter()
        .find(|row| row["seller"]["id"] == seller_id)
}

#[tokio::test]
async fn report_scopes_activity_to_the_requested_month() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let admin_token = superadmin(&server.base_url).await?;
    let (seller_token, seller_id) = seller(&server.base_url).await?;
    let (buyer_token, _) = common::register_user(&server.base_url).await?;

    let res = client
        .post(format!("{}/api/products", server.base_url))
        .bearer_auth(&seller_token)
        .json(&json!({ "title": "Report widget", "price": 40.0, "stock": 10 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let product_id = res.json::<Value>().await?["data"]["id"]
        .as_str()
        .expect("product id")
        .to_string();

    let res = client
        .post(format!("{}/api/orders", server.base_url))
        .bearer_auth(&buyer_token)
        .json(&json!({ "items": [{ "product_id": product_id, "quantity": 2 }] }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    // current month: the seller's activity shows up
    let res = client
        .get(format!("{}/api/commissions", server.base_url))
        .bearer_auth(&admin_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let report = res.json::<Value>().await?;
    let row = seller_row(&report, &seller_id).expect("seller missing from report");
    assert!(row["order_count"].as_i64().expect("order_count") >= 1);
    assert!(row["revenue"].as_f64().expect("revenue") >= 80.0);

    // a past, empty month still lists the seller, with no activity and no
    // top-tier flag carried over from today
    let res = client
        .get(format!(
            "{}/api/commissions?month=1&year=2020",
            server.base_url
        ))
        .bearer_auth(&admin_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let report = res.json::<Value>().await?;
    let row = seller_row(&report, &seller_id).expect("seller missing from empty month");
    assert_eq!(row["order_count"], 0);
    assert_eq!(row["revenue"], 0.0);
    assert_eq!(row["is_top_seller"], false);
    assert_eq!(row["commission_amount"], 0.0);

    Ok(())
}

#[tokio::test]
async fn percentage_override_survives_paid_status() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let admin_token = superadmin(&server.base_url).await?;
    let (_seller_token, seller_id) = seller(&server.base_url).await?;

    let res = client
        .put(format!(
            "{}/api/commissions/{seller_id}/percentage",
            server.base_url
        ))
        .bearer_auth(&admin_token)
        .json(&json!({ "percentage": 0.07 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .put(format!(
            "{}/api/commissions/{seller_id}/status",
            server.base_url
        ))
        .bearer_auth(&admin_token)
        .json(&json!({ "status": "paid" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    // the override still applies after the commission is marked paid
    let res = client
        .get(format!("{}/api/commissions", server.base_url))
        .bearer_auth(&admin_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let report = res.json::<Value>().await?;
    let row = seller_row(&report, &seller_id).expect("seller missing from report");
    let rate = row["rate"].as_f64().expect("rate");
    assert!((rate - 0.07).abs() < 1e-9, "expected override rate, got {rate}");

    // 'approved' is not a commission status
    let res = client
        .put(format!(
            "{}/api/commissions/{seller_id}/status",
            server.base_url
        ))
        .bearer_auth(&admin_token)
        .json(&json!({ "status": "approved" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    Ok(())
}
