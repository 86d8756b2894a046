use axum::{extract::State, middleware::from_fn_with_state, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use marketplace_api::database::pool;
use marketplace_api::middleware::jwt_auth_middleware;
use marketplace_api::state::AppState;
use marketplace_api::ws;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketplace_api=info,tower_http=info".into()),
        )
        .init();

    let config = marketplace_api::config::config();
    tracing::info!("Starting Marketplace API in {:?} mode", config.environment);

    let pg_pool = match pool::connect().await {
        Ok(pool) => pool,
        Err(err) => {
            tracing::error!("failed to initialize database: {err}");
            std::process::exit(1);
        }
    };
    let state = AppState::new(pg_pool);
    let app = app(state);

    // Allow tests or deployments to override port via env
    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(config.server.port);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("Marketplace API listening on http://{}", bind_addr);
    axum::serve(listener, app).await.expect("server");
}

fn app(state: AppState) -> Router {
    let protected_api = Router::new()
        .merge(product_routes())
        .merge(order_routes())
        .merge(payment_routes())
        .merge(promotion_routes())
        .merge(notification_routes())
        .merge(chat_routes())
        .merge(application_routes())
        .merge(commission_routes())
        .merge(payout_routes())
        .merge(review_routes())
        .merge(statistics_routes())
        .merge(prediction_routes())
        .merge(settings_routes())
        .merge(user_admin_routes())
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        .merge(catalog_routes())
        .route("/ws/chat", get(ws::handler::ws_upgrade))
        // Protected API
        .nest("/api", protected_api)
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use axum::routing::post;
    use marketplace_api::handlers::public::auth;

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/request-reset-code", post(auth::request_reset_code))
        .route("/auth/reset-password", post(auth::reset_password))
}

fn catalog_routes() -> Router<AppState> {
    use axum::routing::post;
    use marketplace_api::handlers::public::catalog;

    Router::new()
        .route("/products", get(catalog::list_products))
        .route("/products/categories", get(catalog::categories))
        .route("/products/:id", get(catalog::product_detail))
        .route("/products/:id/views", post(catalog::record_view))
        .route("/products/:id/clicks", post(catalog::record_click))
}

fn product_routes() -> Router<AppState> {
    use axum::routing::post;
    use marketplace_api::handlers::protected::products;

    Router::new()
        .route("/products", post(products::create_product))
        .route(
            "/products/:id",
            axum::routing::put(products::update_product).delete(products::delete_product),
        )
}

fn order_routes() -> Router<AppState> {
    use axum::routing::{post, put};
    use marketplace_api::handlers::protected::orders;

    Router::new()
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route("/orders/count", get(orders::count_orders))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/status", put(orders::update_status))
        .route("/orders/:id/tracking", put(orders::set_tracking))
        .route("/orders/:id/tracking-updates", post(orders::add_tracking_event))
        .route("/orders/:id/track", get(orders::track_order))
}

fn payment_routes() -> Router<AppState> {
    use axum::routing::post;
    use marketplace_api::handlers::protected::payments;

    Router::new()
        .route("/payments/process", post(payments::process_payment))
        .route("/payments", get(payments::list_payments))
        .route("/payments/:id", get(payments::get_payment))
}

fn promotion_routes() -> Router<AppState> {
    use axum::routing::post;
    use marketplace_api::handlers::protected::promotions;

    Router::new()
        .route(
            "/promotions",
            get(promotions::list_promotions).post(promotions::create_promotion),
        )
        .route(
            "/promotions/:id",
            get(promotions::get_promotion)
                .put(promotions::update_promotion)
                .delete(promotions::delete_promotion),
        )
        .route("/promotions/validate", post(promotions::validate_promotion))
}

fn notification_routes() -> Router<AppState> {
    use axum::routing::put;
    use marketplace_api::handlers::protected::notifications;

    Router::new()
        .route(
            "/notifications",
            get(notifications::list_notifications)
                .post(notifications::create_notification)
                .delete(notifications::delete_all_notifications),
        )
        .route("/notifications/count", get(notifications::unread_count))
        .route("/notifications/read-all", put(notifications::mark_all_read))
        .route(
            "/notifications/:id",
            axum::routing::delete(notifications::delete_notification),
        )
        .route("/notifications/:id/read", put(notifications::mark_read))
}

fn chat_routes() -> Router<AppState> {
    use axum::routing::{post, put};
    use marketplace_api::handlers::protected::chat;

    Router::new()
        .route("/chat/messages", get(chat::list_messages))
        .route("/chat/contacts", get(chat::list_contacts))
        .route("/chat/send", post(chat::send_message))
        .route("/chat/messages/read-all", put(chat::mark_all_messages_read))
        .route("/chat/messages/:id/read", put(chat::mark_message_read))
}

fn application_routes() -> Router<AppState> {
    use axum::routing::put;
    use marketplace_api::handlers::protected::applications;

    Router::new()
        .route(
            "/seller-applications",
            get(applications::list_applications).post(applications::submit_application),
        )
        .route("/seller-applications/my", get(applications::my_applications))
        .route("/seller-applications/:id", get(applications::get_application))
        .route(
            "/seller-applications/:id/status",
            put(applications::update_application_status),
        )
}

fn commission_routes() -> Router<AppState> {
    use axum::routing::put;
    use marketplace_api::handlers::protected::commissions;

    Router::new()
        .route("/commissions", get(commissions::commission_report))
        .route(
            "/commissions/defaults",
            get(commissions::get_defaults).put(commissions::update_defaults),
        )
        .route(
            "/commissions/:seller_id/status",
            put(commissions::update_commission_status),
        )
        .route(
            "/commissions/:seller_id/percentage",
            put(commissions::update_commission_percentage),
        )
}

fn payout_routes() -> Router<AppState> {
    use axum::routing::{post, put};
    use marketplace_api::handlers::protected::payouts;

    Router::new()
        .route("/payouts/request", post(payouts::request_payout))
        .route("/payouts", get(payouts::list_payouts))
        .route("/payouts/:id/process", put(payouts::process_payout))
}

fn review_routes() -> Router<AppState> {
    use axum::routing::{post, put};
    use marketplace_api::handlers::protected::reviews;

    Router::new()
        .route("/reviews", post(reviews::create_review))
        .route(
            "/reviews/:id",
            get(reviews::get_review)
                .put(reviews::update_review)
                .delete(reviews::delete_review),
        )
        .route("/reviews/:id/verify", put(reviews::verify_review))
        .route("/reviews/product/:product_id", get(reviews::product_reviews))
}

fn statistics_routes() -> Router<AppState> {
    use marketplace_api::handlers::protected::statistics;

    Router::new()
        .route("/statistics/dashboard", get(statistics::dashboard))
        .route("/statistics/history", get(statistics::history))
        .route("/statistics/top-sellers", get(statistics::top_sellers))
        .route("/statistics/top-products", get(statistics::top_products))
}

fn prediction_routes() -> Router<AppState> {
    use marketplace_api::handlers::protected::predictions;

    Router::new()
        .route(
            "/predictions/sales/seller/me",
            get(predictions::my_seller_forecast),
        )
        .route(
            "/predictions/sales/seller/:seller_id",
            get(predictions::seller_forecast),
        )
        .route(
            "/predictions/sales/:product_id",
            get(predictions::product_forecast),
        )
}

fn settings_routes() -> Router<AppState> {
    use axum::routing::{delete, put};
    use marketplace_api::handlers::protected::settings;

    Router::new()
        .route(
            "/settings/profile",
            get(settings::get_profile).put(settings::update_profile),
        )
        .route("/settings/password", put(settings::change_password))
        .route("/settings/account", delete(settings::delete_account))
}

fn user_admin_routes() -> Router<AppState> {
    use axum::routing::{delete, put};
    use marketplace_api::handlers::protected::users;

    Router::new()
        .route("/users/:id/suspend", put(users::suspend_user))
        .route("/users/:id/unsuspend", put(users::unsuspend_user))
        .route("/users/:id", delete(users::remove_seller))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Marketplace API",
            "version": version,
            "description": "Multi-seller marketplace backend built with Rust (Axum)",
            "endpoints": {
                "home": "/ (public)",
                "auth": "/auth/* (public - registration, login, password reset)",
                "catalog": "/products[/:id] (public browsing)",
                "ws": "/ws/chat?token=JWT (websocket chat + notifications)",
                "orders": "/api/orders/* (protected)",
                "payments": "/api/payments/* (protected)",
                "promotions": "/api/promotions/* (protected)",
                "notifications": "/api/notifications/* (protected)",
                "chat": "/api/chat/* (protected)",
                "seller_applications": "/api/seller-applications/* (protected)",
                "commissions": "/api/commissions/* (superadmin)",
                "payouts": "/api/payouts/* (protected)",
                "reviews": "/api/reviews/* (protected)",
                "statistics": "/api/statistics/* (protected)",
                "predictions": "/api/predictions/* (protected)",
                "settings": "/api/settings/* (protected)",
                "users": "/api/users/* (superadmin moderation)",
            },
        }
    }))
}

async fn health(State(state): State<AppState>) -> Result<Json<Value>, marketplace_api::error::ApiError> {
    pool::health_check(&state.pool).await?;
    Ok(Json(json!({
        "success": true,
        "data": { "status": "healthy", "database": "up" }
    })))
}
