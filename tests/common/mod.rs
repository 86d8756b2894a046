use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    #[allow(dead_code)]
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Spawn the already-built binary to keep start fast during tests
        let mut cmd = Command::new("target/debug/marketplace-api");
        cmd.env("PORT", port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        // Inherit environment so the server sees DATABASE_URL and JWT_SECRET
        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self {
            port,
            base_url,
            child,
        })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK
                    || resp.status() == StatusCode::SERVICE_UNAVAILABLE
                {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!(
            "server did not become ready on {} within {:?}",
            self.base_url,
            timeout
        )
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Register a fresh user and return `(token, user_json)`.
#[allow(dead_code)]
pub async fn register_user(base_url: &str) -> Result<(String, serde_json::Value)> {
    let client = reqwest::Client::new();
    let suffix = uuid_suffix();
    let res = client
        .post(format!("{base_url}/auth/register"))
        .json(&serde_json::json!({
            "email": format!("user-{suffix}@example.com"),
            "username": format!("user-{suffix}"),
            "password": "secret-pass",
        }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "register failed: {}", res.status());

    let body = res.json::<serde_json::Value>().await?;
    let token = body["data"]["access_token"]
        .as_str()
        .context("missing access_token")?
        .to_string();
    Ok((token, body["data"]["user"].clone()))
}

/// Assign a role directly in the database. Sellers and superadmins cannot
/// be minted through the public API alone, so fixtures go in the back door.
#[allow(dead_code)]
pub async fn assign_role(user_id: &str, role: &str) -> Result<()> {
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    let pool = sqlx::PgPool::connect(&url)
        .await
        .context("failed to connect to database")?;
    sqlx::query("UPDATE users SET role = $2 WHERE id = $1::uuid")
        .bind(user_id)
        .bind(role)
        .execute(&pool)
        .await?;
    Ok(())
}

#[allow(dead_code)]
fn uuid_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .subsec_nanos();
    format!("{}-{}", std::process::id(), nanos)
}
