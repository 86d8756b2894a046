use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub commission: CommissionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub token_expiry_minutes: i64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub reset_code_expiry_minutes: i64,
}

/// Commission accounting defaults. Effective values live in shared state and
/// can be adjusted at runtime by a superadmin; these only seed them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionConfig {
    pub default_rate: f64,
    pub top_seller_bonus: f64,
    pub top_seller_count: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Environment-specific defaults first, then specific env var overrides
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout_secs =
                v.parse().unwrap_or(self.database.connection_timeout_secs);
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("ACCESS_TOKEN_EXPIRE_MINUTES") {
            self.security.token_expiry_minutes =
                v.parse().unwrap_or(self.security.token_expiry_minutes);
        }
        if let Ok(v) = env::var("CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("COMMISSION_DEFAULT_RATE") {
            self.commission.default_rate = v.parse().unwrap_or(self.commission.default_rate);
        }
        if let Ok(v) = env::var("COMMISSION_TOP_SELLER_BONUS") {
            self.commission.top_seller_bonus =
                v.parse().unwrap_or(self.commission.top_seller_bonus);
        }
        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 8000 },
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout_secs: 30,
            },
            security: SecurityConfig {
                // Development-only fallback; deployments must set JWT_SECRET
                jwt_secret: "dev-insecure-secret".to_string(),
                token_expiry_minutes: 30,
                enable_cors: true,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
                reset_code_expiry_minutes: 15,
            },
            commission: CommissionConfig {
                default_rate: 0.10,
                top_seller_bonus: 0.15,
                top_seller_count: 5,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout_secs: 10,
            },
            ..Self::development()
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout_secs: 5,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                token_expiry_minutes: 30,
                enable_cors: true,
                cors_origins: vec![],
                reset_code_expiry_minutes: 15,
            },
            ..Self::development()
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults() {
        let config = AppConfig::development();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.security.token_expiry_minutes, 30);
        assert!((config.commission.default_rate - 0.10).abs() < f64::EPSILON);
        assert_eq!(config.commission.top_seller_count, 5);
    }

    #[test]
    fn production_has_no_baked_in_secret() {
        let config = AppConfig::production();
        assert!(config.security.jwt_secret.is_empty());
        assert_eq!(config.database.max_connections, 50);
    }
}
