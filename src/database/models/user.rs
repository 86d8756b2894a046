use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;

/// Account roles, stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Seller,
    Admin,
    Superadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Seller => "seller",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "customer" => Some(Role::Customer),
            "seller" => Some(Role::Seller),
            "admin" => Some(Role::Admin),
            "superadmin" => Some(Role::Superadmin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    // Never serialized into responses
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub balance: f64,
    pub is_active: bool,
    pub suspended_until: Option<DateTime<Utc>>,
    pub suspension_reason: Option<String>,
    pub commission_percentage: Option<f64>,
    pub commission_status: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Role {
        Role::parse(&self.role).unwrap_or(Role::Customer)
    }

    pub fn is_seller(&self) -> bool {
        matches!(self.role(), Role::Seller)
    }

    pub fn is_superadmin(&self) -> bool {
        matches!(self.role(), Role::Superadmin)
    }

    /// Admin or superadmin.
    pub fn is_staff(&self) -> bool {
        matches!(self.role(), Role::Admin | Role::Superadmin)
    }

    /// Compact representation embedded in orders, chat messages, reviews.
    pub fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "username": self.username,
            "email": self.email,
            "full_name": self.full_name,
            "role": self.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_roundtrip() {
        for role in [Role::Customer, Role::Seller, Role::Admin, Role::Superadmin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("root"), None);
    }

    #[test]
    fn password_hash_never_serializes() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@b.c".into(),
            username: "a".into(),
            full_name: None,
            password_hash: "salt$digest".into(),
            role: "customer".into(),
            balance: 0.0,
            is_active: true,
            suspended_until: None,
            suspension_reason: None,
            commission_percentage: None,
            commission_status: "pending".into(),
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["email"], "a@b.c");
    }
}
