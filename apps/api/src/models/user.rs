use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// Firebase uid for OAuth-linked accounts.
    pub uid: Option<String>,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub auth_provider: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(username: Option<String>, email: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash: None,
            uid: None,
            display_name: None,
            avatar: None,
            auth_provider: None,
            role: "user".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    /// Public profile shape returned by `/api/auth/me`.
    pub fn profile(&self) -> Value {
        json!({
            "user_id": self.id,
            "username": self.username,
            "email": self.email,
            "uid": self.uid,
            "display_name": self.display_name,
            "avatar_url_or_b64": self.avatar,
            "auth_provider": self.auth_provider,
            "role": self.role,
            "is_active": self.is_active,
            "created_at": self.created_at,
            "last_login_at": self.last_login_at,
        })
    }

    /// Compact identity snapshot stored alongside activity log entries.
    pub fn activity_info(&self) -> Value {
        json!({
            "user_id": self.id,
            "uid": self.uid,
            "username": self.username,
            "email": self.email,
        })
    }
}

/// Partial profile update. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.email.is_none() && self.avatar.is_none()
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.display_name.is_some() {
            fields.push("display_name");
        }
        if self.email.is_some() {
            fields.push("email");
        }
        if self.avatar.is_some() {
            fields.push("avatar");
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_never_serialized() {
        let mut user = User::new(Some("alice".into()), Some("a@example.com".into()));
        user.password_hash = Some("$argon2id$secret".into());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!user.profile().to_string().contains("argon2id"));
    }

    #[test]
    fn test_profile_update_field_names() {
        let update = ProfileUpdate {
            display_name: Some("Alice".into()),
            email: None,
            avatar: Some("data:image/png;base64,AAA".into()),
        };
        assert!(!update.is_empty());
        assert_eq!(update.field_names(), vec!["display_name", "avatar"]);
        assert!(ProfileUpdate::default().is_empty());
    }
}
