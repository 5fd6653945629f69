//! Administrator account models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Role carried by every administrator account.
pub const ADMIN_ROLE: &str = "admin";

/// An administrator account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)] // Never serialize password hash to API responses
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl Admin {
    pub fn profile(&self) -> AdminProfile {
        AdminProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
            created_at: self.created_at,
            last_login: self.last_login,
        }
    }
}

/// Input for inserting an administrator. The email is already normalized
/// and the password already hashed.
#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Public view of an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Request payload for registering an administrator.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAdminRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub name: String,

    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "password must be 8-128 characters"))]
    pub password: String,
}

/// Request payload for logging in.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,

    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Admin {
        Admin {
            id: Uuid::new_v4(),
            name: "Ops".to_string(),
            email: "ops@example.com".to_string(),
            password_hash: "secret_hash".to_string(),
            role: ADMIN_ROLE.to_string(),
            created_at: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_string(&admin()).unwrap();
        assert!(!json.contains("secret_hash"));
        assert!(!json.contains("passwordHash"));
        assert!(json.contains("lastLogin"));
    }

    #[test]
    fn test_profile_copies_public_fields() {
        let admin = admin();
        let profile = admin.profile();
        assert_eq!(profile.id, admin.id);
        assert_eq!(profile.email, "ops@example.com");
        assert_eq!(profile.role, "admin");
    }

    #[test]
    fn test_register_request_validation() {
        let ok = RegisterAdminRequest {
            name: "Ops".to_string(),
            email: "ops@example.com".to_string(),
            password: "longenough".to_string(),
        };
        assert!(ok.validate().is_ok());

        let short = RegisterAdminRequest {
            password: "short".to_string(),
            ..ok.clone()
        };
        assert!(short.validate().is_err());

        let bad_email = RegisterAdminRequest {
            email: "not-an-email".to_string(),
            ..ok
        };
        assert!(bad_email.validate().is_err());
    }
}
