//! Administrator registration, login and profile lookup.

use std::sync::Arc;

use chrono::Utc;
use domain::models::admin::{LoginRequest, RegisterAdminRequest, ADMIN_ROLE};
use domain::models::{Admin, AdminProfile, NewAdmin};
use domain::store::{AdminStore, StoreError};
use serde::Serialize;
use shared::jwt::{IssuedToken, JwtConfig, JwtError};
use shared::password::{check_password_policy, hash_password, verify_password, PasswordError};
use shared::validation::normalize_email;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Admin registration is disabled")]
    RegistrationDisabled,

    #[error("Email already registered")]
    EmailAlreadyExists,

    #[error("Password does not meet requirements")]
    WeakPassword(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Admin not found")]
    AdminNotFound,

    #[error("Token error: {0}")]
    TokenError(#[from] JwtError),

    #[error("Password error: {0}")]
    PasswordError(#[from] PasswordError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Token information in responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl From<IssuedToken> for TokenResponse {
    fn from(token: IssuedToken) -> Self {
        Self {
            access_token: token.token,
            token_type: "Bearer".to_string(),
            expires_in: token.expires_in,
        }
    }
}

/// Body returned by register and login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub admin: AdminProfile,
    pub token: TokenResponse,
}

/// Administrator authentication service.
#[derive(Clone)]
pub struct AdminAuthService {
    admins: Arc<dyn AdminStore>,
    jwt: Arc<JwtConfig>,
    allow_registration: bool,
}

impl AdminAuthService {
    pub fn new(admins: Arc<dyn AdminStore>, jwt: Arc<JwtConfig>, allow_registration: bool) -> Self {
        Self {
            admins,
            jwt,
            allow_registration,
        }
    }

    /// Creates an administrator account and signs it in.
    pub async fn register(&self, request: RegisterAdminRequest) -> Result<AuthResponse, AuthError> {
        if !self.allow_registration {
            return Err(AuthError::RegistrationDisabled);
        }

        let admin = self
            .create_admin(&request.name, &request.email, &request.password)
            .await?;
        info!(admin_id = %admin.id, "Admin registered");

        let token = self.issue(&admin)?;
        Ok(AuthResponse {
            admin: admin.profile(),
            token,
        })
    }

    /// Creates an administrator regardless of the registration switch. Used
    /// by registration and by startup bootstrap.
    pub async fn create_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Admin, AuthError> {
        check_password_policy(password).map_err(AuthError::WeakPassword)?;

        let email = normalize_email(email);
        if self.admins.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = hash_password(password)?;
        let new_admin = NewAdmin {
            name: name.trim().to_string(),
            email,
            password_hash,
        };

        // A concurrent registration with the same email loses on the unique index.
        self.admins.create(new_admin).await.map_err(|e| match e {
            StoreError::Conflict(_) => AuthError::EmailAlreadyExists,
            other => AuthError::Store(other),
        })
    }

    /// Verifies credentials, stamps `lastLogin` and issues a token.
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(&request.email);
        let mut admin = self
            .admins
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&request.password, &admin.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        self.admins.record_login(admin.id, now).await?;
        admin.last_login = Some(now);
        info!(admin_id = %admin.id, "Admin logged in");

        let token = self.issue(&admin)?;
        Ok(AuthResponse {
            admin: admin.profile(),
            token,
        })
    }

    pub async fn profile(&self, admin_id: Uuid) -> Result<AdminProfile, AuthError> {
        self.admins
            .find_by_id(admin_id)
            .await?
            .map(|admin| admin.profile())
            .ok_or(AuthError::AdminNotFound)
    }

    fn issue(&self, admin: &Admin) -> Result<TokenResponse, AuthError> {
        let role = if admin.role.is_empty() {
            ADMIN_ROLE
        } else {
            admin.role.as_str()
        };
        Ok(self.jwt.issue(admin.id, &admin.email, role)?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::store::InMemoryStore;

    const SECRET: &str = "unit-test-secret-that-is-long-enough-0123";

    fn service(allow_registration: bool) -> (AdminAuthService, Arc<JwtConfig>) {
        let jwt = Arc::new(JwtConfig::new(SECRET, 3600, 30).unwrap());
        let store: Arc<dyn AdminStore> = Arc::new(InMemoryStore::new());
        (
            AdminAuthService::new(store, jwt.clone(), allow_registration),
            jwt,
        )
    }

    fn register_request(email: &str) -> RegisterAdminRequest {
        RegisterAdminRequest {
            name: "Ops Team".to_string(),
            email: email.to_string(),
            password: "correct-horse".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_disabled() {
        let (service, _) = service(false);
        let result = service.register(register_request("ops@example.com")).await;
        assert!(matches!(result, Err(AuthError::RegistrationDisabled)));
    }

    #[tokio::test]
    async fn test_register_issues_valid_token() {
        let (service, jwt) = service(true);
        let response = service
            .register(register_request("Ops@Example.com"))
            .await
            .unwrap();

        assert_eq!(response.admin.email, "ops@example.com");
        assert_eq!(response.token.token_type, "Bearer");
        let claims = jwt.validate(&response.token.access_token).unwrap();
        assert_eq!(claims.admin_id().unwrap(), response.admin.id);
        assert_eq!(claims.role, ADMIN_ROLE);
    }

    #[tokio::test]
    async fn test_register_duplicate_email_case_insensitive() {
        let (service, _) = service(true);
        service
            .register(register_request("ops@example.com"))
            .await
            .unwrap();

        let result = service.register(register_request("OPS@example.com")).await;
        assert!(matches!(result, Err(AuthError::EmailAlreadyExists)));
    }

    #[tokio::test]
    async fn test_register_weak_password() {
        let (service, _) = service(true);
        let mut request = register_request("ops@example.com");
        request.password = "short".to_string();

        let result = service.register(request).await;
        assert!(matches!(result, Err(AuthError::WeakPassword(_))));
    }

    #[tokio::test]
    async fn test_login_records_last_login() {
        let (service, _) = service(true);
        let registered = service
            .register(register_request("ops@example.com"))
            .await
            .unwrap();
        assert!(registered.admin.last_login.is_none());

        let response = service
            .login(LoginRequest {
                email: " OPS@example.com ".to_string(),
                password: "correct-horse".to_string(),
            })
            .await
            .unwrap();
        assert!(response.admin.last_login.is_some());

        let profile = service.profile(registered.admin.id).await.unwrap();
        assert_eq!(profile.last_login, response.admin.last_login);
    }

    #[tokio::test]
    async fn test_login_wrong_password_and_unknown_email() {
        let (service, _) = service(true);
        service
            .register(register_request("ops@example.com"))
            .await
            .unwrap();

        let wrong = service
            .login(LoginRequest {
                email: "ops@example.com".to_string(),
                password: "wrong-password".to_string(),
            })
            .await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

        let unknown = service
            .login(LoginRequest {
                email: "nobody@example.com".to_string(),
                password: "correct-horse".to_string(),
            })
            .await;
        assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_profile_unknown_admin() {
        let (service, _) = service(true);
        let result = service.profile(Uuid::new_v4()).await;
        assert!(matches!(result, Err(AuthError::AdminNotFound)));
    }
}
