//! Admin bootstrap service for initial setup.
//!
//! Creates the first administrator on startup when configured. Running it
//! again with the same email is a no-op.

use shared::validation::normalize_email;
use tracing::{info, warn};

use super::auth::{AdminAuthService, AuthError};
use crate::config::AdminConfig;

/// What the bootstrap step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    NotConfigured,
    AlreadyExists,
    Created,
}

/// Bootstrap the configured admin if it does not exist yet.
///
/// Call after migrations on startup.
pub async fn bootstrap_admin(
    auth: &AdminAuthService,
    admins: &dyn domain::store::AdminStore,
    config: &AdminConfig,
) -> Result<BootstrapOutcome, AuthError> {
    if config.bootstrap_email.trim().is_empty() {
        return Ok(BootstrapOutcome::NotConfigured);
    }

    if config.bootstrap_password.is_empty() {
        warn!(
            "CD__ADMIN__BOOTSTRAP_EMAIL is set but CD__ADMIN__BOOTSTRAP_PASSWORD is empty - skipping bootstrap"
        );
        return Ok(BootstrapOutcome::NotConfigured);
    }

    let email = normalize_email(&config.bootstrap_email);
    if admins.find_by_email(&email).await?.is_some() {
        info!("Bootstrap admin already exists - skipping bootstrap");
        return Ok(BootstrapOutcome::AlreadyExists);
    }

    let admin = match auth
        .create_admin(&config.bootstrap_name, &email, &config.bootstrap_password)
        .await
    {
        Ok(admin) => admin,
        // Another instance created it between the lookup and the insert.
        Err(AuthError::EmailAlreadyExists) => return Ok(BootstrapOutcome::AlreadyExists),
        Err(e) => return Err(e),
    };

    info!(
        email = %admin.email,
        admin_id = %admin.id,
        "Bootstrap admin created successfully"
    );
    warn!(
        "SECURITY: Remove CD__ADMIN__BOOTSTRAP_PASSWORD from configuration after initial setup"
    );

    Ok(BootstrapOutcome::Created)
}
