//! Common validation utilities.

use validator::ValidationError;

/// Validates that a text value is not blank.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value cannot be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Normalizes an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
