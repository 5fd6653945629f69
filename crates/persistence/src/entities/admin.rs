//! Admin entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::Admin;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the admins table.
#[derive(Debug, Clone, FromRow)]
pub struct AdminEntity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<AdminEntity> for Admin {
    fn from(entity: AdminEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            email: entity.email,
            password_hash: entity.password_hash,
            role: entity.role,
            created_at: entity.created_at,
            last_login: entity.last_login,
        }
    }
}
