//! Admin repository for database operations.

use chrono::{DateTime, Utc};
use domain::models::{Admin, NewAdmin};
use domain::store::{AdminStore, StoreError};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::AdminEntity;
use crate::error::store_error;
use crate::metrics::QueryTimer;

/// Repository for administrator accounts.
#[derive(Clone)]
pub struct AdminRepository {
    pool: PgPool,
}

impl AdminRepository {
    /// Creates a new AdminRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AdminStore for AdminRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<Admin>, StoreError> {
        let timer = QueryTimer::new("find_admin_by_email");
        let result = sqlx::query_as::<_, AdminEntity>(
            r#"
            SELECT id, name, email, password_hash, role, created_at, last_login
            FROM admins
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(store_error)?.map(Into::into))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Admin>, StoreError> {
        let timer = QueryTimer::new("find_admin_by_id");
        let result = sqlx::query_as::<_, AdminEntity>(
            r#"
            SELECT id, name, email, password_hash, role, created_at, last_login
            FROM admins
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(store_error)?.map(Into::into))
    }

    async fn create(&self, admin: NewAdmin) -> Result<Admin, StoreError> {
        let timer = QueryTimer::new("create_admin");
        let result = sqlx::query_as::<_, AdminEntity>(
            r#"
            INSERT INTO admins (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password_hash, role, created_at, last_login
            "#,
        )
        .bind(&admin.name)
        .bind(&admin.email)
        .bind(&admin.password_hash)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(store_error)?.into())
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let timer = QueryTimer::new("record_admin_login");
        let result = sqlx::query(
            r#"
            UPDATE admins SET last_login = $2 WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|_| ()).map_err(store_error)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let timer = QueryTimer::new("count_admins");
        let result = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM admins")
            .fetch_one(&self.pool)
            .await;
        timer.record();
        result.map_err(store_error)
    }
}
