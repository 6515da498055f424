//! Repository for the `organizations` table.

use sqlx::PgPool;

use crate::models::organization::Organization;

const COLUMNS: &str = "id, name, created_at";

pub struct OrganizationRepo;

impl OrganizationRepo {
    pub async fn create(pool: &PgPool, name: &str) -> Result<Organization, sqlx::Error> {
        let query = format!("INSERT INTO organizations (name) VALUES ($1) RETURNING {COLUMNS}");
        sqlx::query_as::<_, Organization>(&query)
            .bind(name)
            .fetch_one(pool)
            .await
    }
}
