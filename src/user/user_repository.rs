use super::user_models::User;
use crate::error::Result;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, username: &str, email: &str, role: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, email, role)
             VALUES ($1, $2, $3)
             RETURNING *",
        )
        .bind(username)
        .bind(email)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Ids of all active users holding any of the given roles. Used to
    /// materialize the recipient set for a role broadcast.
    pub async fn find_active_ids_by_roles(&self, roles: &[String]) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM users WHERE is_active = TRUE AND role = ANY($1)",
        )
        .bind(roles)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
