use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{User, UserSession};
use crate::error::{DatabaseError, Error};

#[derive(Debug, Clone)]
pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn create_user(&self, user: &User) -> Result<User, Error> {
        // Unique violation on username maps to Duplicate so the handler can
        // answer with "name already registered" instead of a 500.
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, password_hash, created_at, is_active, rate_limit_tier)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, username, password_hash, created_at, last_login, is_active, rate_limit_tier
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.is_active)
        .bind(&user.rate_limit_tier)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.constraint().is_some() => {
                Error::Database(DatabaseError::Duplicate)
            }
            _ => Error::from(e),
        })?;

        Ok(created)
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, Error> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at, last_login, is_active, rate_limit_tier FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at, last_login, is_active, rate_limit_tier FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    pub async fn update_last_login(&self, id: Uuid) -> Result<(), Error> {
        sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    pub async fn create_session(&self, session: &UserSession) -> Result<UserSession, Error> {
        let created = sqlx::query_as::<_, UserSession>(
            r#"
            INSERT INTO user_sessions (id, user_id, token, expires_at, created_at, last_activity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, token, expires_at, created_at, last_activity
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.token)
        .bind(session.expires_at)
        .bind(session.created_at)
        .bind(session.last_activity)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(created)
    }

    pub async fn get_session_by_token(&self, token: &str) -> Result<Option<UserSession>, Error> {
        let session = sqlx::query_as::<_, UserSession>(
            "SELECT id, user_id, token, expires_at, created_at, last_activity FROM user_sessions WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(session)
    }

    pub async fn update_session_activity(&self, token: &str) -> Result<(), Error> {
        sqlx::query("UPDATE user_sessions SET last_activity = $1 WHERE token = $2")
            .bind(Utc::now())
            .bind(token)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    pub async fn delete_session(&self, token: &str) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE token = $1")
            .bind(token)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_expired_sessions(&self) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < $1")
            .bind(Utc::now())
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }
}
