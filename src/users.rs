//! User directory: the persistence collaborator of the security core.
//!
//! The pipeline only needs three things from it: look a user up by name,
//! hash a password, and turn verified JWT claims into an active principal.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::auth::{AuthenticatedPrincipal, Claims};
use crate::error::AppError;

pub const DEFAULT_ROLE: &str = "USER";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("username already taken: {0}")]
    Duplicate(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Duplicate(_) => AppError::Conflict("Username is already taken".to_string()),
            DirectoryError::Hashing(msg) => AppError::Internal(anyhow::anyhow!("password hashing failed: {}", msg)),
            DirectoryError::Database(e) => AppError::from(e),
        }
    }
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, DirectoryError>;

    async fn encode_password(&self, raw: &str) -> Result<String, DirectoryError>;

    async fn create_user(&self, user: NewUser) -> Result<User, DirectoryError>;

    /// Active user named by the token subject; `None` for unknown or disabled users.
    async fn resolve_authenticated_principal(
        &self,
        claims: &Claims,
    ) -> Result<Option<AuthenticatedPrincipal>, DirectoryError> {
        Ok(self.find_user_by_username(&claims.sub).await?.filter(|user| user.is_active).map(|user| {
            AuthenticatedPrincipal { id: user.id, username: user.username, role: user.role }
        }))
    }
}

#[derive(Clone)]
pub struct SqliteUserDirectory {
    pool: SqlitePool,
    bcrypt_cost: u32,
}

impl SqliteUserDirectory {
    pub fn new(pool: SqlitePool, bcrypt_cost: u32) -> Self {
        Self { pool, bcrypt_cost }
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, DirectoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, username, password_hash, full_name, email, role, is_active, created_at
               FROM users WHERE username = ?1"#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn encode_password(&self, raw: &str) -> Result<String, DirectoryError> {
        // bcrypt is CPU-bound; keep it off the async workers
        let raw = raw.to_string();
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(raw, cost))
            .await
            .map_err(|e| DirectoryError::Hashing(e.to_string()))?
            .map_err(|e| DirectoryError::Hashing(e.to_string()))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, DirectoryError> {
        let role = user.role.unwrap_or_else(|| DEFAULT_ROLE.to_string());
        let result = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (username, password_hash, full_name, email, role, is_active)
               VALUES (?1, ?2, ?3, ?4, ?5, 1)
               RETURNING id, username, password_hash, full_name, email, role, is_active, created_at"#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&role)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(created) => {
                tracing::info!(user_id = created.id, username = %created.username, "user registered");
                Ok(created)
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(DirectoryError::Duplicate(user.username))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    async fn directory() -> SqliteUserDirectory {
        SqliteUserDirectory::new(memory_pool().await.unwrap(), 4)
    }

    fn new_user(username: &str, hash: String) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: hash,
            full_name: "Test User".to_string(),
            email: Some("test@example.com".to_string()),
            role: None,
        }
    }

    fn claims_for(sub: &str) -> Claims {
        Claims { sub: sub.to_string(), iat: 0, exp: u64::MAX / 2, role: None }
    }

    #[tokio::test]
    async fn test_encode_password_is_salted_bcrypt() {
        let dir = directory().await;
        let a = dir.encode_password("correct horse").await.unwrap();
        let b = dir.encode_password("correct horse").await.unwrap();
        assert_ne!(a, b);
        assert!(bcrypt::verify("correct horse", &a).unwrap());
        assert!(!a.contains("correct horse"));
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let dir = directory().await;
        assert!(dir.find_user_by_username("alice").await.unwrap().is_none());

        let hash = dir.encode_password("s3cret-pass").await.unwrap();
        let created = dir.create_user(new_user("alice", hash)).await.unwrap();
        assert_eq!(created.role, DEFAULT_ROLE);
        assert!(created.is_active);

        let found = dir.find_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.email.as_deref(), Some("test@example.com"));
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let dir = directory().await;
        dir.create_user(new_user("bob", "h".into())).await.unwrap();
        let err = dir.create_user(new_user("bob", "h".into())).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Duplicate(ref name) if name == "bob"));
    }

    #[tokio::test]
    async fn test_resolve_authenticated_principal() {
        let dir = directory().await;
        let created = dir.create_user(new_user("carol", "h".into())).await.unwrap();

        let principal = dir.resolve_authenticated_principal(&claims_for("carol")).await.unwrap().unwrap();
        assert_eq!(principal, AuthenticatedPrincipal { id: created.id, username: "carol".into(), role: "USER".into() });

        assert!(dir.resolve_authenticated_principal(&claims_for("nobody")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inactive_user_is_not_a_principal() {
        let dir = directory().await;
        dir.create_user(new_user("dave", "h".into())).await.unwrap();
        sqlx::query("UPDATE users SET is_active = 0 WHERE username = 'dave'").execute(&dir.pool).await.unwrap();
        assert!(dir.resolve_authenticated_principal(&claims_for("dave")).await.unwrap().is_none());
    }
}
