use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo_types::{NewUser, ProfileUpdate, User, UserRow};

/// Column whose unique constraint rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    GoogleId,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0:?} already taken")]
    Conflict(UniqueField),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                let field = match db.constraint() {
                    Some(c) if c.contains("google") => UniqueField::GoogleId,
                    _ => UniqueField::Email,
                };
                return StoreError::Conflict(field);
            }
        }
        StoreError::Other(e.into())
    }
}

/// Persistent storage of user identities and hashed secrets.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError>;
    /// Inserts a user. Unique violations surface as [`StoreError::Conflict`].
    async fn create(&self, new: NewUser) -> Result<User, StoreError>;
    /// Attaches a Google id to a user that has none. `None` if the user is gone or already linked.
    async fn link_google_id(
        &self,
        id: Uuid,
        google_id: &str,
        avatar: Option<&str>,
    ) -> Result<Option<User>, StoreError>;
    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<User>, StoreError>;
}

const USER_COLUMNS: &str =
    "id, email, google_id, password_hash, name, avatar, role, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;
        row.map(User::try_from).transpose().map_err(StoreError::Other)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        row.map(User::try_from).transpose().map_err(StoreError::Other)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.fetch_one_by("email", email).await
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        self.fetch_one_by("google_id", google_id).await
    }

    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (id, email, google_id, password_hash, name, avatar)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.email)
            .bind(new.google_id)
            .bind(new.password_hash)
            .bind(new.name)
            .bind(new.avatar)
            .fetch_one(&self.db)
            .await?;
        Ok(User::try_from(row)?)
    }

    async fn link_google_id(
        &self,
        id: Uuid,
        google_id: &str,
        avatar: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
            SET google_id = $2, avatar = COALESCE(avatar, $3), updated_at = $4
            WHERE id = $1 AND google_id IS NULL
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(google_id)
            .bind(avatar)
            .bind(OffsetDateTime::now_utc())
            .fetch_optional(&self.db)
            .await?;
        row.map(User::try_from).transpose().map_err(StoreError::Other)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name), avatar = COALESCE($3, avatar), updated_at = $4
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(update.name)
            .bind(update.avatar)
            .bind(OffsetDateTime::now_utc())
            .fetch_optional(&self.db)
            .await?;
        row.map(User::try_from).transpose().map_err(StoreError::Other)
    }
}
