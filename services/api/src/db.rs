//! Data Access Layer
//!
//! PostgreSQL implementation of the conversation record store. Queries are
//! bound at runtime so the crate builds without a live database.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use omniverse_core::{
    ModuleId,
    conversation::{TurnKind, TurnRole},
    store::{ConversationStore, StoreError, TurnRecord, UserProfile},
};
use sqlx::{FromRow, PgPool};
use tracing::error;
use uuid::Uuid;

/// A wrapper around the `PgPool` to provide a clear data access interface.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

#[derive(FromRow, Debug)]
struct TurnRow {
    id: Uuid,
    user_id: String,
    module_id: String,
    role: String,
    content: Option<String>,
    kind: String,
    created_at: DateTime<Utc>,
    file_url: Option<String>,
    file_name: Option<String>,
    file_type: Option<String>,
    image_url: Option<String>,
    caption: Option<String>,
}

impl TryFrom<TurnRow> for TurnRecord {
    type Error = StoreError;

    fn try_from(row: TurnRow) -> Result<Self, Self::Error> {
        let module_id = row
            .module_id
            .parse::<ModuleId>()
            .map_err(|e| StoreError::InvalidRecord(e.to_string()))?;
        let role = TurnRole::parse(&row.role)
            .ok_or_else(|| StoreError::InvalidRecord(format!("unknown role '{}'", row.role)))?;
        let kind = TurnKind::parse(&row.kind)
            .ok_or_else(|| StoreError::InvalidRecord(format!("unknown turn type '{}'", row.kind)))?;

        Ok(TurnRecord {
            id: row.id,
            user_id: row.user_id,
            module_id,
            role,
            content: row.content,
            kind,
            timestamp: row.created_at,
            file_url: row.file_url,
            file_name: row.file_name,
            file_type: row.file_type,
            image_url: row.image_url,
            caption: row.caption,
        })
    }
}

#[derive(FromRow, Debug)]
struct ProfileRow {
    id: Uuid,
    user_id: String,
    custom_display_name: Option<String>,
    avatar_url: Option<String>,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            custom_display_name: row.custom_display_name,
            avatar_url: row.avatar_url,
        }
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    error!(error = ?err, "Database query failed");
    StoreError::Backend(err.to_string())
}

impl Db {
    /// Creates a new `Db` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for Db {
    async fn create_turn(&self, record: TurnRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO chat_turns
                (id, user_id, module_id, role, content, kind, created_at,
                 file_url, file_name, file_type, image_url, caption)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(record.id)
        .bind(&record.user_id)
        .bind(record.module_id.as_str())
        .bind(record.role.as_str())
        .bind(&record.content)
        .bind(record.kind.as_str())
        .bind(record.timestamp)
        .bind(&record.file_url)
        .bind(&record.file_name)
        .bind(&record.file_type)
        .bind(&record.image_url)
        .bind(&record.caption)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn list_turns(&self, user_id: &str, module: ModuleId) -> Result<Vec<TurnRecord>, StoreError> {
        let rows = sqlx::query_as::<_, TurnRow>(
            r#"
            SELECT id, user_id, module_id, role, content, kind, created_at,
                   file_url, file_name, file_type, image_url, caption
            FROM chat_turns
            WHERE user_id = $1 AND module_id = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(module.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(TurnRecord::try_from).collect()
    }

    async fn delete_module_turns(&self, user_id: &str, module: ModuleId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM chat_turns WHERE user_id = $1 AND module_id = $2")
            .bind(user_id)
            .bind(module.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected())
    }

    async fn delete_user_turns(&self, user_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM chat_turns WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected())
    }

    async fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, user_id, custom_display_name, avatar_url FROM user_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(UserProfile::from))
    }

    async fn save_profile(&self, profile: UserProfile) -> Result<UserProfile, StoreError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            INSERT INTO user_profiles (id, user_id, custom_display_name, avatar_url)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET custom_display_name = EXCLUDED.custom_display_name,
                avatar_url = EXCLUDED.avatar_url,
                updated_at = NOW()
            RETURNING id, user_id, custom_display_name, avatar_url
            "#,
        )
        .bind(profile.id)
        .bind(&profile.user_id)
        .bind(&profile.custom_display_name)
        .bind(&profile.avatar_url)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.into())
    }

    async fn delete_profiles(&self, user_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM user_profiles WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected())
    }
}
