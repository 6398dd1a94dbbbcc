//! Record Store
//!
//! Persisted conversation turns and user profiles. The store is an external
//! collaborator: the API service backs it with PostgreSQL, tests and
//! single-process deployments use [`InMemoryStore`].

use crate::conversation::{Attachment, ConversationTurn, TurnKind, TurnRole};
use crate::module::ModuleId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record store failure: {0}")]
    Backend(String),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// The persisted shape of one conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRecord {
    pub id: Uuid,
    pub user_id: String,
    pub module_id: ModuleId,
    pub role: TurnRole,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub kind: TurnKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl TurnRecord {
    pub fn from_turn(user_id: &str, module_id: ModuleId, turn: &ConversationTurn) -> Self {
        let mut record = Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            module_id,
            role: turn.role,
            content: turn.content.clone(),
            kind: turn.kind,
            timestamp: turn.timestamp,
            file_url: None,
            file_name: None,
            file_type: None,
            image_url: None,
            caption: None,
        };
        match (turn.kind, &turn.attachment) {
            (TurnKind::File, Some(attachment)) => {
                record.file_url = Some(attachment.url.clone());
                record.file_name = attachment.file_name.clone();
                record.file_type = attachment.mime_type.clone();
            }
            (TurnKind::Image, Some(attachment)) => {
                record.image_url = Some(attachment.url.clone());
                record.caption = turn.content.clone();
            }
            _ => {}
        }
        record
    }

    /// Rebuilds the turn, rejecting records whose kind lacks its fields.
    pub fn into_turn(self) -> Result<ConversationTurn, StoreError> {
        let content = self.content.filter(|c| !c.is_empty());
        let attachment = match self.kind {
            TurnKind::Text => {
                if content.is_none() {
                    return Err(StoreError::InvalidRecord(format!(
                        "text turn {} has no content",
                        self.id
                    )));
                }
                None
            }
            TurnKind::Image => {
                let url = self.image_url.ok_or_else(|| {
                    StoreError::InvalidRecord(format!("image turn {} has no image url", self.id))
                })?;
                Some(Attachment::image(url))
            }
            TurnKind::File => {
                let url = self.file_url.ok_or_else(|| {
                    StoreError::InvalidRecord(format!("file turn {} has no file url", self.id))
                })?;
                Some(Attachment {
                    url,
                    file_name: self.file_name,
                    mime_type: self.file_type,
                })
            }
        };
        let content = match self.kind {
            TurnKind::Image => self.caption.or(content),
            _ => content,
        };

        Ok(ConversationTurn {
            role: self.role,
            content,
            kind: self.kind,
            attachment,
            timestamp: self.timestamp,
        })
    }
}

/// One profile document per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub user_id: String,
    pub custom_display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl UserProfile {
    pub fn new(user_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            custom_display_name: None,
            avatar_url: None,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_turn(&self, record: TurnRecord) -> Result<(), StoreError>;

    /// Turns for one (user, module) pair, newest first.
    async fn list_turns(&self, user_id: &str, module: ModuleId) -> Result<Vec<TurnRecord>, StoreError>;

    async fn delete_module_turns(&self, user_id: &str, module: ModuleId) -> Result<u64, StoreError>;

    async fn delete_user_turns(&self, user_id: &str) -> Result<u64, StoreError>;

    async fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError>;

    /// Creates the user's profile or updates the existing one.
    async fn save_profile(&self, profile: UserProfile) -> Result<UserProfile, StoreError>;

    async fn delete_profiles(&self, user_id: &str) -> Result<u64, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    turns: Mutex<Vec<TurnRecord>>,
    profiles: Mutex<HashMap<String, UserProfile>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn create_turn(&self, record: TurnRecord) -> Result<(), StoreError> {
        self.turns.lock().await.push(record);
        Ok(())
    }

    async fn list_turns(&self, user_id: &str, module: ModuleId) -> Result<Vec<TurnRecord>, StoreError> {
        let turns = self.turns.lock().await;
        let mut records: Vec<TurnRecord> = turns
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id && r.module_id == module)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    async fn delete_module_turns(&self, user_id: &str, module: ModuleId) -> Result<u64, StoreError> {
        let mut turns = self.turns.lock().await;
        let before = turns.len();
        turns.retain(|r| !(r.user_id == user_id && r.module_id == module));
        Ok((before - turns.len()) as u64)
    }

    async fn delete_user_turns(&self, user_id: &str) -> Result<u64, StoreError> {
        let mut turns = self.turns.lock().await;
        let before = turns.len();
        turns.retain(|r| r.user_id != user_id);
        Ok((before - turns.len()) as u64)
    }

    async fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.profiles.lock().await.get(user_id).cloned())
    }

    async fn save_profile(&self, profile: UserProfile) -> Result<UserProfile, StoreError> {
        let mut profiles = self.profiles.lock().await;
        let saved = match profiles.get(&profile.user_id) {
            Some(existing) => UserProfile {
                id: existing.id,
                ..profile
            },
            None => profile,
        };
        profiles.insert(saved.user_id.clone(), saved.clone());
        Ok(saved)
    }

    async fn delete_profiles(&self, user_id: &str) -> Result<u64, StoreError> {
        Ok(self.profiles.lock().await.remove(user_id).map_or(0, |_| 1))
    }
}
