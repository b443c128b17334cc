//! Conversation-scoped entities consumed by the chat session layer.
//!
//! These are owned by the persistence layer; the engine only reads them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::message::Role;

/// A chat session owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// A persisted turn of a chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub id: String,
    pub session_id: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A reference document of the knowledge base.
///
/// `content` holds the analyzed text as markdown, with optional headed
/// sections (summary, key concepts, topics, full content).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub content: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A file the user attached to a session, with its extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    pub session_id: Uuid,
    pub file_name: String,
    pub file_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Read access to chat sessions and their context.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn session(&self, id: Uuid) -> Result<Option<ChatSession>, StoreError>;

    /// The last `limit` messages of a session, oldest first.
    async fn recent_messages(
        &self,
        session_id: Uuid,
        limit: usize,
    ) -> Result<Vec<SessionMessage>, StoreError>;

    /// Files attached to a session, oldest first.
    async fn session_files(&self, session_id: Uuid) -> Result<Vec<UploadedFile>, StoreError>;

    /// Every knowledge document with `is_active = true`, oldest first.
    async fn active_knowledge_documents(&self) -> Result<Vec<KnowledgeDocument>, StoreError>;
}
