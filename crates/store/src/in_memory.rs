//! In-memory backend: useful for testing and ephemeral runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use simulai_core::{
    CacheEntry, CacheStore, ChatSession, EngineKind, EngineMetrics, KnowledgeDocument,
    MetricsStore, RequestLog, RequestLogStore, SessionMessage, SessionStore, StoreError,
    UploadedFile,
};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Keeps every table in process memory. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryStore {
    cache: RwLock<HashMap<String, CacheEntry>>,
    metrics: RwLock<BTreeMap<EngineKind, EngineMetrics>>,
    logs: RwLock<Vec<RequestLog>>,
    sessions: RwLock<HashMap<Uuid, ChatSession>>,
    messages: RwLock<Vec<SessionMessage>>,
    files: RwLock<Vec<UploadedFile>>,
    documents: RwLock<Vec<KnowledgeDocument>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_session(&self, session: ChatSession) {
        self.sessions.write().await.insert(session.id, session);
    }

    pub async fn insert_message(&self, message: SessionMessage) {
        self.messages.write().await.push(message);
    }

    pub async fn insert_file(&self, file: UploadedFile) {
        self.files.write().await.push(file);
    }

    pub async fn insert_document(&self, document: KnowledgeDocument) {
        self.documents.write().await.push(document);
    }

    /// Number of audit rows written so far.
    pub async fn log_count(&self) -> usize {
        self.logs.read().await.len()
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn find_live(
        &self,
        prompt_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, StoreError> {
        Ok(self
            .cache
            .read()
            .await
            .get(prompt_hash)
            .filter(|e| e.is_live(now))
            .cloned())
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<(), StoreError> {
        self.cache
            .write()
            .await
            .insert(entry.prompt_hash.clone(), entry);
        Ok(())
    }

    async fn set_hit_count(&self, prompt_hash: &str, hit_count: u32) -> Result<(), StoreError> {
        if let Some(entry) = self.cache.write().await.get_mut(prompt_hash) {
            entry.hit_count = hit_count;
        }
        Ok(())
    }
}

#[async_trait]
impl MetricsStore for InMemoryStore {
    async fn get(&self, engine: EngineKind) -> Result<Option<EngineMetrics>, StoreError> {
        Ok(self.metrics.read().await.get(&engine).cloned())
    }

    async fn all(&self) -> Result<Vec<EngineMetrics>, StoreError> {
        Ok(self.metrics.read().await.values().cloned().collect())
    }

    async fn upsert(&self, metrics: EngineMetrics) -> Result<(), StoreError> {
        self.metrics.write().await.insert(metrics.engine, metrics);
        Ok(())
    }
}

#[async_trait]
impl RequestLogStore for InMemoryStore {
    async fn append(&self, log: RequestLog) -> Result<(), StoreError> {
        self.logs.write().await.push(log);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<RequestLog>, StoreError> {
        let logs = self.logs.read().await;
        let mut out: Vec<RequestLog> = logs.iter().rev().take(limit).cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn session(&self, id: Uuid) -> Result<Option<ChatSession>, StoreError> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn recent_messages(
        &self,
        session_id: Uuid,
        limit: usize,
    ) -> Result<Vec<SessionMessage>, StoreError> {
        let messages = self.messages.read().await;
        let mut matching: Vec<SessionMessage> = messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let skip = matching.len().saturating_sub(limit);
        Ok(matching.into_iter().skip(skip).collect())
    }

    async fn session_files(&self, session_id: Uuid) -> Result<Vec<UploadedFile>, StoreError> {
        let mut files: Vec<UploadedFile> = self
            .files
            .read()
            .await
            .iter()
            .filter(|f| f.session_id == session_id)
            .cloned()
            .collect();
        files.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(files)
    }

    async fn active_knowledge_documents(&self) -> Result<Vec<KnowledgeDocument>, StoreError> {
        let mut docs: Vec<KnowledgeDocument> = self
            .documents
            .read()
            .await
            .iter()
            .filter(|d| d.is_active)
            .cloned()
            .collect();
        docs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use simulai_core::Role;

    fn entry(hash: &str, expires_in: Duration) -> CacheEntry {
        let now = Utc::now();
        CacheEntry {
            prompt_hash: hash.into(),
            prompt_preview: "Gere 5 questões".into(),
            action: "generate_questions".into(),
            engine_used: EngineKind::Lovable,
            response_data: serde_json::json!({"content": "[]"}),
            tokens_used: 42,
            created_at: now,
            expires_at: now + expires_in,
            hit_count: 0,
        }
    }

    #[tokio::test]
    async fn cache_upsert_replaces_existing_row() {
        let store = InMemoryStore::new();
        CacheStore::upsert(&store, entry("h1", Duration::days(7))).await.unwrap();
        let mut updated = entry("h1", Duration::days(7));
        updated.tokens_used = 99;
        CacheStore::upsert(&store, updated).await.unwrap();

        let found = store.find_live("h1", Utc::now()).await.unwrap().unwrap();
        assert_eq!(found.tokens_used, 99);
        assert_eq!(store.cache.read().await.len(), 1);
    }

    #[tokio::test]
    async fn expired_cache_entries_are_invisible() {
        let store = InMemoryStore::new();
        CacheStore::upsert(&store, entry("old", -Duration::seconds(1))).await.unwrap();
        assert!(store.find_live("old", Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn hit_count_updates_in_place() {
        let store = InMemoryStore::new();
        CacheStore::upsert(&store, entry("h", Duration::days(1))).await.unwrap();
        store.set_hit_count("h", 3).await.unwrap();
        let found = store.find_live("h", Utc::now()).await.unwrap().unwrap();
        assert_eq!(found.hit_count, 3);
    }

    #[tokio::test]
    async fn metrics_rows_are_keyed_by_engine() {
        let store = InMemoryStore::new();
        MetricsStore::upsert(&store, EngineMetrics::empty(EngineKind::Gemini)).await.unwrap();
        let mut lovable = EngineMetrics::empty(EngineKind::Lovable);
        lovable.request_count = 2;
        MetricsStore::upsert(&store, lovable.clone()).await.unwrap();
        MetricsStore::upsert(&store, lovable).await.unwrap();

        assert_eq!(store.all().await.unwrap().len(), 2);
        let got = MetricsStore::get(&store, EngineKind::Lovable).await.unwrap().unwrap();
        assert_eq!(got.request_count, 2);
    }

    #[tokio::test]
    async fn recent_messages_keeps_newest_in_chronological_order() {
        let store = InMemoryStore::new();
        let session = Uuid::new_v4();
        let base = Utc::now();
        for i in 0..5 {
            store
                .insert_message(SessionMessage {
                    id: format!("m{i}"),
                    session_id: session,
                    role: Role::User,
                    content: format!("mensagem {i}"),
                    created_at: base + Duration::seconds(i),
                })
                .await;
        }
        store
            .insert_message(SessionMessage {
                id: "other".into(),
                session_id: Uuid::new_v4(),
                role: Role::User,
                content: "outra sessão".into(),
                created_at: base,
            })
            .await;

        let recent = store.recent_messages(session, 3).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn only_active_documents_are_listed() {
        let store = InMemoryStore::new();
        for (id, active) in [("a", true), ("b", false)] {
            store
                .insert_document(KnowledgeDocument {
                    id: id.into(),
                    title: format!("Doc {id}"),
                    category: None,
                    content: "conteúdo".into(),
                    is_active: active,
                    created_at: Utc::now(),
                })
                .await;
        }
        let docs = store.active_knowledge_documents().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "a");
    }
}
