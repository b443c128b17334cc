//! # simulai core
//!
//! Domain types, traits, and error definitions for the simulai AI engine.
//! This crate has **no framework dependencies**: it defines the domain model
//! (engines, messages, cache entries, health metrics, audit rows, chat
//! sessions) and the store/provider seams every other crate implements
//! against.
//!
//! ## Design
//!
//! Shared mutable state (response cache, engine metrics, request log) is
//! reached only through the store traits defined here. Implementations live
//! in `simulai-store`, which keeps the orchestration code testable against
//! in-memory stores and mock providers.

pub mod cache;
pub mod engine;
pub mod error;
pub mod message;
pub mod metrics;
pub mod provider;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use cache::{CacheEntry, CacheStore};
pub use engine::EngineKind;
pub use error::{AuthError, EngineError, FieldError, ProviderError, StoreError};
pub use message::{Message, Role};
pub use metrics::{EngineMetrics, MetricsStore, RequestLog, RequestLogStore};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use session::{ChatSession, KnowledgeDocument, SessionMessage, SessionStore, UploadedFile};
