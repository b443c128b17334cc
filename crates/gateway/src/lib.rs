//! HTTP gateway for simulai.
//!
//! Exposes the two AI endpoints, an engine status endpoint for the admin
//! console and an open health check:
//!
//! - `POST /functions/v1/unified-ai-engine`
//! - `POST /functions/v1/ai-agent-chat`
//! - `GET  /functions/v1/engine-status`
//! - `GET  /health`
//!
//! Every `/functions/v1` route requires `Authorization: Bearer <token>`.

pub mod auth;
pub mod error;
mod handlers;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, header};
use axum::{
    Router,
    routing::{get, post},
};
use simulai_config::{AppConfig, GatewayConfig};
use simulai_engine::Services;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

pub use auth::{RemoteTokenVerifier, StaticTokenVerifier, TokenVerifier, bearer_token, verifier_from_config};
pub use error::ApiError;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub services: Services,
    pub verifier: Arc<dyn TokenVerifier>,
    pub max_prompt_chars: usize,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new(config: &AppConfig, services: Services, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            services,
            verifier,
            max_prompt_chars: config.engine.max_prompt_chars,
        }
    }

    /// The user id behind the request's bearer token.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<String, ApiError> {
        let token = bearer_token(headers)?;
        let user_id = self.verifier.verify(token).await?;
        Ok(user_id)
    }
}

fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    let origin = if config.allowed_origin == "*" {
        AllowOrigin::any()
    } else {
        match config.allowed_origin.parse::<HeaderValue>() {
            Ok(value) => AllowOrigin::exact(value),
            Err(_) => {
                warn!(origin = %config.allowed_origin, "Invalid CORS origin; allowing any");
                AllowOrigin::any()
            }
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-client-info"),
        ])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/functions/v1/unified-ai-engine", post(handlers::unified_engine))
        .route("/functions/v1/ai-agent-chat", post(handlers::agent_chat))
        .route("/functions/v1/engine-status", get(handlers::engine_status))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(cors_layer(config))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Open storage, build providers and services, and serve until shutdown.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let stores = simulai_store::open(&config.storage).await?;
    let providers = simulai_providers::router::build_from_config(&config);

    let services = Services::new(&config, stores, providers);
    let verifier = verifier_from_config(&config.auth);
    let state = Arc::new(GatewayState::new(&config, services, verifier));
    let app = build_router(state, &config.gateway);

    info!(addr = %addr, backend = %config.storage.backend, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use simulai_core::{
        ChatSession, EngineKind, Provider, ProviderError, ProviderRequest, ProviderResponse,
    };
    use simulai_providers::ProviderSet;
    use simulai_store::{InMemoryStore, Stores};
    use std::sync::Mutex;
    use tower::ServiceExt;
    use uuid::Uuid;

    struct MockProvider {
        engine: EngineKind,
        reply: Result<String, ProviderError>,
        calls: Mutex<usize>,
    }

    impl MockProvider {
        fn new(engine: EngineKind, reply: Result<&str, ProviderError>) -> Arc<Self> {
            Arc::new(Self {
                engine,
                reply: reply.map(str::to_string),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            self.engine.as_str()
        }

        fn engine(&self) -> EngineKind {
            self.engine
        }

        fn default_model(&self) -> &str {
            "mock"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            self.reply.clone().map(|content| ProviderResponse {
                content,
                tokens_used: 10,
                model: request.model.unwrap_or_else(|| "mock".into()),
            })
        }
    }

    struct Harness {
        app: Router,
        store: Arc<InMemoryStore>,
        lovable: Arc<MockProvider>,
    }

    fn harness(lovable: Result<&str, ProviderError>, gemini: Result<&str, ProviderError>) -> Harness {
        let config = AppConfig::default();
        let store = Arc::new(InMemoryStore::new());
        let lovable = MockProvider::new(EngineKind::Lovable, lovable);
        let providers = ProviderSet::new(lovable.clone(), MockProvider::new(EngineKind::Gemini, gemini));
        let services = Services::new(&config, Stores::shared(store.clone()), providers);
        let verifier = Arc::new(
            StaticTokenVerifier::default()
                .with_token("alice-token", "alice")
                .with_token("bob-token", "bob"),
        );
        let state = Arc::new(GatewayState::new(&config, services, verifier));
        Harness {
            app: build_router(state, &config.gateway),
            store,
            lovable,
        }
    }

    fn post(uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    const ENGINE: &str = "/functions/v1/unified-ai-engine";
    const CHAT: &str = "/functions/v1/ai-agent-chat";

    #[tokio::test]
    async fn health_is_open() {
        let h = harness(Ok("x"), Ok("x"));
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn missing_or_unknown_token_is_unauthorized() {
        let h = harness(Ok("x"), Ok("x"));
        let body = r#"{"action":"chat","prompt":"Oi"}"#;

        let (status, json) = send(&h.app, post(ENGINE, None, body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["success"], false);

        let (status, _) = send(&h.app, post(ENGINE, Some("forged"), body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(h.lovable.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_bodies_are_bad_requests() {
        let h = harness(Ok("x"), Ok("x"));

        let (status, json) = send(&h.app, post(ENGINE, Some("alice-token"), "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);

        let (status, json) = send(
            &h.app,
            post(ENGINE, Some("alice-token"), r#"{"action":"summarize","skipCache":"yes"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let fields: Vec<&str> = json["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["field"].as_str().unwrap())
            .collect();
        assert!(fields.contains(&"action"));
        assert!(fields.contains(&"skipCache"));
        assert_eq!(h.lovable.calls(), 0);
    }

    #[tokio::test]
    async fn second_identical_request_is_cached() {
        let h = harness(Ok("Resposta"), Ok("x"));
        let body = r#"{"action":"chat","prompt":"O que é CDB?","userId":"mallory"}"#;

        let (status, first) = send(&h.app, post(ENGINE, Some("alice-token"), body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["success"], true);
        assert_eq!(first["cached"], false);
        assert_eq!(first["engine"], "lovable");

        let (_, second) = send(&h.app, post(ENGINE, Some("alice-token"), body)).await;
        assert_eq!(second["cached"], true);
        assert_eq!(second["content"], "Resposta");
        assert_eq!(h.lovable.calls(), 1);

        use simulai_core::RequestLogStore;
        let logs = h.store.recent(10).await.unwrap();
        assert!(logs.iter().all(|l| l.user_id.as_deref() == Some("alice")));
    }

    #[tokio::test]
    async fn exhausted_engines_are_a_server_error() {
        let h = harness(Err(ProviderError::RateLimited), Err(ProviderError::PaymentRequired));
        let (status, json) = send(
            &h.app,
            post(ENGINE, Some("alice-token"), r#"{"action":"chat","prompt":"Oi"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].as_str().unwrap().starts_with("All AI engines failed"));
    }

    async fn seed_session(store: &InMemoryStore, owner: &str) -> Uuid {
        let id = Uuid::new_v4();
        store
            .insert_session(ChatSession {
                id,
                user_id: owner.into(),
                title: "Matemática Financeira".into(),
                created_at: chrono::Utc::now(),
            })
            .await;
        id
    }

    #[tokio::test]
    async fn chat_checks_session_ownership() {
        let h = harness(Ok("Olá!"), Ok("x"));
        let id = seed_session(&h.store, "alice").await;
        let body = json!({"message": "Oi", "sessionId": id}).to_string();

        let (status, json) = send(&h.app, post(CHAT, Some("alice-token"), &body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["response"], "Olá!");
        assert_eq!(json["action"], "chat");

        let (status, _) = send(&h.app, post(CHAT, Some("bob-token"), &body)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let missing = json!({"message": "Oi", "sessionId": Uuid::new_v4()}).to_string();
        let (status, _) = send(&h.app, post(CHAT, Some("alice-token"), &missing)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chat_exhaustion_is_service_unavailable() {
        let h = harness(Err(ProviderError::RateLimited), Err(ProviderError::RateLimited));
        let id = seed_session(&h.store, "alice").await;
        let body = json!({"message": "Oi", "sessionId": id}).to_string();

        let (status, json) = send(&h.app, post(CHAT, Some("alice-token"), &body)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], simulai_engine::UNAVAILABLE_MESSAGE);
    }

    #[tokio::test]
    async fn engine_status_lists_both_engines() {
        let h = harness(Ok("x"), Ok("x"));
        let req = Request::builder()
            .uri("/functions/v1/engine-status")
            .header("authorization", "Bearer alice-token")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["engines"].as_array().unwrap().len(), 2);
        assert_eq!(json["selection"]["primary"], "lovable");
        assert_eq!(json["selection"]["fallback"], "gemini");
    }
}
