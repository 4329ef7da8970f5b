use std::{
    collections::HashMap,
    env,
    net::SocketAddr,
    path::Path,
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context};
use axum::body::Body;
use axum::{
    extract::{Path as UrlPath, Query, State},
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use config::Config;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{info, warn};

use ragbase_auth::prelude::{
    HttpKeyFetcher, JwkKey, KeySetCache, TokenVerifier, VerifiedIdentity, VerifierConfig,
};
use ragbase_errors::prelude::*;
use ragbase_rag::prelude::{
    ConfidenceRouter, GenerationClient, HttpRetrievalClient, HttpRetrievalConfig,
    LocalGenerationClient, OpenAiGenerationClient, OpenAiGenerationConfig, RetrievalClient,
    RetrievedDocument, RouterConfig, RoutingDecision, StaticRetrieval,
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_SIMILARITY_TOP_K,
};
use ragbase_storage::prelude::{
    ConversationStore, MemoryConversationStore, MessageRole, SortOrder, ThreadSortField,
    DEFAULT_REQUEST_QUOTA,
};
use ragbase_types::prelude::PageRequest;

const THREAD_TITLE_MAX_CHARS: usize = 50;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = GatewayConfig::load()?;
    let state = AppState::new(&config)?;

    let app = router(state.clone());

    let addr: SocketAddr = format!("{}:{}", config.server.address, config.server.port)
        .parse()
        .context("invalid server address/port")?;

    info!(%addr, "gateway listening");
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server failure")?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/query", axum::routing::post(query))
        .route("/chat/threads", get(list_threads))
        .route(
            "/chat/threads/:id",
            get(get_thread).delete(delete_thread),
        )
        .route("/chat/threads/:id/messages", get(list_messages))
        .with_state(state.clone())
        .layer(from_fn_with_state(state, metrics_middleware))
}

fn init_tracing() {
    if tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .finish(),
    )
    .is_err()
    {
        // Subscriber already set by tests or external runtime.
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GatewayConfig {
    #[serde(default)]
    server: ServerConfig,
    auth: AuthBootstrap,
    #[serde(default)]
    rag: RagBootstrap,
    #[serde(default)]
    limits: LimitsConfig,
}

impl GatewayConfig {
    fn load() -> anyhow::Result<Self> {
        let config_file = env::var("GATEWAY_CONFIG_FILE")
            .unwrap_or_else(|_| "config/gateway.local.toml".to_string());

        let mut builder = Config::builder()
            .set_default("server.address", ServerConfig::default_address())?
            .set_default("server.port", ServerConfig::default_port())?;

        if Path::new(&config_file).exists() {
            builder = builder.add_source(config::File::from(Path::new(&config_file)));
        }

        builder = builder.add_source(config::Environment::with_prefix("GATEWAY").separator("__"));

        let mut config: GatewayConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        // Flat env names kept for deployment compatibility.
        if let Ok(raw) = env::var("RAG_CONFIDENCE_THRESHOLD") {
            config.rag.confidence_threshold = raw
                .parse()
                .context("RAG_CONFIDENCE_THRESHOLD must be a float")?;
        }
        if let Ok(raw) = env::var("RAG_SIMILARITY_TOP_K") {
            config.rag.similarity_top_k = raw
                .parse()
                .context("RAG_SIMILARITY_TOP_K must be an integer")?;
        }

        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ServerConfig {
    #[serde(default = "ServerConfig::default_address")]
    address: String,
    #[serde(default = "ServerConfig::default_port")]
    port: u16,
}

impl ServerConfig {
    fn default_address() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        8080
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: Self::default_address(),
            port: Self::default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AuthBootstrap {
    issuer: String,
    audience: String,
    #[serde(default = "AuthBootstrap::default_algorithms")]
    algorithms: Vec<String>,
    jwks: JwksSource,
}

impl AuthBootstrap {
    fn default_algorithms() -> Vec<String> {
        vec!["RS256".to_string()]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum JwksSource {
    Static {
        keys: Vec<JwkKey>,
    },
    Http {
        uri: String,
        #[serde(default = "default_key_ttl_secs")]
        ttl_secs: u64,
    },
}

fn default_key_ttl_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, Deserialize)]
struct RagBootstrap {
    #[serde(default = "default_confidence_threshold")]
    confidence_threshold: f32,
    #[serde(default = "default_similarity_top_k")]
    similarity_top_k: usize,
    #[serde(default)]
    retrieval: RetrievalBootstrap,
    #[serde(default)]
    generation: GenerationBootstrap,
}

impl Default for RagBootstrap {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            similarity_top_k: default_similarity_top_k(),
            retrieval: RetrievalBootstrap::default(),
            generation: GenerationBootstrap::default(),
        }
    }
}

fn default_confidence_threshold() -> f32 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_similarity_top_k() -> usize {
    DEFAULT_SIMILARITY_TOP_K
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RetrievalBootstrap {
    Memory {
        #[serde(default)]
        documents: Vec<RetrievedDocument>,
    },
    Http {
        base_url: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default)]
        api_key_env: Option<String>,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
}

impl Default for RetrievalBootstrap {
    fn default() -> Self {
        RetrievalBootstrap::Memory {
            documents: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum GenerationBootstrap {
    Local,
    Openai {
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default)]
        api_key_env: Option<String>,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
}

impl Default for GenerationBootstrap {
    fn default() -> Self {
        GenerationBootstrap::Local
    }
}

#[derive(Debug, Clone, Deserialize)]
struct LimitsConfig {
    #[serde(default = "LimitsConfig::default_max_question_chars")]
    max_question_chars: usize,
    #[serde(default = "LimitsConfig::default_max_requests_per_user")]
    max_requests_per_user: u32,
}

impl LimitsConfig {
    fn default_max_question_chars() -> usize {
        1000
    }

    fn default_max_requests_per_user() -> u32 {
        DEFAULT_REQUEST_QUOTA
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_question_chars: Self::default_max_question_chars(),
            max_requests_per_user: Self::default_max_requests_per_user(),
        }
    }
}

fn resolve_secret(
    literal: &Option<String>,
    env_key: &Option<String>,
    field: &str,
) -> anyhow::Result<String> {
    if let Some(env_var) = env_key.as_ref() {
        let value = env::var(env_var)
            .with_context(|| format!("environment variable {env_var} for {field} not set"))?;
        return Ok(value);
    }
    if let Some(value) = literal.as_ref() {
        if value.is_empty() {
            return Err(anyhow!("{field} literal secret cannot be empty"));
        }
        return Ok(value.clone());
    }
    Err(anyhow!("{field} secret must be provided via literal/env"))
}

#[derive(Clone)]
struct AppState {
    verifier: Arc<TokenVerifier>,
    router: Arc<ConfidenceRouter>,
    store: Arc<dyn ConversationStore>,
    limits: LimitsConfig,
    metrics: GatewayMetrics,
}

impl AppState {
    fn new(config: &GatewayConfig) -> anyhow::Result<Self> {
        let keys = match &config.auth.jwks {
            JwksSource::Static { keys } => Arc::new(KeySetCache::static_keys(keys.clone())),
            JwksSource::Http { uri, ttl_secs } => {
                let fetcher = HttpKeyFetcher::new(uri.clone())
                    .map_err(|err| anyhow!("jwks fetcher: {err}"))?;
                Arc::new(KeySetCache::new(
                    Arc::new(fetcher),
                    Some(Duration::from_secs(*ttl_secs)),
                ))
            }
        };

        let algorithms = config
            .auth
            .algorithms
            .iter()
            .map(|alg| {
                jsonwebtoken::Algorithm::from_str(alg)
                    .map_err(|_| anyhow!("unsupported jwt algorithm {alg}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let verifier = Arc::new(TokenVerifier::new(
            VerifierConfig::new(&config.auth.issuer, &config.auth.audience)
                .with_algorithms(algorithms),
            keys,
        ));

        let retrieval: Arc<dyn RetrievalClient> = match &config.rag.retrieval {
            RetrievalBootstrap::Memory { documents } => {
                Arc::new(StaticRetrieval::new(documents.clone()))
            }
            RetrievalBootstrap::Http {
                base_url,
                api_key,
                api_key_env,
                timeout_secs,
            } => {
                let mut http = HttpRetrievalConfig::new(base_url)
                    .map_err(|err| anyhow!("retrieval config: {err}"))?;
                if api_key.is_some() || api_key_env.is_some() {
                    http = http.with_api_key(resolve_secret(
                        api_key,
                        api_key_env,
                        "rag.retrieval.api_key",
                    )?);
                }
                if let Some(secs) = timeout_secs {
                    http = http.with_timeout(Duration::from_secs(*secs));
                }
                Arc::new(
                    HttpRetrievalClient::new(http)
                        .map_err(|err| anyhow!("retrieval client: {err}"))?,
                )
            }
        };

        let generation: Arc<dyn GenerationClient> = match &config.rag.generation {
            GenerationBootstrap::Local => Arc::new(LocalGenerationClient),
            GenerationBootstrap::Openai {
                api_key,
                api_key_env,
                base_url,
                model,
                timeout_secs,
            } => {
                let key = resolve_secret(api_key, api_key_env, "rag.generation.api_key")?;
                let mut openai = OpenAiGenerationConfig::new(key)
                    .map_err(|err| anyhow!("generation config: {err}"))?;
                if let Some(url) = base_url {
                    openai = openai
                        .with_base_url(url)
                        .map_err(|err| anyhow!("generation base url: {err}"))?;
                }
                if let Some(model) = model {
                    openai = openai.with_model(model.clone());
                }
                if let Some(secs) = timeout_secs {
                    openai = openai.with_timeout(Duration::from_secs(*secs));
                }
                Arc::new(
                    OpenAiGenerationClient::new(openai)
                        .map_err(|err| anyhow!("generation client: {err}"))?,
                )
            }
        };

        let router = Arc::new(ConfidenceRouter::new(
            retrieval,
            generation,
            RouterConfig {
                confidence_threshold: config.rag.confidence_threshold,
                similarity_top_k: config.rag.similarity_top_k,
            },
        ));

        let store: Arc<dyn ConversationStore> = Arc::new(MemoryConversationStore::new(
            config.limits.max_requests_per_user,
        ));

        Ok(Self {
            verifier,
            router,
            store,
            limits: config.limits.clone(),
            metrics: GatewayMetrics::default(),
        })
    }
}

const RETRY_AFTER_SECS: &str = "30";

fn error_response(obj: &ErrorObj) -> Response {
    let status = StatusCode::from_u16(obj.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, Json(obj.public_view())).into_response();
    if obj.retry().is_transient() {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
    }
    response
}

fn unauthenticated(dev_msg: &str) -> Response {
    error_response(
        &ErrorBuilder::new(codes::AUTH_UNAUTHENTICATED)
            .user_msg("Invalid or expired token.")
            .dev_msg(dev_msg)
            .build(),
    )
}

fn bad_request(user_msg: &str) -> Response {
    error_response(
        &ErrorBuilder::new(codes::SCHEMA_VALIDATION)
            .user_msg(user_msg)
            .build(),
    )
}

fn thread_not_found(thread_id: &str) -> Response {
    error_response(
        &ErrorBuilder::new(codes::STORAGE_NOT_FOUND)
            .user_msg("Thread not found.")
            .dev_msg(&format!("thread {thread_id} not found for caller"))
            .build(),
    )
}

/// Extracts and verifies the bearer token. A missing or non-bearer header is
/// rejected before any verifier work; verification failures are logged by
/// variant but the response body stays generic.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<VerifiedIdentity, Response> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    let token = match token {
        Some(token) => token,
        None => {
            state.metrics.record_auth_failure().await;
            return Err(unauthenticated("missing bearer token"));
        }
    };

    match state.verifier.verify(token).await {
        Ok(identity) => Ok(identity),
        Err(failure) => {
            warn!(failure = failure.as_str(), "token verification failed");
            state.metrics.record_auth_failure().await;
            Err(unauthenticated(failure.as_str()))
        }
    }
}

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
    #[serde(default)]
    thread_id: Option<String>,
}

fn thread_title(question: &str) -> String {
    let mut title: String = question.chars().take(THREAD_TITLE_MAX_CHARS).collect();
    if question.chars().count() > THREAD_TITLE_MAX_CHARS {
        title.push_str("...");
    }
    title
}

async fn query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<QueryRequest>,
) -> Response {
    let identity = match authenticate(&state, &headers).await {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    let owner = identity.owner_key().to_string();

    let question = body.question.trim();
    if question.is_empty() {
        return bad_request("Question must not be empty.");
    }
    if question.chars().count() > state.limits.max_question_chars {
        return bad_request("Question is too long.");
    }

    match state.store.requests_available(&owner).await {
        Ok(0) => {
            return error_response(
                &ErrorBuilder::new(codes::QUOTA_EXCEEDED)
                    .user_msg("You have used all of your available requests.")
                    .build(),
            )
        }
        Ok(_) => {}
        Err(err) => return error_response(&err.into_inner()),
    }

    let thread = match &body.thread_id {
        Some(thread_id) => match state.store.thread(&owner, thread_id).await {
            Ok(Some(thread)) => thread,
            Ok(None) => return thread_not_found(thread_id),
            Err(err) => return error_response(&err.into_inner()),
        },
        None => match state.store.create_thread(&owner, &thread_title(question)).await {
            Ok(thread) => thread,
            Err(err) => return error_response(&err.into_inner()),
        },
    };
    let thread_id = thread.id.to_string();

    // Persistence is best-effort around the answer: a failed append is
    // reported and counted but never turns into a lost answer.
    if let Err(err) = state
        .store
        .append_message(&owner, &thread_id, MessageRole::User, question)
        .await
    {
        warn!(error = %err, %thread_id, "failed to persist user message");
        state.metrics.record_append_failure().await;
    }

    let routed = match state.router.route(question).await {
        Ok(routed) => routed,
        Err(err) => return error_response(&err.into_inner()),
    };

    if let Err(err) = state
        .store
        .append_message(&owner, &thread_id, MessageRole::Assistant, &routed.answer)
        .await
    {
        warn!(error = %err, %thread_id, "failed to persist assistant message");
        state.metrics.record_append_failure().await;
    }

    if let Err(err) = state.store.consume_request(&owner).await {
        warn!(error = %err, "failed to consume request quota");
    }

    let sources = match &routed.decision {
        RoutingDecision::UseRag { .. } => Some(
            routed
                .sources
                .iter()
                .map(|doc| {
                    json!({
                        "title": doc.title,
                        "url": doc.source_url,
                        "snippet": doc.snippet,
                        "confidence": doc.score,
                    })
                })
                .collect::<Vec<_>>(),
        ),
        RoutingDecision::UseDirect { .. } => None,
    };

    let mut response = json!({
        "answer": routed.answer,
        "thread_id": thread_id,
    });
    if let (Some(sources), Some(map)) = (sources, response.as_object_mut()) {
        map.insert("sources".into(), json!(sources));
    }
    Json(response).into_response()
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    page_size: Option<u32>,
    #[serde(default)]
    sort_by: Option<String>,
    #[serde(default)]
    order: Option<String>,
}

impl ListParams {
    fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page.unwrap_or(1), self.page_size.unwrap_or(10))
    }
}

async fn list_threads(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Response {
    let identity = match authenticate(&state, &headers).await {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let sort_by = params
        .sort_by
        .as_deref()
        .map(ThreadSortField::parse)
        .unwrap_or_default();
    let order = params
        .order
        .as_deref()
        .map(SortOrder::parse)
        .unwrap_or_default();

    match state
        .store
        .list_threads(identity.owner_key(), params.page_request(), sort_by, order)
        .await
    {
        Ok(page) => Json(page).into_response(),
        Err(err) => error_response(&err.into_inner()),
    }
}

async fn get_thread(
    State(state): State<AppState>,
    headers: HeaderMap,
    UrlPath(thread_id): UrlPath<String>,
) -> Response {
    let identity = match authenticate(&state, &headers).await {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    match state.store.thread(identity.owner_key(), &thread_id).await {
        Ok(Some(thread)) => Json(thread).into_response(),
        Ok(None) => thread_not_found(&thread_id),
        Err(err) => error_response(&err.into_inner()),
    }
}

async fn list_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    UrlPath(thread_id): UrlPath<String>,
    Query(params): Query<ListParams>,
) -> Response {
    let identity = match authenticate(&state, &headers).await {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    // Messages default to chronological order.
    let order = params
        .order
        .as_deref()
        .map(SortOrder::parse)
        .unwrap_or(SortOrder::Asc);

    match state
        .store
        .list_messages(
            identity.owner_key(),
            &thread_id,
            params.page_request(),
            order,
        )
        .await
    {
        Ok(page) => Json(page).into_response(),
        Err(err) if err.is_not_found() => thread_not_found(&thread_id),
        Err(err) => error_response(&err.into_inner()),
    }
}

async fn delete_thread(
    State(state): State<AppState>,
    headers: HeaderMap,
    UrlPath(thread_id): UrlPath<String>,
) -> Response {
    let identity = match authenticate(&state, &headers).await {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    match state
        .store
        .delete_thread(identity.owner_key(), &thread_id)
        .await
    {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => thread_not_found(&thread_id),
        Err(err) => error_response(&err.into_inner()),
    }
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.snapshot().await;
    Json(snapshot)
}

async fn metrics_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let response = next.run(req).await;
    let status = response.status();
    state.metrics.record(&path, status, start.elapsed()).await;
    Ok(response)
}

#[derive(Clone, Default)]
struct GatewayMetrics {
    inner: Arc<tokio::sync::Mutex<MetricsInner>>,
}

#[derive(Default)]
struct MetricsInner {
    total_requests: u64,
    total_errors: u64,
    auth_failures: u64,
    store_append_failures: u64,
    routes: HashMap<String, RouteStats>,
}

#[derive(Default)]
struct RouteStats {
    request_count: u64,
    error_count: u64,
    total_latency_ms: u64,
}

impl GatewayMetrics {
    async fn record(&self, route: &str, status: StatusCode, latency: Duration) {
        let mut inner = self.inner.lock().await;
        inner.total_requests += 1;
        if status.is_client_error() || status.is_server_error() {
            inner.total_errors += 1;
        }
        let stats = inner.routes.entry(route.to_string()).or_default();
        stats.request_count += 1;
        if status.is_client_error() || status.is_server_error() {
            stats.error_count += 1;
        }
        stats.total_latency_ms += latency.as_millis() as u64;
    }

    async fn record_auth_failure(&self) {
        self.inner.lock().await.auth_failures += 1;
    }

    async fn record_append_failure(&self) {
        self.inner.lock().await.store_append_failures += 1;
    }

    async fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock().await;
        let routes = inner
            .routes
            .iter()
            .map(|(route, stats)| RouteMetrics {
                route: route.clone(),
                requests: stats.request_count,
                errors: stats.error_count,
                avg_latency_ms: if stats.request_count > 0 {
                    Some(stats.total_latency_ms as f64 / stats.request_count as f64)
                } else {
                    None
                },
            })
            .collect();
        MetricsSnapshot {
            total_requests: inner.total_requests,
            total_errors: inner.total_errors,
            auth_failures: inner.auth_failures,
            store_append_failures: inner.store_append_failures,
            routes,
        }
    }
}

#[derive(serde::Serialize)]
struct MetricsSnapshot {
    total_requests: u64,
    total_errors: u64,
    auth_failures: u64,
    store_append_failures: u64,
    routes: Vec<RouteMetrics>,
}

#[derive(serde::Serialize)]
struct RouteMetrics {
    route: String,
    requests: u64,
    errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    avg_latency_ms: Option<f64>,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_questions_title_verbatim() {
        assert_eq!(thread_title("What is RAG?"), "What is RAG?");
    }

    #[test]
    fn long_questions_truncate_with_ellipsis() {
        let question = "x".repeat(80);
        let title = thread_title(&question);
        assert_eq!(title.chars().count(), THREAD_TITLE_MAX_CHARS + 3);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn config_defaults_apply() {
        let config: GatewayConfig = serde_json::from_value(json!({
            "auth": {
                "issuer": "https://issuer.example",
                "audience": "client-id",
                "jwks": { "kind": "static", "keys": [] }
            }
        }))
        .expect("parse config");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.limits.max_question_chars, 1000);
        assert_eq!(config.limits.max_requests_per_user, DEFAULT_REQUEST_QUOTA);
        assert!(matches!(
            config.rag.retrieval,
            RetrievalBootstrap::Memory { .. }
        ));
    }
}
