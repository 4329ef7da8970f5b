use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::errors::RagError;
use crate::model::RetrievedDocument;

pub const DEFAULT_RETRIEVAL_TIMEOUT: Duration = Duration::from_secs(3);

#[async_trait]
pub trait RetrievalClient: Send + Sync {
    /// Returns up to `top_k` documents ranked descending by similarity score,
    /// ties kept in index order.
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedDocument>, RagError>;

    /// Writes a direct-answer Q&A pair back into the index so later queries
    /// can retrieve it.
    async fn index_answer(&self, query: &str, answer: &str) -> Result<(), RagError>;
}

fn answer_text(query: &str, answer: &str) -> String {
    format!("Q: {query}\nA: {answer}")
}

/// In-memory retrieval over a seeded document list. Used by tests and by
/// deployments that have no vector store wired up yet.
#[derive(Clone, Default)]
pub struct StaticRetrieval {
    docs: Arc<RwLock<Vec<RetrievedDocument>>>,
}

impl StaticRetrieval {
    pub fn new(mut docs: Vec<RetrievedDocument>) -> Self {
        docs.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Self {
            docs: Arc::new(RwLock::new(docs)),
        }
    }
}

#[async_trait]
impl RetrievalClient for StaticRetrieval {
    async fn retrieve(
        &self,
        _query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedDocument>, RagError> {
        Ok(self.docs.read().iter().take(top_k).cloned().collect())
    }

    /// Indexed answers score 0.0: this backend has no similarity function,
    /// so they never outrank seeded documents.
    async fn index_answer(&self, query: &str, answer: &str) -> Result<(), RagError> {
        let mut docs = self.docs.write();
        let doc = RetrievedDocument {
            id: format!("answer-{}", docs.len() + 1),
            title: query.to_string(),
            snippet: answer_text(query, answer),
            source_url: String::new(),
            score: 0.0,
        };
        docs.push(doc);
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct HttpRetrievalConfig {
    pub base_url: Url,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl HttpRetrievalConfig {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, RagError> {
        let base_url = Url::parse(base_url.as_ref())
            .map_err(|err| RagError::config(&format!("retrieval base url parse failed: {err}")))?;
        Ok(Self {
            base_url,
            api_key: None,
            timeout: DEFAULT_RETRIEVAL_TIMEOUT,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct VectorQueryRequest<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Deserialize)]
struct VectorQueryResponse {
    #[serde(default)]
    matches: Vec<VectorMatch>,
}

#[derive(Deserialize)]
struct VectorMatch {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    source_url: String,
    score: f32,
}

#[derive(Serialize)]
struct IndexDocumentRequest<'a> {
    text: String,
    metadata: IndexDocumentMetadata<'a>,
}

#[derive(Serialize)]
struct IndexDocumentMetadata<'a> {
    source: &'static str,
    query: &'a str,
}

/// Queries an external vector index over HTTP.
pub struct HttpRetrievalClient {
    client: Client,
    query_url: Url,
    documents_url: Url,
}

impl HttpRetrievalClient {
    pub fn new(config: HttpRetrievalConfig) -> Result<Self, RagError> {
        let mut builder = Client::builder().use_rustls_tls().timeout(config.timeout);
        if let Some(api_key) = config.api_key.as_ref() {
            let mut headers = reqwest::header::HeaderMap::new();
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|err| RagError::config(&format!("invalid retrieval api key: {err}")))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
            builder = builder.default_headers(headers);
        }
        let client = builder
            .build()
            .map_err(|err| RagError::config(&format!("retrieval client build failed: {err}")))?;
        let query_url = config
            .base_url
            .join("query")
            .map_err(|err| RagError::config(&format!("retrieval url join failed: {err}")))?;
        let documents_url = config
            .base_url
            .join("documents")
            .map_err(|err| RagError::config(&format!("retrieval url join failed: {err}")))?;
        Ok(Self {
            client,
            query_url,
            documents_url,
        })
    }
}

#[async_trait]
impl RetrievalClient for HttpRetrievalClient {
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedDocument>, RagError> {
        let response = self
            .client
            .post(self.query_url.clone())
            .json(&VectorQueryRequest { query, top_k })
            .send()
            .await
            .map_err(|err| {
                RagError::retrieval_unavailable(&format!("vector query error: {err}"))
            })?;
        if response.status() != StatusCode::OK {
            return Err(RagError::retrieval_unavailable(&format!(
                "vector query status: {}",
                response.status()
            )));
        }
        let payload: VectorQueryResponse = response.json().await.map_err(|err| {
            RagError::retrieval_unavailable(&format!("vector query decode error: {err}"))
        })?;
        Ok(payload
            .matches
            .into_iter()
            .map(|m| RetrievedDocument {
                id: m.id,
                title: m.title,
                snippet: m.snippet,
                source_url: m.source_url,
                score: m.score,
            })
            .collect())
    }

    async fn index_answer(&self, query: &str, answer: &str) -> Result<(), RagError> {
        let request = IndexDocumentRequest {
            text: answer_text(query, answer),
            metadata: IndexDocumentMetadata {
                source: "llm_response",
                query,
            },
        };
        let response = self
            .client
            .post(self.documents_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                RagError::retrieval_unavailable(&format!("document index error: {err}"))
            })?;
        if !response.status().is_success() {
            return Err(RagError::retrieval_unavailable(&format!(
                "document index status: {}",
                response.status()
            )));
        }
        Ok(())
    }
}
