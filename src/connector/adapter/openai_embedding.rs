use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::application::EmbeddingService;
use crate::domain::{DomainError, EmbeddingConfig};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const EMBEDDINGS_PATH: &str = "/v1/embeddings";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_DIMENSIONS: usize = 1536;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(serde::Serialize)]
struct ApiRequest<'a> {
    input: Vec<&'a str>,
    model: &'a str,
    dimensions: usize,
}

#[derive(Deserialize)]
struct ApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// HTTP client for the OpenAI embeddings endpoint (and compatible servers).
///
/// Configured from the environment with hosted defaults:
///
/// | Variable               | Default                  |
/// |------------------------|--------------------------|
/// | `OPENAI_BASE_URL`      | `https://api.openai.com` |
/// | `OPENAI_API_KEY`       | `""` (empty)             |
/// | `EMBEDDING_MODEL`      | `text-embedding-3-small` |
/// | `EMBEDDING_DIMENSIONS` | `1536`                   |
///
/// Every request carries a 30 second timeout.
pub struct OpenAiEmbedding {
    client: reqwest::Client,
    api_key: String,
    url: String,
    config: EmbeddingConfig,
}

impl OpenAiEmbedding {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self, DomainError> {
        let base: String = base_url.into();
        let url = format!("{}{EMBEDDINGS_PATH}", base.trim_end_matches('/'));
        Ok(Self {
            client: build_client(REQUEST_TIMEOUT)?,
            api_key: api_key.into(),
            url,
            config: EmbeddingConfig::new(model.into(), dimensions),
        })
    }

    pub fn from_env() -> Result<Self, DomainError> {
        let base =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("EMBEDDING_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        let dimensions = match std::env::var("EMBEDDING_DIMENSIONS") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(
                    "Ignoring invalid EMBEDDING_DIMENSIONS '{}', using {}",
                    raw, DEFAULT_DIMENSIONS
                );
                DEFAULT_DIMENSIONS
            }),
            Err(_) => DEFAULT_DIMENSIONS,
        };
        Self::new(key, model, base, dimensions)
    }

    /// Replaces the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, DomainError> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.config = EmbeddingConfig::new(self.config.model_name().to_string(), dimensions);
        self
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, DomainError> {
        let request = ApiRequest {
            input: texts.to_vec(),
            model: self.config.model_name(),
            dimensions: self.config.dimensions(),
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DomainError::embedding(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Embeddings API returned {status}: {body}");
            return Err(DomainError::embedding(format!("API returned {status}")));
        }

        let mut api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| DomainError::embedding(format!("failed to parse response: {e}")))?;

        if api_response.data.len() != texts.len() {
            return Err(DomainError::embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                api_response.data.len()
            )));
        }

        api_response.data.sort_by_key(|d| d.index);

        let expected = self.config.dimensions();
        let mut vectors = Vec::with_capacity(api_response.data.len());
        for data in api_response.data {
            if data.embedding.len() != expected {
                return Err(DomainError::embedding(format!(
                    "expected {} dimensions, got {}",
                    expected,
                    data.embedding.len()
                )));
            }
            vectors.push(data.embedding);
        }

        debug!("Received {} embeddings from {}", vectors.len(), self.url);
        Ok(vectors)
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, DomainError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DomainError::internal(format!("Failed to build HTTP client: {e}")))
}

#[async_trait]
impl EmbeddingService for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        self.request(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::embedding("empty response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.request(&refs).await
    }

    fn config(&self) -> &EmbeddingConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, dimensions: usize) -> OpenAiEmbedding {
        OpenAiEmbedding::new("sk-test", "text-embedding-3-small", server.uri(), dimensions)
            .unwrap()
    }

    #[tokio::test]
    async fn test_embed_sends_model_and_dimensions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "input": ["What detergents do you use?"],
                "model": "text-embedding-3-small",
                "dimensions": 3
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [{"object": "embedding", "index": 0, "embedding": [0.1, 0.2, 0.3]}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let vector = client(&server, 3)
            .embed("What detergents do you use?")
            .await
            .unwrap();

        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_batch_is_reordered_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]
            })))
            .mount(&server)
            .await;

        let texts = vec!["a".to_string(), "b".to_string()];
        let vectors = client(&server, 2).embed_batch(&texts).await.unwrap();

        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_http_error_is_embedding_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = client(&server, 3).embed("query").await.unwrap_err();
        assert!(err.is_embedding_error());
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_embedding_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [0.5, 0.5]}]
            })))
            .mount(&server)
            .await;

        let err = client(&server, 3).embed("query").await.unwrap_err();
        assert!(err.is_embedding_error());
    }

    #[tokio::test]
    async fn test_malformed_body_is_embedding_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server, 3).embed("query").await.unwrap_err();
        assert!(err.is_embedding_error());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_embedding_error() {
        let service = OpenAiEmbedding::new("", "m", "http://127.0.0.1:1", 3).unwrap();
        let err = service.embed("query").await.unwrap_err();
        assert!(err.is_embedding_error());
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let service = OpenAiEmbedding::new("", "m", "http://localhost:8080/", 3).unwrap();
        assert_eq!(service.url, "http://localhost:8080/v1/embeddings");
        assert_eq!(service.with_dimensions(8).config().dimensions(), 8);
    }

    #[tokio::test]
    async fn test_slow_response_hits_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": [{"index": 0, "embedding": [0.1, 0.2, 0.3]}]}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let service = client(&server, 3)
            .with_timeout(Duration::from_millis(200))
            .unwrap();
        let err = service.embed("query").await.unwrap_err();
        assert!(err.is_embedding_error());
    }
}
