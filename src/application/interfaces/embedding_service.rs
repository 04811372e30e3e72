use async_trait::async_trait;

use crate::domain::{DomainError, EmbeddingConfig};

/// Turns text into fixed-length embedding vectors.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError>;

    /// Embeds several texts, failing as a whole if any one call fails.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    fn config(&self) -> &EmbeddingConfig;
}
