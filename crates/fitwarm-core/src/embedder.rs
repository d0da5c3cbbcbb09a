//! Text embedding capability consumed by the warm index.

use async_trait::async_trait;

use crate::ollama::OllamaError;

/// Turns texts into vectors, one per input, in input order.
/// Expected to be deterministic for identical input.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("embedding error: {0}")]
    Ollama(#[from] OllamaError),
    #[error("embedder returned {got} vectors for {expected} inputs")]
    Count { expected: usize, got: usize },
    #[error("embedding error: {0}")]
    Other(String),
}
