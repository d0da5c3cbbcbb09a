//! Build pipeline: config → collection → warm index, embedding via Ollama.

use tracing::info;

use crate::collection::{ChromaCollection, CollectionError, JsonlCollection};
use crate::config::{Config, SourceKind};
use crate::embedder::Embedder;
use crate::ollama::{OllamaClient, OllamaError};
use crate::warm_index::WarmIndex;

/// Ollama embedder as configured.
pub fn ollama_client(config: &Config) -> Result<OllamaClient, IndexError> {
    Ok(OllamaClient::from_url(&config.ollama.url)?.with_embed_model(config.ollama.embed_model.clone()))
}

/// Loads the configured source into a warm index that embeds queries with Ollama.
pub async fn build_index(config: &Config) -> Result<WarmIndex<OllamaClient>, IndexError> {
    let client = ollama_client(config)?;
    load_index(config, client).await
}

/// Loads the configured source into a warm index with any embedder.
pub async fn load_index<E: Embedder>(config: &Config, embedder: E) -> Result<WarmIndex<E>, IndexError> {
    let page_size = config.source.page_size;
    let index = match config.source.kind {
        SourceKind::Jsonl => {
            let path = config.source_path().ok_or(IndexError::NoSource)?;
            info!(path = %path.display(), "loading jsonl collection");
            let collection = JsonlCollection::open(&path)?;
            WarmIndex::load(&collection, embedder, page_size).await?
        }
        SourceKind::Chroma => {
            info!(
                url = %config.source.chroma_url,
                collection = %config.source.collection,
                "loading chroma collection"
            );
            let collection =
                ChromaCollection::connect(&config.source.chroma_url, &config.source.collection).await?;
            WarmIndex::load(&collection, embedder, page_size).await?
        }
    };
    Ok(index)
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("no collection source configured (run `fitwarm set-source <PATH>`)")]
    NoSource,
    #[error("collection error: {0}")]
    Collection(#[from] CollectionError),
    #[error("embedding error: {0}")]
    Ollama(#[from] OllamaError),
}
