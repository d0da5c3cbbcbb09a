//! All backend logic independent of how it is run (CLI or a chat front-end).
//!
//! The centre is [`WarmIndex`]: a Feed-in Tariff installation collection held
//! in memory, searched by embedding similarity with exact postcode-area,
//! technology, capacity and contract-lifetime filters applied here instead of
//! in the vector store.

pub mod app_data;
pub mod collection;
pub mod config;
pub mod embedder;
pub mod index;
pub mod lifetime;
pub mod ollama;
pub mod postcode;
pub mod record;
pub mod technology;
pub mod warm_index;
pub mod watcher;

pub use app_data::app_data_dir;
pub use collection::{ChromaCollection, Collection, CollectionError, JsonlCollection, MemoryCollection, Page};
pub use config::{
    default_config_path, load_config, load_config_from, save_config, set_source_path, Config, ConfigError,
    SourceKind,
};
pub use embedder::{EmbedError, Embedder};
pub use index::{build_index, load_index, ollama_client, IndexError};
pub use lifetime::{years_left, RepoweringWindow};
pub use ollama::{OllamaClient, OllamaError};
pub use record::{Metadata, Record};
pub use technology::Technology;
pub use warm_index::{SearchError, SearchHit, SearchQuery, WarmIndex, DEFAULT_PAGE_SIZE, DEFAULT_TOP_K};
pub use watcher::{watch_collection, WatchError};

/// Returns a short status string. Used to verify the backend is wired up.
pub fn status() -> &'static str {
    "fitwarm-core ready"
}
