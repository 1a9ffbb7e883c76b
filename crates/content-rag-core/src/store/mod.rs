//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the capability boundary between the
//! content store and whatever index actually holds chunks and vectors
//! (SQLite in the application crate, [`memory::InMemoryStore`] here).
//! Embedding is the store's concern: `add` and `similarity_search` take
//! raw text and the implementation embeds it.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::chunk::ChunkRecord;
use crate::filter::Filter;
use crate::models::{Document, Metadata};

/// Records matching a filter, as parallel arrays in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetResult {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<Metadata>,
}

impl GetResult {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterate `(id, document)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Document)> + '_ {
        self.ids
            .iter()
            .zip(self.documents.iter())
            .zip(self.metadatas.iter())
            .map(|((id, text), metadata)| {
                (
                    id.as_str(),
                    Document {
                        text: text.clone(),
                        metadata: metadata.clone(),
                    },
                )
            })
    }
}

/// A similarity search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    /// Similarity score, higher is closer. Backends that cannot report
    /// a score leave it `None`.
    pub score: Option<f32>,
}

/// Abstract vector index.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](VectorStore::add) | Embed and insert chunk records |
/// | [`get`](VectorStore::get) | Fetch all records matching a filter |
/// | [`delete`](VectorStore::delete) | Remove records by id |
/// | [`similarity_search`](VectorStore::similarity_search) | Top-k nearest records under a filter |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embed and insert records. Ids are caller-generated.
    async fn add(&self, records: &[ChunkRecord]) -> Result<()>;

    /// All records matching `filter`, in insertion order.
    async fn get(&self, filter: &Filter) -> Result<GetResult>;

    /// Delete records by id. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<()>;

    /// At most `k` records matching `filter`, nearest to `query` first.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: &Filter,
    ) -> Result<Vec<ScoredDocument>>;
}
