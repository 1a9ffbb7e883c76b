//! Content store: identity-scoped CRUD over a [`VectorStore`].
//!
//! Every `(owner, category)` pair holds at most one live content unit.
//! [`ContentStore::save_content`] supersedes the scope by deleting every
//! chunk that matches the identity filter before inserting the new
//! chunks. The two steps run strictly in sequence inside one call but
//! are not atomic across calls: concurrent saves to the same scope can
//! interleave, and readers may see a scope mid-transition. Callers that
//! need single-writer semantics per scope must serialize externally.
//!
//! Store failures are returned as [`RagError::Store`]; nothing is
//! retried or swallowed here.

use std::sync::Arc;

use crate::chunk::Chunker;
use crate::error::{RagError, Result};
use crate::filter::{build_filter, Filter};
use crate::models::{ContentUnit, Document};
use crate::pipeline::ScopedRetriever;
use crate::store::VectorStore;

/// Default number of passages returned by [`ContentStore::search_documents`].
pub const DEFAULT_SEARCH_LIMIT: usize = 4;

/// Orchestrates chunking, replace-on-write persistence, reads, and
/// similarity search for identity scopes.
#[derive(Clone)]
pub struct ContentStore {
    store: Arc<dyn VectorStore>,
    chunker: Chunker,
}

impl ContentStore {
    pub fn new(store: Arc<dyn VectorStore>, chunker: Chunker) -> Self {
        Self { store, chunker }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Identity filter for a scope. See [`build_filter`].
    pub fn build_filter(owner: &str, category: Option<&str>) -> Filter {
        build_filter(owner, category)
    }

    /// Replace the content of `(owner, category)` with `text`.
    ///
    /// Fails with [`RagError::InvalidInput`] before touching the store
    /// when `owner` or `text` is empty. Otherwise deletes every chunk
    /// in the scope, then inserts the chunks of `text`. If the insert
    /// fails after the delete succeeded, the scope is left empty.
    pub async fn save_content(
        &self,
        owner: &str,
        text: &str,
        category: Option<&str>,
    ) -> Result<ContentUnit> {
        require_owner(owner)?;
        if text.is_empty() {
            return Err(RagError::invalid_input("content text must not be empty"));
        }

        let filter = build_filter(owner, category);
        let superseded = self.delete_matching(&filter).await?;

        let unit = ContentUnit::new(owner, text, category.map(str::to_string));
        let records = self.chunker.chunk(&unit.text, &unit.metadata());
        self.store.add(&records).await.map_err(RagError::Store)?;

        tracing::info!(
            owner,
            category = category.unwrap_or("<none>"),
            chunks = records.len(),
            superseded,
            "saved content"
        );
        Ok(unit)
    }

    /// Join `documents` with `\n` and save the result.
    ///
    /// An empty slice is a no-op that returns `None`.
    pub async fn save_documents(
        &self,
        owner: &str,
        documents: &[Document],
        category: Option<&str>,
    ) -> Result<Option<ContentUnit>> {
        if documents.is_empty() {
            tracing::debug!(owner, "no documents to save");
            return Ok(None);
        }
        let text = documents
            .iter()
            .map(|d| d.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.save_content(owner, &text, category).await.map(Some)
    }

    /// Stored chunks of a scope, one [`ContentUnit`] per chunk.
    ///
    /// Without a category, every chunk of the owner is returned
    /// regardless of its category.
    pub async fn get_content(
        &self,
        owner: &str,
        category: Option<&str>,
    ) -> Result<Vec<ContentUnit>> {
        require_owner(owner)?;
        let filter = build_filter(owner, category);
        let result = self.store.get(&filter).await.map_err(RagError::Store)?;
        result
            .iter()
            .map(|(id, doc)| ContentUnit::from_document(id, &doc))
            .collect()
    }

    /// At most `limit` passages of the scope, most similar to `query` first.
    pub async fn search_documents(
        &self,
        query: &str,
        owner: &str,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Document>> {
        require_owner(owner)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let filter = build_filter(owner, category);
        tracing::debug!(%filter, limit, "similarity search");
        let hits = self
            .store
            .similarity_search(query, limit, &filter)
            .await
            .map_err(RagError::Store)?;
        Ok(hits.into_iter().map(|h| h.document).collect())
    }

    /// Delete every chunk of a scope. Returns the number of chunks removed.
    pub async fn delete_content(&self, owner: &str, category: Option<&str>) -> Result<usize> {
        require_owner(owner)?;
        let removed = self.delete_matching(&build_filter(owner, category)).await?;
        tracing::info!(
            owner,
            category = category.unwrap_or("<none>"),
            removed,
            "deleted content"
        );
        Ok(removed)
    }

    /// A context provider bound to one scope.
    pub fn as_retriever(
        self: &Arc<Self>,
        owner: &str,
        category: Option<&str>,
        limit: usize,
    ) -> ScopedRetriever {
        ScopedRetriever::new(Arc::clone(self), owner, category, limit)
    }

    async fn delete_matching(&self, filter: &Filter) -> Result<usize> {
        let existing = self.store.get(filter).await.map_err(RagError::Store)?;
        if existing.is_empty() {
            return Ok(0);
        }
        self.store
            .delete(&existing.ids)
            .await
            .map_err(RagError::Store)?;
        Ok(existing.len())
    }
}

fn require_owner(owner: &str) -> Result<()> {
    if owner.is_empty() {
        return Err(RagError::invalid_input("owner must not be empty"));
    }
    Ok(())
}
