//! Ingestion adapters.
//!
//! Every adapter turns its source into a list of [`Document`]s and ends
//! in [`ContentStore::save_documents`], so each call replaces the whole
//! `(owner, category)` scope with the joined text of what it loaded.
//!
//! ```text
//! text ───────┐
//! documents ──┤
//! files/dirs ─┼──▶ Vec<Document> ──▶ save_documents ──▶ chunks
//! urls ───────┘
//! ```
//!
//! Load failures (unreadable file, unreachable start URL) are returned
//! before the store is touched.

use anyhow::Result;
use std::path::PathBuf;

use content_rag_core::models::{ContentUnit, Document};
use content_rag_core::ContentStore;

use crate::crawl::Crawler;
use crate::loader;

/// Outcome of one adapter call.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Documents loaded from the source.
    pub documents: usize,
    /// The saved unit, `None` when the source produced no documents.
    pub unit: Option<ContentUnit>,
}

pub async fn save_text(
    content: &ContentStore,
    owner: &str,
    text: &str,
    category: Option<&str>,
) -> Result<IngestReport> {
    save_documents(content, owner, vec![Document::new(text)], category).await
}

pub async fn save_documents(
    content: &ContentStore,
    owner: &str,
    documents: Vec<Document>,
    category: Option<&str>,
) -> Result<IngestReport> {
    let unit = content.save_documents(owner, &documents, category).await?;
    Ok(IngestReport {
        documents: documents.len(),
        unit,
    })
}

/// Load files and directories (directories are walked, see
/// [`loader::scan_dir`]) and save them as one unit.
pub async fn import_paths(
    content: &ContentStore,
    owner: &str,
    paths: &[PathBuf],
    include_globs: &[String],
    exclude_globs: &[String],
    category: Option<&str>,
) -> Result<IngestReport> {
    let paths = paths.to_vec();
    let include = include_globs.to_vec();
    let exclude = exclude_globs.to_vec();
    let documents = tokio::task::spawn_blocking(move || {
        let files = loader::expand_paths(&paths, &include, &exclude)?;
        loader::load_files(&files)
    })
    .await??;

    tracing::info!(owner, files = documents.len(), "imported files");
    save_documents(content, owner, documents, category).await
}

/// Crawl `urls` to `max_depth` and save the pages as one unit.
pub async fn save_urls(
    content: &ContentStore,
    crawler: &Crawler,
    owner: &str,
    urls: &[String],
    max_depth: usize,
    category: Option<&str>,
) -> Result<IngestReport> {
    let documents = crawler.crawl_all(urls, max_depth).await?;
    save_documents(content, owner, documents, category).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_rag_core::chunk::Chunker;
    use content_rag_core::embedding::HashingEmbedder;
    use content_rag_core::store::memory::InMemoryStore;
    use content_rag_core::RagError;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn content_store() -> ContentStore {
        let store = InMemoryStore::new(Arc::new(HashingEmbedder::default()));
        ContentStore::new(Arc::new(store), Chunker::default())
    }

    #[tokio::test]
    async fn test_save_text() {
        let cs = content_store();
        let report = save_text(&cs, "u", "hello", Some("c")).await.unwrap();
        assert_eq!(report.documents, 1);
        assert_eq!(report.unit.unwrap().text, "hello");
    }

    #[tokio::test]
    async fn test_save_empty_text_is_invalid_input() {
        let cs = content_store();
        let err = save_text(&cs, "u", "", None).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_import_paths_joins_files_in_order() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.txt"), "second").unwrap();
        fs::write(tmp.path().join("a.txt"), "first").unwrap();

        let cs = content_store();
        let report = import_paths(&cs, "u", &[tmp.path().to_path_buf()], &[], &[], None)
            .await
            .unwrap();
        assert_eq!(report.documents, 2);
        assert_eq!(report.unit.unwrap().text, "first\nsecond");
    }

    #[tokio::test]
    async fn test_import_empty_dir_is_noop() {
        let tmp = TempDir::new().unwrap();
        let cs = content_store();
        cs.save_content("u", "keep me", None).await.unwrap();

        let report = import_paths(&cs, "u", &[tmp.path().to_path_buf()], &[], &[], None)
            .await
            .unwrap();
        assert!(report.unit.is_none());
        assert_eq!(cs.get_content("u", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_import_missing_file_leaves_scope_untouched() {
        let tmp = TempDir::new().unwrap();
        let cs = content_store();
        cs.save_content("u", "old", None).await.unwrap();

        let missing = tmp.path().join("missing.txt");
        assert!(import_paths(&cs, "u", &[missing], &[], &[], None)
            .await
            .is_err());
        let units = cs.get_content("u", None).await.unwrap();
        assert_eq!(units[0].text, "old");
    }
}
