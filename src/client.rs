//! Application facade.
//!
//! [`RagClient`] owns every long-lived resource: the SQLite pool, the
//! embedder, the language model, and the crawler. It is built from a
//! [`Config`] with [`RagClient::open`] and released with
//! [`RagClient::close`]. The CLI opens one per command, the server one
//! per process and shares it behind an `Arc`.

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

use content_rag_core::chunk::Chunker;
use content_rag_core::embedding::Embedder;
use content_rag_core::messaging::respond_to_message;
use content_rag_core::models::{ContentUnit, Document};
use content_rag_core::pipeline::{LanguageModel, PromptTemplate, RagPipeline, ScopedRetriever};
use content_rag_core::{ContentStore, Result as RagResult};

use crate::config::Config;
use crate::crawl::Crawler;
use crate::embedding::create_embedder;
use crate::ingest::{self, IngestReport};
use crate::llm::create_language_model;
use crate::sqlite_store::SqliteStore;
use crate::wechat::WeChatCodec;
use crate::{db, migrate};

pub struct RagClient {
    config: Config,
    pool: SqlitePool,
    content: Arc<ContentStore>,
    model: Arc<dyn LanguageModel>,
    template: PromptTemplate,
    crawler: Crawler,
}

impl RagClient {
    /// Connect, migrate, and build the backends named by `config`.
    pub async fn open(config: &Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let model = create_language_model(&config.llm)?;
        Self::open_with(config, embedder, model).await
    }

    /// Like [`open`](Self::open) with caller-supplied backends.
    pub async fn open_with(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        let chunker = Chunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
        let template = config.retrieval.template()?;
        let crawler = Crawler::new(&config.crawl)?;

        let pool = db::connect(config).await?;
        migrate::migrate_pool(&pool).await?;

        tracing::debug!(
            embedder = embedder.model_name(),
            llm = model.model_name(),
            "client opened"
        );

        let store = SqliteStore::new(pool.clone(), embedder, config.embedding.batch_size);
        Ok(Self {
            config: config.clone(),
            pool,
            content: Arc::new(ContentStore::new(Arc::new(store), chunker)),
            model,
            template,
            crawler,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn content(&self) -> &Arc<ContentStore> {
        &self.content
    }

    pub async fn save_content(
        &self,
        owner: &str,
        text: &str,
        category: Option<&str>,
    ) -> RagResult<ContentUnit> {
        self.content.save_content(owner, text, category).await
    }

    pub async fn save_documents(
        &self,
        owner: &str,
        documents: Vec<Document>,
        category: Option<&str>,
    ) -> Result<IngestReport> {
        ingest::save_documents(&self.content, owner, documents, category).await
    }

    pub async fn import_paths(
        &self,
        owner: &str,
        paths: &[PathBuf],
        include_globs: &[String],
        exclude_globs: &[String],
        category: Option<&str>,
    ) -> Result<IngestReport> {
        ingest::import_paths(
            &self.content,
            owner,
            paths,
            include_globs,
            exclude_globs,
            category,
        )
        .await
    }

    /// Crawl `urls`; `max_depth` defaults to `[crawl] max_depth`.
    pub async fn save_urls(
        &self,
        owner: &str,
        urls: &[String],
        max_depth: Option<usize>,
        category: Option<&str>,
    ) -> Result<IngestReport> {
        let depth = max_depth.unwrap_or(self.config.crawl.max_depth);
        ingest::save_urls(&self.content, &self.crawler, owner, urls, depth, category).await
    }

    pub async fn get_content(
        &self,
        owner: &str,
        category: Option<&str>,
    ) -> RagResult<Vec<ContentUnit>> {
        self.content.get_content(owner, category).await
    }

    /// `limit` defaults to `[retrieval] limit`.
    pub async fn search(
        &self,
        query: &str,
        owner: &str,
        category: Option<&str>,
        limit: Option<usize>,
    ) -> RagResult<Vec<Document>> {
        let limit = limit.unwrap_or(self.config.retrieval.limit);
        self.content
            .search_documents(query, owner, category, limit)
            .await
    }

    pub async fn delete_content(&self, owner: &str, category: Option<&str>) -> RagResult<usize> {
        self.content.delete_content(owner, category).await
    }

    pub fn retriever(&self, owner: &str, category: Option<&str>) -> ScopedRetriever {
        self.content
            .as_retriever(owner, category, self.config.retrieval.limit)
    }

    pub fn pipeline(&self, owner: &str, category: Option<&str>) -> RagPipeline {
        RagPipeline::new(
            self.retriever(owner, category),
            self.template.clone(),
            Arc::clone(&self.model),
        )
    }

    pub async fn ask(
        &self,
        question: &str,
        owner: &str,
        category: Option<&str>,
    ) -> RagResult<String> {
        self.pipeline(owner, category).ask(question).await
    }

    /// Answer a raw WeChat XML message from the `(owner, category)` scope.
    pub async fn respond_wechat_xml(
        &self,
        raw: &str,
        owner: &str,
        category: Option<&str>,
    ) -> RagResult<String> {
        let pipeline = self.pipeline(owner, category);
        respond_to_message(&pipeline, &WeChatCodec, raw).await
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
