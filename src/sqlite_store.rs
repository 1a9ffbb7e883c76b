//! SQLite-backed [`VectorStore`] implementation.
//!
//! Chunks, their metadata, and their embedding vectors live in the
//! `chunks` table (see [`crate::migrate`]). Embeddings are produced by
//! the configured [`Embedder`] and cached per `(model, text hash)` in
//! `embedding_cache`, so re-saving unchanged text costs no model calls.
//! A cached vector is only reused when its length matches the
//! embedder's current `dims`.
//!
//! The `owner` and `category` equalities compile to the indexed columns
//! of the same name. Any other key compiles to
//! `json_extract(metadata_json, '$."key"') = ?`. Either way an absent
//! value is `NULL`, which never compares equal, so uncategorized chunks
//! are invisible to any `category` filter.
//!
//! Similarity search is brute-force cosine similarity over the rows
//! matching the filter, visited in insertion order and stably sorted.
//! Rows whose vector came from another model, or has another length,
//! are re-embedded with the current embedder before scoring.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use content_rag_core::chunk::ChunkRecord;
use content_rag_core::embedding::{
    blob_to_vec, cosine_similarity, embed_one, vec_to_blob, Embedder,
};
use content_rag_core::filter::Filter;
use content_rag_core::models::{Document, Metadata, CATEGORY_KEY, OWNER_KEY};
use content_rag_core::store::{GetResult, ScoredDocument, VectorStore};

/// SQLite implementation of the [`VectorStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self {
            pool,
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Re-embed the rows at `stale` with the current embedder and store
    /// the new vectors, so later searches score them directly.
    async fn refresh_vectors(
        &self,
        rows: &[SqliteRow],
        stale: &[usize],
        vectors: &mut [Vec<f32>],
    ) -> Result<()> {
        let owned: Vec<(String, String, String)> = stale
            .iter()
            .map(|&i| (rows[i].get("id"), rows[i].get("hash"), rows[i].get("text")))
            .collect();
        let items: Vec<(&str, &str)> = owned
            .iter()
            .map(|(_, hash, text)| (hash.as_str(), text.as_str()))
            .collect();
        let fresh = self.vectors_for_texts(&items).await?;
        tracing::info!(
            rows = stale.len(),
            model = self.embedder.model_name(),
            "re-embedded chunks from another embedding configuration"
        );

        let model = self.embedder.model_name();
        let mut tx = self.pool.begin().await?;
        for ((&i, (id, _, _)), vector) in stale.iter().zip(owned.iter()).zip(fresh) {
            sqlx::query("UPDATE chunks SET embedding = ?, model = ? WHERE id = ?")
                .bind(vec_to_blob(&vector))
                .bind(model)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            vectors[i] = vector;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Vectors for `records`, from the cache where possible.
    async fn vectors_for(&self, records: &[ChunkRecord]) -> Result<Vec<Vec<f32>>> {
        let items: Vec<(&str, &str)> = records
            .iter()
            .map(|r| (r.hash.as_str(), r.text.as_str()))
            .collect();
        self.vectors_for_texts(&items).await
    }

    /// Vectors for `(hash, text)` pairs, in order.
    async fn vectors_for_texts(&self, items: &[(&str, &str)]) -> Result<Vec<Vec<f32>>> {
        let model = self.embedder.model_name().to_string();
        let dims = self.embedder.dims();
        let mut cached: HashMap<String, Vec<f32>> = HashMap::new();

        for (hash, _) in items {
            if cached.contains_key(*hash) {
                continue;
            }
            let blob: Option<Vec<u8>> = sqlx::query_scalar(
                "SELECT embedding FROM embedding_cache WHERE model = ? AND hash = ? AND dims = ?",
            )
            .bind(&model)
            .bind(*hash)
            .bind(dims as i64)
            .fetch_optional(&self.pool)
            .await?;
            if let Some(blob) = blob {
                cached.insert(hash.to_string(), blob_to_vec(&blob));
            }
        }

        let mut missing: Vec<(&str, &str)> = Vec::new();
        for (hash, text) in items {
            if !cached.contains_key(*hash) && !missing.iter().any(|(h, _)| h == hash) {
                missing.push((*hash, *text));
            }
        }
        tracing::debug!(
            total = items.len(),
            cached = items.len() - missing.len(),
            model = %model,
            "embedding chunks"
        );

        let now = chrono::Utc::now().timestamp();
        for batch in missing.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|(_, t)| t.to_string()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != batch.len() {
                anyhow::bail!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                );
            }
            for ((hash, _), vector) in batch.iter().zip(vectors) {
                sqlx::query(
                    r#"
                    INSERT INTO embedding_cache (model, hash, dims, embedding, created_at)
                    VALUES (?, ?, ?, ?, ?)
                    ON CONFLICT(model, hash) DO UPDATE SET
                        dims = excluded.dims,
                        embedding = excluded.embedding,
                        created_at = excluded.created_at
                    "#,
                )
                .bind(&model)
                .bind(*hash)
                .bind(vector.len() as i64)
                .bind(vec_to_blob(&vector))
                .bind(now)
                .execute(&self.pool)
                .await?;
                cached.insert(hash.to_string(), vector);
            }
        }

        items
            .iter()
            .map(|(hash, _)| {
                cached
                    .get(*hash)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("no embedding for text hash {}", hash))
            })
            .collect()
    }
}

/// `WHERE` clause and bind values for a filter.
fn where_clause(filter: &Filter) -> (String, Vec<String>) {
    let equalities = filter.equalities();
    if equalities.is_empty() {
        return ("1 = 1".to_string(), Vec::new());
    }
    let mut clauses = Vec::with_capacity(equalities.len());
    let mut binds = Vec::with_capacity(equalities.len() * 2);
    for (key, value) in equalities {
        match key {
            OWNER_KEY => clauses.push("owner = ?"),
            CATEGORY_KEY => clauses.push("category = ?"),
            _ => {
                clauses.push("json_extract(metadata_json, ?) = ?");
                binds.push(json_path(key));
            }
        }
        binds.push(value.to_string());
    }
    (clauses.join(" AND "), binds)
}

fn json_path(key: &str) -> String {
    format!("$.\"{}\"", key.replace('"', "\\\""))
}

fn row_metadata(row: &SqliteRow) -> Result<Metadata> {
    let id: String = row.get("id");
    let metadata_json: String = row.get("metadata_json");
    serde_json::from_str(&metadata_json)
        .with_context(|| format!("corrupt metadata_json for chunk {}", id))
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn add(&self, records: &[ChunkRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let vectors = self.vectors_for(records).await?;
        let model = self.embedder.model_name().to_string();
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;
        for (record, vector) in records.iter().zip(vectors.iter()) {
            let owner = record
                .metadata
                .get(OWNER_KEY)
                .ok_or_else(|| anyhow::anyhow!("chunk {} has no owner metadata", record.id))?;
            sqlx::query(
                r#"
                INSERT INTO chunks (id, owner, category, chunk_index, text, hash,
                                    metadata_json, embedding, model, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.id)
            .bind(owner)
            .bind(record.metadata.get(CATEGORY_KEY).map(String::as_str))
            .bind(record.index as i64)
            .bind(&record.text)
            .bind(&record.hash)
            .bind(serde_json::to_string(&record.metadata)?)
            .bind(vec_to_blob(vector))
            .bind(&model)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, filter: &Filter) -> Result<GetResult> {
        let (clause, binds) = where_clause(filter);
        let sql = format!(
            "SELECT id, text, metadata_json FROM chunks WHERE {} ORDER BY rowid ASC",
            clause
        );
        let mut query = sqlx::query(&sql);
        for b in &binds {
            query = query.bind(b);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut result = GetResult::default();
        for row in &rows {
            result.metadatas.push(row_metadata(row)?);
            result.ids.push(row.get("id"));
            result.documents.push(row.get("text"));
        }
        Ok(result)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM chunks WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: &Filter,
    ) -> Result<Vec<ScoredDocument>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = embed_one(self.embedder.as_ref(), query).await?;

        let (clause, binds) = where_clause(filter);
        let sql = format!(
            "SELECT id, text, hash, metadata_json, embedding, model FROM chunks \
             WHERE {} ORDER BY rowid ASC",
            clause
        );
        let mut q = sqlx::query(&sql);
        for b in &binds {
            q = q.bind(b);
        }
        let rows = q.fetch_all(&self.pool).await?;

        let model = self.embedder.model_name();
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(rows.len());
        let mut stale: Vec<usize> = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let blob: Vec<u8> = row.get("embedding");
            let vector = blob_to_vec(&blob);
            let row_model: String = row.get("model");
            if row_model != model || vector.len() != query_vec.len() {
                stale.push(i);
            }
            vectors.push(vector);
        }
        if !stale.is_empty() {
            self.refresh_vectors(&rows, &stale, &mut vectors).await?;
        }

        let mut hits = Vec::with_capacity(rows.len());
        for (row, vector) in rows.iter().zip(vectors.iter()) {
            hits.push(ScoredDocument {
                document: Document {
                    text: row.get("text"),
                    metadata: row_metadata(row)?,
                },
                score: Some(cosine_similarity(&query_vec, vector)),
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }
}
