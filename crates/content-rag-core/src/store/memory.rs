//! In-memory [`VectorStore`] for tests and embedded use.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`, so `get` returns
//! them in insertion order. Similarity search is brute-force cosine
//! similarity over every record that passes the filter.

use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::chunk::ChunkRecord;
use crate::embedding::{cosine_similarity, embed_one, Embedder};
use crate::filter::Filter;
use crate::models::Document;

use super::{GetResult, ScoredDocument, VectorStore};

struct StoredRecord {
    record: ChunkRecord,
    vector: Vec<f32>,
}

/// In-memory vector store.
pub struct InMemoryStore {
    embedder: Arc<dyn Embedder>,
    records: RwLock<Vec<StoredRecord>>,
}

impl InMemoryStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            records: RwLock::new(Vec::new()),
        }
    }

    /// Total number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn add(&self, records: &[ChunkRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != records.len() {
            anyhow::bail!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                records.len()
            );
        }

        let mut stored = self.records.write().map_err(poisoned)?;
        for (record, vector) in records.iter().zip(vectors) {
            stored.push(StoredRecord {
                record: record.clone(),
                vector,
            });
        }
        Ok(())
    }

    async fn get(&self, filter: &Filter) -> Result<GetResult> {
        let stored = self.records.read().map_err(poisoned)?;
        let mut result = GetResult::default();
        for sr in stored.iter().filter(|sr| filter.matches(&sr.record.metadata)) {
            result.ids.push(sr.record.id.clone());
            result.documents.push(sr.record.text.clone());
            result.metadatas.push(sr.record.metadata.clone());
        }
        Ok(result)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut stored = self.records.write().map_err(poisoned)?;
        stored.retain(|sr| !ids.contains(&sr.record.id));
        Ok(())
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: &Filter,
    ) -> Result<Vec<ScoredDocument>> {
        let query_vec = embed_one(self.embedder.as_ref(), query).await?;
        let stored = self.records.read().map_err(poisoned)?;
        let mut hits: Vec<ScoredDocument> = stored
            .iter()
            .filter(|sr| filter.matches(&sr.record.metadata))
            .map(|sr| ScoredDocument {
                document: Document {
                    text: sr.record.text.clone(),
                    metadata: sr.record.metadata.clone(),
                },
                score: Some(cosine_similarity(&query_vec, &sr.vector)),
            })
            .collect();
        // Stable sort: ties keep insertion order.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }
}
