//! Database statistics.
//!
//! A quick summary of what is stored: chunk counts per identity scope,
//! embedding cache size, and the models that produced the vectors. Used
//! by `crag stats`.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

/// Chunk count of one `(owner, category)` scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeStats {
    pub owner: String,
    pub category: Option<String>,
    pub chunks: i64,
    pub last_saved: i64,
}

#[derive(Debug, Clone)]
pub struct StoreStats {
    pub total_chunks: i64,
    pub cached_embeddings: i64,
    pub models: Vec<String>,
    pub scopes: Vec<ScopeStats>,
}

pub async fn collect_stats(pool: &SqlitePool) -> Result<StoreStats> {
    let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
        .fetch_one(pool)
        .await?;

    let cached_embeddings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embedding_cache")
        .fetch_one(pool)
        .await?;

    let models: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT model FROM chunks ORDER BY model")
            .fetch_all(pool)
            .await?;

    let rows = sqlx::query(
        r#"
        SELECT owner, category, COUNT(*) AS chunk_count, MAX(created_at) AS last_saved
        FROM chunks
        GROUP BY owner, category
        ORDER BY owner, category
        "#,
    )
    .fetch_all(pool)
    .await?;

    let scopes = rows
        .iter()
        .map(|row| ScopeStats {
            owner: row.get("owner"),
            category: row.get("category"),
            chunks: row.get("chunk_count"),
            last_saved: row.get("last_saved"),
        })
        .collect();

    Ok(StoreStats {
        total_chunks,
        cached_embeddings,
        models,
        scopes,
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let stats = collect_stats(&pool).await?;
    pool.close().await;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Content RAG Database Stats");
    println!("==========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Chunks:      {}", stats.total_chunks);
    println!("  Cached:      {} embeddings", stats.cached_embeddings);
    if !stats.models.is_empty() {
        println!("  Models:      {}", stats.models.join(", "));
    }

    if !stats.scopes.is_empty() {
        println!();
        println!("  By scope:");
        println!(
            "  {:<24} {:<20} {:>8}   {}",
            "OWNER", "CATEGORY", "CHUNKS", "LAST SAVE"
        );
        println!("  {}", "-".repeat(72));
        for s in &stats.scopes {
            println!(
                "  {:<24} {:<20} {:>8}   {}",
                s.owner,
                category_display(s.category.as_deref()),
                s.chunks,
                format_ts_iso(s.last_saved)
            );
        }
    }

    println!();
    Ok(())
}

/// Absent and empty categories are different scopes, so they print differently.
fn category_display(category: Option<&str>) -> String {
    match category {
        None => "(none)".to_string(),
        Some("") => "\"\"".to_string(),
        Some(c) => c.to_string(),
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RagClient;
    use crate::llm::DisabledModel;
    use content_rag_core::embedding::HashingEmbedder;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_collect_stats_groups_by_scope() {
        let tmp = TempDir::new().unwrap();
        let config = Config::minimal(tmp.path().join("stats.sqlite"));
        let client = RagClient::open_with(
            &config,
            Arc::new(HashingEmbedder::default()),
            Arc::new(DisabledModel),
        )
        .await
        .unwrap();

        client.save_content("u", "one", None).await.unwrap();
        client.save_content("u", "two", Some("")).await.unwrap();
        client.save_content("v", "three", Some("c")).await.unwrap();

        let stats = collect_stats(client.pool()).await.unwrap();
        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.cached_embeddings, 3);
        assert_eq!(stats.models, vec!["hash-bow".to_string()]);

        let scopes: Vec<(&str, Option<&str>, i64)> = stats
            .scopes
            .iter()
            .map(|s| (s.owner.as_str(), s.category.as_deref(), s.chunks))
            .collect();
        assert_eq!(
            scopes,
            vec![("u", None, 1), ("u", Some(""), 1), ("v", Some("c"), 1)]
        );
        client.close().await;
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(category_display(None), "(none)");
        assert_eq!(category_display(Some("")), "\"\"");
    }
}
