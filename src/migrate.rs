//! Idempotent schema setup.
//!
//! `chunks` holds one row per stored chunk. `owner` and `category` are
//! copied out of `metadata_json` into indexed columns, which scope
//! filters query directly; other metadata keys (such as `source`) are
//! read with `json_extract`. `model` records which embedder produced
//! the row's vector. `embedding_cache` maps `(model, sha256(text))` to
//! a vector and its `dims`, so identical chunk text is never embedded
//! twice by the same model at the same width.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            category TEXT,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL,
            model TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS embedding_cache (
            model TEXT NOT NULL,
            hash TEXT NOT NULL,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (model, hash)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_owner_category ON chunks(owner, category)")
        .execute(pool)
        .await?;

    Ok(())
}
