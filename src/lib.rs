//! # Content RAG
//!
//! Identity-scoped content storage and retrieval-augmented answering.
//!
//! Content is saved per `(owner, category)` scope; each save replaces
//! whatever the scope held before. Stored text is chunked, embedded, and
//! kept in SQLite. Questions are answered by retrieving the closest
//! chunks of one scope, filling a prompt template, and calling a
//! language model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │  Ingestion   │──▶│ ContentStore │──▶│  SQLite   │
//! │ text/file/url│   │ chunk+embed  │   │ chunks   │
//! └──────────────┘   └──────┬───────┘   └──────────┘
//!                           │ retriever
//!                           ▼
//!                    ┌──────────────┐
//!                    │ RagPipeline  │──▶ LanguageModel
//!                    └──────┬───────┘
//!                ┌──────────┼──────────┐
//!                ▼          ▼          ▼
//!            ┌──────┐   ┌──────┐   ┌────────┐
//!            │ CLI  │   │ HTTP │   │ WeChat │
//!            └──────┘   └──────┘   └────────┘
//! ```
//!
//! The runtime-agnostic logic lives in the `content-rag-core` crate;
//! this crate supplies the concrete backends and surfaces.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite-backed vector store |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | Language-model providers |
//! | [`retry`] | HTTP retry policy |
//! | [`loader`] | File and directory loading |
//! | [`crawl`] | Recursive URL loading |
//! | [`ingest`] | Ingestion adapters |
//! | [`wechat`] | WeChat XML codec |
//! | [`client`] | `RagClient` facade |
//! | [`server`] | HTTP server |
//! | [`get`], [`search`], [`stats`] | CLI output |

pub mod client;
pub mod config;
pub mod crawl;
pub mod db;
pub mod embedding;
pub mod get;
pub mod ingest;
pub mod llm;
pub mod loader;
pub mod migrate;
pub mod retry;
pub mod search;
pub mod server;
pub mod sqlite_store;
pub mod stats;
pub mod wechat;
