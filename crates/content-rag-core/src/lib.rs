//! # Content RAG Core
//!
//! Runtime-agnostic logic for Content RAG: the content model, chunking,
//! identity-scoped filters, the vector store abstraction, the content
//! store (replace-on-write CRUD), and the retrieve → prompt → generate
//! pipeline.
//!
//! This crate contains no tokio, sqlx, HTTP client, or filesystem I/O.
//! Every external system (vector index, embedding model, language model,
//! message envelope format) is reached through a trait so the
//! application crate can plug in concrete backends.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | `ContentUnit`, `Document`, metadata keys |
//! | [`chunk`] | Fixed-window character chunker |
//! | [`filter`] | Owner/category filter expressions |
//! | [`embedding`] | `Embedder` trait, hashing embedder, vector helpers |
//! | [`store`] | `VectorStore` trait and in-memory implementation |
//! | [`content`] | `ContentStore`: save, get, search, delete |
//! | [`pipeline`] | Prompt template, scoped retriever, RAG pipeline |
//! | [`messaging`] | Message envelope trait and the webhook reply flow |
//! | [`error`] | `RagError` |

pub mod chunk;
pub mod content;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod messaging;
pub mod models;
pub mod pipeline;
pub mod store;

pub use content::ContentStore;
pub use error::{RagError, Result};
pub use filter::{build_filter, Filter};
pub use models::{ContentUnit, Document, Metadata};
