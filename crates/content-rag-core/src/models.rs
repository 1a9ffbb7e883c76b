//! Core data models.
//!
//! A [`ContentUnit`] is the logical piece of content saved for one
//! `(owner, category)` identity scope. A [`Document`] is the storage
//! shape: text plus a flat string metadata map. Conversion between the
//! two lives here and nowhere else, so the rule "absent category ⇒ no
//! `category` key" is enforced in exactly one place.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RagError, Result};

/// Metadata key holding the owning principal.
pub const OWNER_KEY: &str = "owner";
/// Metadata key holding the optional category. Omitted when absent.
pub const CATEGORY_KEY: &str = "category";
/// Metadata key set by ingestion adapters (file path or URL).
pub const SOURCE_KEY: &str = "source";

/// Flat metadata attached to a stored chunk.
pub type Metadata = BTreeMap<String, String>;

/// Text plus metadata, the unit exchanged with the vector store and
/// produced by ingestion adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Logical saved content for one `(owner, category)` scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentUnit {
    pub id: String,
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub text: String,
}

impl ContentUnit {
    /// Build a unit with a freshly generated identifier.
    pub fn new(owner: impl Into<String>, text: impl Into<String>, category: Option<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), owner, text, category)
    }

    /// Rebuild a unit around an existing identifier (e.g. a stored chunk id).
    pub fn with_id(
        id: impl Into<String>,
        owner: impl Into<String>,
        text: impl Into<String>,
        category: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            category,
            text: text.into(),
        }
    }

    /// Storage metadata for this unit's scope.
    pub fn metadata(&self) -> Metadata {
        scope_metadata(&self.owner, self.category.as_deref())
    }

    pub fn to_document(&self) -> Document {
        Document {
            text: self.text.clone(),
            metadata: self.metadata(),
        }
    }

    /// Reconstruct a unit from a stored document.
    ///
    /// A missing `category` key means "no category". A missing `owner`
    /// key means the record was not written by this crate and is
    /// reported as a store failure.
    pub fn from_document(id: impl Into<String>, doc: &Document) -> Result<Self> {
        let id = id.into();
        let owner = doc.metadata.get(OWNER_KEY).ok_or_else(|| {
            RagError::Store(anyhow::anyhow!(
                "stored record {} has no '{}' metadata",
                id,
                OWNER_KEY
            ))
        })?;
        Ok(Self::with_id(
            id,
            owner.clone(),
            doc.text.clone(),
            doc.metadata.get(CATEGORY_KEY).cloned(),
        ))
    }
}

/// Metadata for an identity scope: `owner` always, `category` only when present.
pub fn scope_metadata(owner: &str, category: Option<&str>) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(OWNER_KEY.to_string(), owner.to_string());
    if let Some(category) = category {
        metadata.insert(CATEGORY_KEY.to_string(), category.to_string());
    }
    metadata
}
