//! Retrieve → prompt → generate.
//!
//! A [`ScopedRetriever`] is a context provider bound to one
//! `(owner, category)` scope. A [`RagPipeline`] composes it with a
//! [`PromptTemplate`] and a [`LanguageModel`] into a single
//! `ask(question) -> answer` call.
//!
//! Errors are returned, never swallowed: retrieval failures surface as
//! [`RagError::Store`], model failures as [`RagError::Generation`]. The
//! messaging flow in [`crate::messaging`] is the only caller that turns
//! them into a fallback reply.

use std::sync::Arc;

use async_trait::async_trait;

use crate::content::ContentStore;
use crate::error::{RagError, Result};
use crate::models::Document;

/// Placeholder replaced by the retrieved passages.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";
/// Placeholder replaced by the user's question.
pub const QUESTION_PLACEHOLDER: &str = "{question}";

/// Prompt used when no template is configured.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "Answer the question based only on the following context:
{context}

Question: {question}
";

/// Separator between retrieved passages in the context block.
const PASSAGE_SEPARATOR: &str = "\n\n";

/// Text generation capability.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// A prompt template with `{context}` and `{question}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Fails with [`RagError::InvalidInput`] unless both placeholders occur.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
            if !template.contains(placeholder) {
                return Err(RagError::invalid_input(format!(
                    "prompt template is missing the {} placeholder",
                    placeholder
                )));
            }
        }
        Ok(Self { template })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitute both placeholders in one left-to-right pass.
    ///
    /// Placeholder text that appears inside the substituted context or
    /// question is emitted literally.
    pub fn render(&self, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();
        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix(CONTEXT_PLACEHOLDER) {
                out.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(QUESTION_PLACEHOLDER) {
                out.push_str(question);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

/// Context provider for one identity scope.
#[derive(Clone)]
pub struct ScopedRetriever {
    content: Arc<ContentStore>,
    owner: String,
    category: Option<String>,
    limit: usize,
}

impl ScopedRetriever {
    pub fn new(
        content: Arc<ContentStore>,
        owner: &str,
        category: Option<&str>,
        limit: usize,
    ) -> Self {
        Self {
            content,
            owner: owner.to_string(),
            category: category.map(str::to_string),
            limit,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Passages most similar to `question`, nearest first.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<Document>> {
        self.content
            .search_documents(question, &self.owner, self.category.as_deref(), self.limit)
            .await
    }

    /// Retrieved passages joined into one context block, ranking preserved.
    pub async fn context(&self, question: &str) -> Result<String> {
        let docs = self.retrieve(question).await?;
        Ok(join_passages(&docs))
    }
}

fn join_passages(docs: &[Document]) -> String {
    docs.iter()
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join(PASSAGE_SEPARATOR)
}

/// Scoped retrieval, prompt assembly, and generation as one call.
#[derive(Clone)]
pub struct RagPipeline {
    retriever: ScopedRetriever,
    template: PromptTemplate,
    model: Arc<dyn LanguageModel>,
}

impl RagPipeline {
    pub fn new(
        retriever: ScopedRetriever,
        template: PromptTemplate,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            retriever,
            template,
            model,
        }
    }

    pub fn retriever(&self) -> &ScopedRetriever {
        &self.retriever
    }

    /// Render the full prompt for `question` without calling the model.
    pub async fn prompt(&self, question: &str) -> Result<String> {
        let context = self.retriever.context(question).await?;
        Ok(self.template.render(&context, question))
    }

    /// Answer `question` from the scope's content.
    pub async fn ask(&self, question: &str) -> Result<String> {
        if question.trim().is_empty() {
            return Err(RagError::invalid_input("question must not be empty"));
        }
        let prompt = self.prompt(question).await?;
        tracing::debug!(
            owner = self.retriever.owner(),
            model = self.model.model_name(),
            prompt_chars = prompt.chars().count(),
            "generating answer"
        );
        self.model
            .generate(&prompt)
            .await
            .map_err(RagError::Generation)
    }
}
