//! Messaging-channel flow.
//!
//! An unattended webhook delivers one envelope per user message and
//! expects one envelope back. [`respond_to_message`] parses the
//! envelope, answers text messages through a [`RagPipeline`], and
//! always produces a reply for the channel:
//!
//! | Inbound | Reply content |
//! |---------|---------------|
//! | text, pipeline succeeds | the generated answer |
//! | text, pipeline fails | [`SYSTEM_ERROR_REPLY`] (cause logged) |
//! | any other type | [`TEXT_ONLY_REPLY`] (pipeline not invoked) |
//!
//! Only an envelope that cannot be parsed or built is returned as an
//! error, since there is nothing to reply to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::pipeline::RagPipeline;

/// Reply sent for non-text inbound messages.
pub const TEXT_ONLY_REPLY: &str = "Only text messages are supported.";
/// Reply sent when retrieval or generation fails.
pub const SYSTEM_ERROR_REPLY: &str = "System error, please try again later.";

/// `msg_type` of a plain text message.
pub const TEXT_MESSAGE_TYPE: &str = "text";

/// A parsed inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Account the message was sent to.
    pub recipient: String,
    /// Account that sent the message.
    pub sender: String,
    pub created_at: i64,
    pub msg_type: String,
    pub content: Option<String>,
    pub msg_id: Option<String>,
}

impl InboundMessage {
    pub fn is_text(&self) -> bool {
        self.msg_type == TEXT_MESSAGE_TYPE
    }
}

/// Envelope format of a messaging channel.
pub trait MessageCodec: Send + Sync {
    fn parse(&self, raw: &str) -> anyhow::Result<InboundMessage>;
    fn build_reply(&self, text: &str, original: &InboundMessage) -> anyhow::Result<String>;
}

/// Something that answers a question. Implemented by [`RagPipeline`].
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn answer(&self, question: &str) -> Result<String>;
}

#[async_trait]
impl Answerer for RagPipeline {
    async fn answer(&self, question: &str) -> Result<String> {
        self.ask(question).await
    }
}

/// Parse `raw`, answer it, and build the reply envelope.
pub async fn respond_to_message(
    answerer: &dyn Answerer,
    codec: &dyn MessageCodec,
    raw: &str,
) -> Result<String> {
    let message = codec.parse(raw).map_err(RagError::Envelope)?;

    let reply = if !message.is_text() {
        tracing::debug!(msg_type = %message.msg_type, "non-text message");
        TEXT_ONLY_REPLY.to_string()
    } else {
        let question = message.content.as_deref().unwrap_or_default();
        match answerer.answer(question).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(
                    sender = %message.sender,
                    error = %e,
                    "failed to answer message"
                );
                SYSTEM_ERROR_REPLY.to_string()
            }
        }
    };

    codec
        .build_reply(&reply, &message)
        .map_err(RagError::Envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{content_store, FakeModel};
    use crate::pipeline::PromptTemplate;
    use std::sync::Arc;

    /// `type|sender|content` in, `to:sender|reply` out.
    struct PipeCodec;

    impl MessageCodec for PipeCodec {
        fn parse(&self, raw: &str) -> anyhow::Result<InboundMessage> {
            let mut parts = raw.splitn(3, '|');
            let (Some(msg_type), Some(sender), content) =
                (parts.next(), parts.next(), parts.next())
            else {
                anyhow::bail!("malformed envelope");
            };
            Ok(InboundMessage {
                recipient: "bot".into(),
                sender: sender.into(),
                created_at: 0,
                msg_type: msg_type.into(),
                content: content.map(str::to_string),
                msg_id: None,
            })
        }

        fn build_reply(&self, text: &str, original: &InboundMessage) -> anyhow::Result<String> {
            Ok(format!("to:{}|{}", original.sender, text))
        }
    }

    async fn pipeline(model: Arc<FakeModel>) -> RagPipeline {
        let cs = content_store();
        cs.save_content("bot-owner", "refunds take five days", None)
            .await
            .unwrap();
        RagPipeline::new(
            cs.as_retriever("bot-owner", None, 4),
            PromptTemplate::default(),
            model,
        )
    }

    #[tokio::test]
    async fn test_text_message_is_answered() {
        let p = pipeline(Arc::new(FakeModel::answering("Five days."))).await;
        let reply = respond_to_message(&p, &PipeCodec, "text|alice|how long do refunds take")
            .await
            .unwrap();
        assert_eq!(reply, "to:alice|Five days.");
    }

    #[tokio::test]
    async fn test_generation_failure_yields_error_reply() {
        let p = pipeline(Arc::new(FakeModel::failing())).await;
        let reply = respond_to_message(&p, &PipeCodec, "text|alice|refunds?")
            .await
            .unwrap();
        assert_eq!(reply, format!("to:alice|{}", SYSTEM_ERROR_REPLY));
    }

    #[tokio::test]
    async fn test_empty_text_yields_error_reply() {
        let p = pipeline(Arc::new(FakeModel::answering("x"))).await;
        let reply = respond_to_message(&p, &PipeCodec, "text|bob|")
            .await
            .unwrap();
        assert_eq!(reply, format!("to:bob|{}", SYSTEM_ERROR_REPLY));
    }

    #[tokio::test]
    async fn test_non_text_skips_pipeline() {
        let model = Arc::new(FakeModel::answering("unused"));
        let p = pipeline(model.clone()).await;
        let reply = respond_to_message(&p, &PipeCodec, "image|carol|")
            .await
            .unwrap();
        assert_eq!(reply, format!("to:carol|{}", TEXT_ONLY_REPLY));
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_envelope_is_error() {
        let p = pipeline(Arc::new(FakeModel::answering("x"))).await;
        let err = respond_to_message(&p, &PipeCodec, "garbage")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Envelope(_)));
    }
}
