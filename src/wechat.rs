//! WeChat official-account XML envelopes.
//!
//! Inbound:
//!
//! ```xml
//! <xml>
//!   <ToUserName><![CDATA[toUser]]></ToUserName>
//!   <FromUserName><![CDATA[fromUser]]></FromUserName>
//!   <CreateTime>1348831860</CreateTime>
//!   <MsgType><![CDATA[text]]></MsgType>
//!   <Content><![CDATA[What is my name?]]></Content>
//!   <MsgId>1234567890123456</MsgId>
//! </xml>
//! ```
//!
//! The reply swaps `ToUserName` and `FromUserName`, stamps the current
//! time, and always carries `MsgType` `text`. Unknown child elements
//! are ignored.

use anyhow::{bail, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;

use content_rag_core::messaging::{InboundMessage, MessageCodec, TEXT_MESSAGE_TYPE};

#[derive(Debug, Clone, Copy, Default)]
pub struct WeChatCodec;

impl WeChatCodec {
    /// Reply envelope with an explicit `CreateTime`.
    pub fn build_reply_at(&self, text: &str, original: &InboundMessage, create_time: i64) -> String {
        format!(
            "<xml>\n\
             <ToUserName>{}</ToUserName>\n\
             <FromUserName>{}</FromUserName>\n\
             <CreateTime>{}</CreateTime>\n\
             <MsgType>{}</MsgType>\n\
             <Content>{}</Content>\n\
             </xml>",
            cdata(&original.sender),
            cdata(&original.recipient),
            create_time,
            cdata(TEXT_MESSAGE_TYPE),
            cdata(text),
        )
    }
}

impl MessageCodec for WeChatCodec {
    fn parse(&self, raw: &str) -> Result<InboundMessage> {
        let fields = read_fields(raw)?;
        let required = |name: &str| {
            fields
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("envelope is missing <{}>", name))
        };

        let created_at = match fields.get("CreateTime") {
            Some(t) => t
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid <CreateTime>: {}", t))?,
            None => 0,
        };

        Ok(InboundMessage {
            recipient: required("ToUserName")?,
            sender: required("FromUserName")?,
            created_at,
            msg_type: required("MsgType")?,
            content: fields.get("Content").cloned(),
            msg_id: fields.get("MsgId").cloned(),
        })
    }

    fn build_reply(&self, text: &str, original: &InboundMessage) -> Result<String> {
        Ok(self.build_reply_at(text, original, chrono::Utc::now().timestamp()))
    }
}

/// Text of every direct child of the root element, by tag name.
fn read_fields(raw: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().trim_text(true);

    let mut fields = HashMap::new();
    let mut depth = 0usize;
    let mut current: Option<(String, String)> = None;
    let mut saw_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                if depth == 1 {
                    saw_root = true;
                } else if depth == 2 {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    current = Some((name, String::new()));
                }
            }
            Ok(Event::Empty(e)) => {
                if depth == 1 {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    fields.insert(name, String::new());
                }
            }
            Ok(Event::Text(t)) => {
                if let (2, Some((_, value))) = (depth, current.as_mut()) {
                    value.push_str(&t.unescape()?);
                }
            }
            Ok(Event::CData(c)) => {
                if let (2, Some((_, value))) = (depth, current.as_mut()) {
                    value.push_str(std::str::from_utf8(&c)?);
                }
            }
            Ok(Event::End(_)) => {
                if depth == 2 {
                    if let Some((name, value)) = current.take() {
                        fields.insert(name, value);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => bail!("malformed XML at position {}: {}", reader.buffer_position(), e),
            _ => {}
        }
    }

    if !saw_root || depth != 0 {
        bail!("envelope is not a complete XML document");
    }
    Ok(fields)
}

/// Wrap `s` in CDATA, splitting any `]]>` across two sections.
fn cdata(s: &str) -> String {
    format!("<![CDATA[{}]]>", s.replace("]]>", "]]]]><![CDATA[>"))
}
