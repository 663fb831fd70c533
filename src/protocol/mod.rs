//! Wire protocol between the answer server and its clients.
//!
//! Every frame travels as one server-sent event, `data: <JSON>\n\n`, where the
//! JSON object carries a `type` tag of `step`, `answer`, `done` or `error`.

mod decoder;

pub use decoder::FrameDecoder;

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Frame delimiter on the wire.
pub const FRAME_DELIMITER: &[u8] = b"\n\n";

/// Prefix of the payload line inside a frame.
pub const DATA_PREFIX: &str = "data:";

/// Prefix of a step frame that closes a tool invocation.
pub const COMPLETED_PREFIX: &str = "Completed:";

/// A citation gathered from a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl Source {
    /// Create a source, deriving `domain` from the URL when it parses.
    pub fn new(title: impl Into<String>, url: impl Into<String>, content: impl Into<String>) -> Self {
        let url = url.into();
        let domain = domain_of(&url);
        Self {
            title: title.into(),
            url,
            content: content.into(),
            domain,
        }
    }
}

/// Host name of `url`, or None for placeholders and unparseable URLs.
pub fn domain_of(url: &str) -> Option<String> {
    if url.is_empty() || url == "#" {
        return None;
    }
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
}

/// One unit of the server-to-client protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    /// Tool progress. Text starting with `Completed:` closes a step.
    Step {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sources: Option<Vec<Source>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        images: Option<Vec<String>>,
    },

    /// Incremental answer text; never cumulative.
    Answer { content: String },

    /// Successful end of the stream with the full accumulated state.
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sources: Option<Vec<Source>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        images: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suggestions: Option<Vec<String>>,
    },

    /// Failed end of the stream.
    Error { message: String },
}

impl Frame {
    /// A step announcing that `tool` started.
    pub fn step_started(content: impl Into<String>, tool: impl Into<String>) -> Self {
        Frame::Step {
            content: content.into(),
            tool: Some(tool.into()),
            sources: None,
            images: None,
        }
    }

    /// A step closing `tool`, carrying snapshots of all sources and images so far.
    pub fn step_completed(tool: &str, sources: Vec<Source>, images: Vec<String>) -> Self {
        Frame::Step {
            content: format!("{} {}", COMPLETED_PREFIX, tool),
            tool: Some(tool.to_string()),
            sources: Some(sources),
            images: Some(images),
        }
    }

    pub fn answer(content: impl Into<String>) -> Self {
        Frame::Answer {
            content: content.into(),
        }
    }

    pub fn done(sources: Vec<Source>, images: Vec<String>, suggestions: Vec<String>) -> Self {
        Frame::Done {
            sources: Some(sources),
            images: Some(images),
            suggestions: Some(suggestions),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Frame::Error {
            message: message.into(),
        }
    }

    /// Whether this frame ends a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Frame::Done { .. } | Frame::Error { .. })
    }

    /// Whether this is a step frame closing a tool invocation.
    pub fn is_completion(&self) -> bool {
        matches!(self, Frame::Step { content, .. } if content.starts_with(COMPLETED_PREFIX))
    }

    /// JSON payload of this frame.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Full wire encoding, `data: <JSON>\n\n`.
    pub fn encode(&self) -> Result<String> {
        Ok(format!("{} {}\n\n", DATA_PREFIX, self.to_json()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_domain_derivation() {
        let source = Source::new("A", "http://x.test", "c");
        assert_eq!(source.domain.as_deref(), Some("x.test"));

        assert_eq!(Source::new("B", "#", "").domain, None);
        assert_eq!(Source::new("C", "not a url", "").domain, None);
        assert_eq!(
            domain_of("https://en.wikipedia.org/wiki/Rust"),
            Some("en.wikipedia.org".to_string())
        );
    }

    #[test]
    fn test_step_frame_wire_shape() {
        let frame = Frame::step_started("Checking weather for \"Oslo\"", "weather");
        let json: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "step");
        assert_eq!(json["tool"], "weather");
        assert!(json.get("sources").is_none());

        let frame = Frame::step_completed("weather", vec![], vec![]);
        let json: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(json["content"], "Completed: weather");
        assert_eq!(json["sources"], serde_json::json!([]));
        assert!(frame.is_completion());
    }

    #[test]
    fn test_encode_uses_sse_data_line() {
        let encoded = Frame::answer("It is sunny").encode().unwrap();
        assert_eq!(encoded, "data: {\"type\":\"answer\",\"content\":\"It is sunny\"}\n\n");
    }

    #[test]
    fn test_done_without_arrays_decodes() {
        let frame: Frame = serde_json::from_str(r#"{"type":"done"}"#).unwrap();
        assert_eq!(
            frame,
            Frame::Done {
                sources: None,
                images: None,
                suggestions: None
            }
        );
        assert!(frame.is_terminal());
    }

    #[test]
    fn test_source_without_content_decodes() {
        let source: Source = serde_json::from_str(r##"{"title":"T","url":"#"}"##).unwrap();
        assert_eq!(source.content, "");
        assert_eq!(source.domain, None);
    }
}
