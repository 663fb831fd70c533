//! Client-side conversation state.

use super::{error_notice, reduce, Effects, PLACEHOLDER_STEP_ID, PLACEHOLDER_STEP_TITLE};
use crate::error::{Result, SvarError};
use crate::history::{new_session_id, Session};
use crate::message::{Message, Role, Step};
use crate::protocol::{Frame, FrameDecoder};
use tracing::{debug, warn};

/// Message list of one conversation plus the stream feeding its last message.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    is_streaming: bool,
    session_id: Option<String>,
    decoder: FrameDecoder,
}

impl Conversation {
    /// A fresh conversation with a newly minted session id.
    pub fn new() -> Self {
        Self::with_session(new_session_id())
    }

    /// A conversation that will be stored under `session_id`.
    pub fn with_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// The open (or most recent) assistant message.
    pub fn last_answer(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    /// Add the question and an empty assistant message that the stream will fill.
    pub fn begin_ask(&mut self, question: &str, research: bool) -> Result<()> {
        if self.is_streaming {
            return Err(SvarError::Busy);
        }

        self.messages.push(Message::user(new_message_id(), question));

        let mut answer = Message::assistant(new_message_id(), "");
        if research {
            answer.research_steps = Some(vec![Step::in_progress(
                PLACEHOLDER_STEP_ID,
                PLACEHOLDER_STEP_TITLE,
                None,
            )]);
        }
        self.messages.push(answer);

        self.decoder = FrameDecoder::new();
        self.is_streaming = true;
        Ok(())
    }

    /// Feed one network chunk; complete frames are applied in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Effects {
        let frames = self.decoder.push(chunk);
        frames
            .iter()
            .fold(Effects::default(), |acc, frame| acc.merge(self.apply(frame)))
    }

    /// Apply one decoded frame to the open message.
    pub fn apply(&mut self, frame: &Frame) -> Effects {
        if !self.is_streaming {
            debug!("Ignoring frame outside of a stream");
            return Effects::default();
        }
        let Some(last) = self.messages.pop() else {
            warn!("Received a frame with no open message");
            return Effects::default();
        };

        let (next, effects) = reduce(last, frame);
        self.messages.push(next);
        if effects.streaming_ended {
            self.is_streaming = false;
        }
        effects
    }

    /// The response body ended. Flushes any unterminated final frame.
    pub fn finish(&mut self) -> Effects {
        let effects = match self.decoder.finish() {
            Some(frame) => self.apply(&frame),
            None => Effects::default(),
        };
        self.is_streaming = false;
        effects
    }

    /// The transport failed mid-stream.
    pub fn fail(&mut self, error: &str) {
        if !self.is_streaming {
            return;
        }
        if let Some(last) = self.messages.last_mut().filter(|m| m.role == Role::Assistant) {
            last.content.push_str(&error_notice(error));
        }
        self.is_streaming = false;
    }

    /// Replace the conversation with a stored session.
    pub fn load_session(&mut self, session: Session) -> Result<()> {
        if self.is_streaming {
            return Err(SvarError::Busy);
        }

        let session_id = session.session_id;
        self.messages = session
            .messages
            .into_iter()
            .enumerate()
            .map(|(i, mut m)| {
                if m.id.is_empty() {
                    m.id = format!("{}-{}", session_id, i);
                }
                m
            })
            .collect();
        self.session_id = Some(session_id);
        Ok(())
    }

    /// Clear the conversation and move to a newly minted session.
    pub fn start_new_chat(&mut self) -> Result<()> {
        if self.is_streaming {
            return Err(SvarError::Busy);
        }
        self.messages.clear();
        self.session_id = Some(new_session_id());
        self.decoder = FrameDecoder::new();
        Ok(())
    }

    /// Flip the bookmark flag of a message. Returns the new state.
    pub fn toggle_bookmark(&mut self, message_id: &str) -> Option<bool> {
        let message = self.messages.iter_mut().find(|m| m.id == message_id)?;
        let bookmarked = !message.is_bookmarked.unwrap_or(false);
        message.is_bookmarked = Some(bookmarked);
        Some(bookmarked)
    }
}

fn new_message_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::StepStatus;
    use chrono::Utc;

    fn wire(frames: &[Frame]) -> Vec<u8> {
        frames
            .iter()
            .map(|f| f.encode().unwrap())
            .collect::<String>()
            .into_bytes()
    }

    fn session(messages: Vec<Message>) -> Session {
        Session {
            session_id: "session_7".into(),
            user_id: "u1".into(),
            title: "Old".into(),
            messages,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_ask_stream_lifecycle() {
        let mut conversation = Conversation::new();
        conversation.begin_ask("Weather in Oslo?", true).unwrap();
        assert!(conversation.is_streaming());
        assert_eq!(conversation.messages().len(), 2);
        assert_eq!(conversation.messages()[1].steps()[0].title, PLACEHOLDER_STEP_TITLE);

        let bytes = wire(&[
            Frame::step_started("Checking weather for \"Oslo\"", "weather"),
            Frame::step_completed("weather", vec![], vec![]),
            Frame::answer("It is "),
            Frame::answer("sunny"),
            Frame::done(vec![], vec![], vec!["Tomorrow?".into()]),
        ]);
        let (head, tail) = bytes.split_at(17);
        let mut effects = conversation.feed(head);
        effects = effects.merge(conversation.feed(tail));

        assert!(effects.refresh_sessions);
        assert!(!conversation.is_streaming());
        assert_eq!(conversation.messages().len(), 2);

        let answer = conversation.last_answer().unwrap();
        assert_eq!(answer.content, "It is sunny");
        assert_eq!(answer.steps().len(), 1);
        assert_eq!(answer.steps()[0].status, StepStatus::Completed);
        assert_eq!(answer.suggestions, Some(vec!["Tomorrow?".to_string()]));
    }

    #[test]
    fn test_new_conversation_has_session_id() {
        let first = Conversation::new();
        let second = Conversation::new();
        assert!(first.session_id().unwrap().starts_with("session_"));
        assert_ne!(first.session_id(), second.session_id());
    }

    #[test]
    fn test_busy_while_streaming() {
        let mut conversation = Conversation::new();
        conversation.begin_ask("q", false).unwrap();

        assert!(matches!(conversation.begin_ask("again", false), Err(SvarError::Busy)));
        assert!(matches!(conversation.start_new_chat(), Err(SvarError::Busy)));
        assert!(matches!(conversation.load_session(session(vec![])), Err(SvarError::Busy)));
        assert_eq!(conversation.messages().len(), 2);
    }

    #[test]
    fn test_malformed_frame_is_dropped() {
        let mut conversation = Conversation::new();
        conversation.begin_ask("q", false).unwrap();

        let mut bytes = wire(&[Frame::answer("A")]);
        bytes.extend_from_slice(b"data: {not json}\n\n");
        bytes.extend(wire(&[Frame::answer("B")]));
        conversation.feed(&bytes);

        assert_eq!(conversation.last_answer().unwrap().content, "AB");
        assert!(conversation.is_streaming());
    }

    #[test]
    fn test_finish_flushes_trailing_frame() {
        let mut conversation = Conversation::new();
        conversation.begin_ask("q", false).unwrap();

        let encoded = Frame::answer("tail").encode().unwrap();
        conversation.feed(encoded.trim_end().as_bytes());
        assert_eq!(conversation.last_answer().unwrap().content, "");

        conversation.finish();
        assert_eq!(conversation.last_answer().unwrap().content, "tail");
        assert!(!conversation.is_streaming());
    }

    #[test]
    fn test_fail_marks_error() {
        let mut conversation = Conversation::new();
        conversation.begin_ask("q", false).unwrap();
        conversation.feed(&wire(&[Frame::answer("Half")]));
        conversation.fail("connection reset");

        assert_eq!(
            conversation.last_answer().unwrap().content,
            "Half\n\n**Error**: connection reset"
        );
        assert!(!conversation.is_streaming());
    }

    #[test]
    fn test_frames_after_terminal_are_ignored() {
        let mut conversation = Conversation::new();
        conversation.begin_ask("q", false).unwrap();
        conversation.feed(&wire(&[Frame::error("boom"), Frame::answer("late")]));

        assert_eq!(conversation.last_answer().unwrap().content, "\n\n**Error**: boom");
    }

    #[test]
    fn test_load_session_fills_missing_ids() {
        let mut conversation = Conversation::new();
        let mut stored = Message::assistant("kept", "a");
        stored.is_bookmarked = Some(true);
        conversation
            .load_session(session(vec![Message::user("", "q"), stored]))
            .unwrap();

        assert_eq!(conversation.session_id(), Some("session_7"));
        assert_eq!(conversation.messages()[0].id, "session_7-0");
        assert_eq!(conversation.messages()[1].id, "kept");

        assert_eq!(conversation.toggle_bookmark("kept"), Some(false));
        assert_eq!(conversation.toggle_bookmark("session_7-0"), Some(true));
        assert_eq!(conversation.toggle_bookmark("missing"), None);

        conversation.start_new_chat().unwrap();
        assert!(conversation.messages().is_empty());
        let fresh = conversation.session_id().unwrap().to_string();
        assert!(fresh.starts_with("session_"));
        assert_ne!(fresh, "session_7");
    }
}
