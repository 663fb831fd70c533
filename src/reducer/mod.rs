//! Client stream reducer.
//!
//! [`reduce`] is a pure `(message, frame) -> message` transition over the open
//! assistant message. [`Conversation`] wraps it with byte buffering and the
//! message list.

mod conversation;

pub use conversation::Conversation;

use crate::message::{Message, Role, Step, StepStatus};
use crate::protocol::Frame;

/// Id of the synthetic step shown before the first tool starts.
pub const PLACEHOLDER_STEP_ID: &str = "init";

/// Title of the synthetic placeholder step.
pub const PLACEHOLDER_STEP_TITLE: &str = "Initializing search...";

/// Side effects requested by a frame, beyond the message update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Effects {
    /// The stream reached a terminal frame.
    pub streaming_ended: bool,
    /// The session list should be reloaded.
    pub refresh_sessions: bool,
}

impl Effects {
    pub fn merge(self, other: Effects) -> Effects {
        Effects {
            streaming_ended: self.streaming_ended || other.streaming_ended,
            refresh_sessions: self.refresh_sessions || other.refresh_sessions,
        }
    }
}

/// Apply one frame to the open assistant message.
///
/// Messages of any other role are returned unchanged.
pub fn reduce(mut message: Message, frame: &Frame) -> (Message, Effects) {
    let mut effects = Effects::default();
    if message.role != Role::Assistant {
        return (message, effects);
    }

    match frame {
        Frame::Answer { content } => message.content.push_str(content),

        Frame::Step {
            content,
            tool,
            sources,
            images,
        } => {
            let steps = message.research_steps.get_or_insert_with(Vec::new);
            steps.retain(|s| s.id != PLACEHOLDER_STEP_ID);

            if frame.is_completion() {
                complete_step(steps, tool.as_deref());
                if let Some(sources) = sources {
                    message.sources = Some(sources.clone());
                }
                if let Some(images) = images {
                    message.images = Some(images.clone());
                }
            } else {
                let id = format!("{}-step-{}", message.id, steps.len());
                steps.push(Step::in_progress(id, content.clone(), tool.clone()));
            }
        }

        Frame::Done {
            sources,
            images,
            suggestions,
        } => {
            if let Some(sources) = sources {
                message.sources = Some(sources.clone());
            }
            if let Some(images) = images {
                message.images = Some(images.clone());
            }
            if let Some(suggestions) = suggestions {
                message.suggestions = Some(suggestions.clone());
            }
            effects.streaming_ended = true;
            effects.refresh_sessions = true;
        }

        Frame::Error { message: error } => {
            message.content.push_str(&error_notice(error));
            effects.streaming_ended = true;
        }
    }

    (message, effects)
}

/// Visibly marked error text appended to an answer.
pub fn error_notice(error: &str) -> String {
    format!("\n\n**Error**: {}", error)
}

/// Close the latest in-progress step for `tool`, else the latest in-progress step.
fn complete_step(steps: &mut [Step], tool: Option<&str>) {
    let in_progress = |s: &Step| s.status == StepStatus::InProgress;

    let by_tool = tool.and_then(|tool| {
        steps
            .iter()
            .rposition(|s| in_progress(s) && s.tool_name.as_deref() == Some(tool))
    });

    if let Some(index) = by_tool.or_else(|| steps.iter().rposition(in_progress)) {
        steps[index].status = StepStatus::Completed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Source;

    fn open() -> Message {
        Message::assistant("a1", "")
    }

    fn apply(message: Message, frames: &[Frame]) -> Message {
        frames.iter().fold(message, |m, f| reduce(m, f).0)
    }

    fn statuses(message: &Message) -> Vec<(Option<&str>, StepStatus)> {
        message
            .steps()
            .iter()
            .map(|s| (s.tool_name.as_deref(), s.status))
            .collect()
    }

    #[test]
    fn test_answer_fragments_concatenate() {
        let message = apply(open(), &[Frame::answer("It is"), Frame::answer(" sunny")]);
        assert_eq!(message.content, "It is sunny");
    }

    #[test]
    fn test_completion_matches_tool_name() {
        let message = apply(
            open(),
            &[
                Frame::step_started("Checking weather", "weather"),
                Frame::step_started("Searching", "news_search"),
                Frame::step_completed("weather", vec![], vec![]),
            ],
        );
        assert_eq!(
            statuses(&message),
            vec![
                (Some("weather"), StepStatus::Completed),
                (Some("news_search"), StepStatus::InProgress),
            ]
        );
    }

    #[test]
    fn test_completion_falls_back_to_latest_in_progress() {
        let message = apply(
            open(),
            &[
                Frame::step_started("A", "alpha"),
                Frame::step_started("B", "beta"),
                Frame::step_completed("gamma", vec![], vec![]),
            ],
        );
        assert_eq!(
            statuses(&message),
            vec![
                (Some("alpha"), StepStatus::InProgress),
                (Some("beta"), StepStatus::Completed),
            ]
        );
    }

    #[test]
    fn test_completion_without_open_steps_is_noop() {
        let message = apply(open(), &[Frame::step_completed("weather", vec![], vec![])]);
        assert!(message.steps().is_empty());

        let message = apply(
            open(),
            &[
                Frame::step_started("A", "alpha"),
                Frame::step_completed("alpha", vec![], vec![]),
                Frame::step_completed("alpha", vec![], vec![]),
            ],
        );
        assert_eq!(statuses(&message), vec![(Some("alpha"), StepStatus::Completed)]);
    }

    #[test]
    fn test_placeholder_step_is_dropped() {
        let mut message = open();
        message.research_steps = Some(vec![Step::in_progress(
            PLACEHOLDER_STEP_ID,
            PLACEHOLDER_STEP_TITLE,
            None,
        )]);

        let message = apply(message, &[Frame::step_started("Searching", "news_search")]);
        assert_eq!(message.steps().len(), 1);
        assert_eq!(message.steps()[0].title, "Searching");
        assert_eq!(message.steps()[0].id, "a1-step-0");
    }

    #[test]
    fn test_completion_replaces_sources_with_snapshot() {
        let first = vec![Source::new("A", "http://a.test", "")];
        let both = vec![
            Source::new("A", "http://a.test", ""),
            Source::new("B", "http://b.test", ""),
        ];
        let message = apply(
            open(),
            &[
                Frame::step_started("s", "news_search"),
                Frame::step_completed("news_search", first, vec!["a.png".into()]),
                Frame::step_started("s", "web_scraper"),
                Frame::step_completed("web_scraper", both.clone(), vec!["a.png".into()]),
            ],
        );
        assert_eq!(message.sources, Some(both));
        assert_eq!(message.images, Some(vec!["a.png".to_string()]));
    }

    #[test]
    fn test_done_and_error_end_streaming() {
        let (message, effects) = reduce(
            open(),
            &Frame::done(vec![], vec![], vec!["Why?".into()]),
        );
        assert_eq!(message.suggestions, Some(vec!["Why?".to_string()]));
        assert_eq!(
            effects,
            Effects {
                streaming_ended: true,
                refresh_sessions: true
            }
        );

        let (message, effects) = reduce(Message::assistant("a", "Partial"), &Frame::error("timeout"));
        assert_eq!(message.content, "Partial\n\n**Error**: timeout");
        assert!(effects.streaming_ended);
        assert!(!effects.refresh_sessions);
    }

    #[test]
    fn test_user_messages_are_untouched() {
        let user = Message::user("u1", "hi");
        let (message, effects) = reduce(user.clone(), &Frame::answer("x"));
        assert_eq!(message, user);
        assert_eq!(effects, Effects::default());
    }
}
