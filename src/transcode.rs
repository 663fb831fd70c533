//! Event transcoder.
//!
//! Drains one agent run, classifies each event and writes protocol frames to
//! a sink in arrival order. Exactly one terminal frame (`done` or `error`) is
//! written per run.

use crate::agent::EventStream;
use crate::classify::{Classification, Classifier};
use crate::error::{Result, SvarError};
use crate::protocol::{Frame, Source, COMPLETED_PREFIX};
use crate::suggest::{FollowUpGenerator, MAX_SUGGESTIONS};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Append-only destination for frames, bound to one response.
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: Frame) -> Result<()>;
}

#[async_trait]
impl FrameSink for mpsc::Sender<Frame> {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        mpsc::Sender::send(self, frame)
            .await
            .map_err(|_| SvarError::SinkClosed)
    }
}

#[async_trait]
impl FrameSink for Vec<Frame> {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        self.push(frame);
        Ok(())
    }
}

/// Accumulated state of one transcoding run.
#[derive(Debug, Default)]
pub struct TranscodeState {
    sources: Vec<Source>,
    images: Vec<String>,
    steps: Vec<String>,
    answer: String,
    terminal_sent: bool,
}

impl TranscodeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one classified event into the state, returning the frame to write.
    pub fn apply(&mut self, classification: Classification) -> Option<Frame> {
        if self.terminal_sent {
            return None;
        }

        match classification {
            Classification::ToolStart { tool, display } => {
                self.steps.push(display.clone());
                Some(Frame::step_started(display, tool))
            }
            Classification::ToolEnd {
                tool,
                sources,
                images,
            } => {
                self.sources.extend(sources);
                self.images.extend(images);
                self.steps.push(format!("{} {}", COMPLETED_PREFIX, tool));
                Some(Frame::step_completed(
                    &tool,
                    self.sources.clone(),
                    self.images.clone(),
                ))
            }
            Classification::Token(text) => {
                self.answer.push_str(&text);
                Some(Frame::answer(text))
            }
            Classification::Other => None,
        }
    }

    /// The `done` frame, unless a terminal frame was already produced.
    pub fn finish(&mut self, suggestions: Vec<String>) -> Option<Frame> {
        if std::mem::replace(&mut self.terminal_sent, true) {
            return None;
        }
        Some(Frame::done(
            self.sources.clone(),
            self.images.clone(),
            suggestions,
        ))
    }

    /// The `error` frame, unless a terminal frame was already produced.
    pub fn fail(&mut self, message: impl Into<String>) -> Option<Frame> {
        if std::mem::replace(&mut self.terminal_sent, true) {
            return None;
        }
        Some(Frame::error(message))
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    /// Display text of every step so far, completions included.
    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn is_terminated(&self) -> bool {
        self.terminal_sent
    }
}

/// A fully delivered answer.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedAnswer {
    pub answer: String,
    pub sources: Vec<Source>,
    pub images: Vec<String>,
    pub suggestions: Vec<String>,
}

/// How a transcoding run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscodeOutcome {
    /// The `done` frame was written.
    Completed(CompletedAnswer),
    /// The `error` frame was written.
    Failed { message: String },
    /// The sink closed before a terminal frame could be written.
    Abandoned,
}

/// Transcode an agent run into frames on `sink`.
///
/// `history` is the conversation transcript handed to the follow-up
/// generator. Suggestion failures degrade to an empty list.
pub async fn transcode<S>(
    mut events: EventStream,
    classifier: &Classifier,
    suggester: &dyn FollowUpGenerator,
    history: &str,
    sink: &mut S,
) -> TranscodeOutcome
where
    S: FrameSink + ?Sized,
{
    let mut state = TranscodeState::new();

    while let Some(item) = events.next().await {
        let event = match item {
            Ok(event) => event,
            Err(e) => {
                error!("Agent run failed: {}", e);
                let message = e.to_string();
                return match state.fail(message.clone()) {
                    Some(frame) => match sink.send(frame).await {
                        Ok(()) => TranscodeOutcome::Failed { message },
                        Err(_) => TranscodeOutcome::Abandoned,
                    },
                    None => TranscodeOutcome::Abandoned,
                };
            }
        };

        let Some(frame) = state.apply(classifier.classify(&event)) else {
            continue;
        };
        if sink.send(frame).await.is_err() {
            debug!("Response sink closed mid-stream, abandoning run");
            return TranscodeOutcome::Abandoned;
        }
    }

    let suggestions = match suggester.suggest(history, state.answer()).await {
        Ok(mut suggestions) => {
            suggestions.truncate(MAX_SUGGESTIONS);
            suggestions
        }
        Err(e) => {
            warn!("Error generating suggestions: {}", e);
            Vec::new()
        }
    };

    let Some(done) = state.finish(suggestions.clone()) else {
        return TranscodeOutcome::Abandoned;
    };
    if sink.send(done).await.is_err() {
        debug!("Response sink closed before the done frame");
        return TranscodeOutcome::Abandoned;
    }

    TranscodeOutcome::Completed(CompletedAnswer {
        answer: state.answer,
        sources: state.sources,
        images: state.images,
        suggestions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentEvent;
    use crate::suggest::NoFollowUps;
    use futures::stream;

    struct FixedFollowUps(Vec<&'static str>);

    #[async_trait]
    impl FollowUpGenerator for FixedFollowUps {
        async fn suggest(&self, _history: &str, _answer: &str) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    struct FailingFollowUps;

    #[async_trait]
    impl FollowUpGenerator for FailingFollowUps {
        async fn suggest(&self, _history: &str, _answer: &str) -> Result<Vec<String>> {
            Err(SvarError::OpenAI("rate limited".into()))
        }
    }

    fn scripted(items: Vec<Result<AgentEvent>>) -> EventStream {
        Box::pin(stream::iter(items))
    }

    #[test]
    fn test_state_allows_one_terminal_frame() {
        let mut state = TranscodeState::new();
        assert!(!state.is_terminated());
        assert!(state.finish(vec![]).is_some());
        assert!(state.is_terminated());
        assert!(state.fail("late").is_none());
        assert!(state.finish(vec![]).is_none());
        assert!(state.apply(Classification::Token("x".into())).is_none());

        let mut state = TranscodeState::new();
        assert!(state.fail("boom").is_some());
        assert!(state.is_terminated());
        assert!(state.finish(vec![]).is_none());
    }

    #[test]
    fn test_completion_frames_carry_full_snapshots() {
        let mut state = TranscodeState::new();
        state.apply(Classification::ToolEnd {
            tool: "news_search".into(),
            sources: vec![Source::new("A", "http://a.test", "")],
            images: vec!["a.png".into()],
        });
        let frame = state.apply(Classification::ToolEnd {
            tool: "web_scraper".into(),
            sources: vec![Source::new("B", "http://b.test", "")],
            images: vec![],
        });

        match frame {
            Some(Frame::Step {
                content,
                tool,
                sources,
                images,
            }) => {
                assert_eq!(content, "Completed: web_scraper");
                assert_eq!(tool.as_deref(), Some("web_scraper"));
                assert_eq!(sources.unwrap().len(), 2);
                assert_eq!(images.unwrap(), vec!["a.png"]);
            }
            other => panic!("unexpected frame {:?}", other),
        }
        assert_eq!(state.steps(), &["Completed: news_search", "Completed: web_scraper"]);
    }

    #[tokio::test]
    async fn test_weather_run() {
        let events = scripted(vec![
            Ok(AgentEvent::chain_start()),
            Ok(AgentEvent::tool_start("weather", serde_json::json!({ "location": "Oslo" }))),
            Ok(AgentEvent::tool_end("weather", r#"{"results":[]}"#)),
            Ok(AgentEvent::token("It is sunny")),
            Ok(AgentEvent::chain_end()),
        ]);

        let mut frames: Vec<Frame> = Vec::new();
        let outcome = transcode(
            events,
            &Classifier::default(),
            &FixedFollowUps(vec!["Tomorrow?"]),
            "human: weather in Oslo",
            &mut frames,
        )
        .await;

        assert_eq!(
            frames,
            vec![
                Frame::step_started("Checking weather for \"Oslo\"", "weather"),
                Frame::step_completed("weather", vec![], vec![]),
                Frame::answer("It is sunny"),
                Frame::done(vec![], vec![], vec!["Tomorrow?".into()]),
            ]
        );
        assert_eq!(
            outcome,
            TranscodeOutcome::Completed(CompletedAnswer {
                answer: "It is sunny".into(),
                sources: vec![],
                images: vec![],
                suggestions: vec!["Tomorrow?".into()],
            })
        );
    }

    #[tokio::test]
    async fn test_agent_failure_writes_single_error_frame() {
        let events = scripted(vec![
            Ok(AgentEvent::token("Partial")),
            Err(SvarError::OpenAI("connection reset".into())),
            Ok(AgentEvent::token("never seen")),
        ]);

        let mut frames: Vec<Frame> = Vec::new();
        let outcome = transcode(events, &Classifier::default(), &NoFollowUps, "", &mut frames).await;

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], Frame::answer("Partial"));
        assert!(matches!(&frames[1], Frame::Error { message } if message.contains("connection reset")));
        assert!(matches!(outcome, TranscodeOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_suggestion_failure_still_completes() {
        let events = scripted(vec![Ok(AgentEvent::token("Hi"))]);
        let mut frames: Vec<Frame> = Vec::new();

        let outcome = transcode(events, &Classifier::default(), &FailingFollowUps, "", &mut frames).await;

        assert_eq!(frames.last(), Some(&Frame::done(vec![], vec![], vec![])));
        assert!(matches!(outcome, TranscodeOutcome::Completed(ref c) if c.suggestions.is_empty()));
    }

    #[tokio::test]
    async fn test_suggestions_are_capped() {
        let events = scripted(vec![]);
        let mut frames: Vec<Frame> = Vec::new();

        transcode(
            events,
            &Classifier::default(),
            &FixedFollowUps(vec!["a", "b", "c", "d"]),
            "",
            &mut frames,
        )
        .await;

        assert_eq!(frames, vec![Frame::done(vec![], vec![], vec!["a".into(), "b".into(), "c".into()])]);
    }

    #[tokio::test]
    async fn test_closed_channel_abandons_run() {
        let (mut tx, rx) = mpsc::channel::<Frame>(4);
        drop(rx);

        let events = scripted(vec![Ok(AgentEvent::token("Hi"))]);
        let outcome = transcode(events, &Classifier::default(), &NoFollowUps, "", &mut tx).await;
        assert_eq!(outcome, TranscodeOutcome::Abandoned);
    }

    #[tokio::test]
    async fn test_agent_failure_after_disconnect_abandons_run() {
        let (mut tx, rx) = mpsc::channel::<Frame>(4);
        drop(rx);

        let events = scripted(vec![Err(SvarError::Agent("model unavailable".into()))]);
        let outcome = transcode(events, &Classifier::default(), &NoFollowUps, "", &mut tx).await;
        assert_eq!(outcome, TranscodeOutcome::Abandoned);
    }
}
