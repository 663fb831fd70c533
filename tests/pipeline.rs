//! End-to-end tests of the answer pipeline: scripted agent runs through the
//! transcoder, over the wire format, and into the client reducer.

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use svar::agent::events::{AgentEvent, EventStream};
use svar::agent::{AgentRun, AgentRunner, ToolSet};
use svar::classify::Classifier;
use svar::client::{AskRequest, SvarClient};
use svar::config::{Prompts, Settings};
use svar::history::{HistoryStore, InMemoryHistoryStore};
use svar::message::StepStatus;
use svar::protocol::Frame;
use svar::reducer::Conversation;
use svar::server::{self, AppState};
use svar::sidecar::Sidecar;
use svar::suggest::{FollowUpGenerator, NoFollowUps};
use svar::transcode::{transcode, TranscodeOutcome};
use svar::{Result, SvarError};

/// Replays a fixed list of events for every run and records what it was given.
struct ScriptedAgent {
    script: Vec<Result<AgentEvent>>,
    runs: Mutex<Vec<AgentRun>>,
}

impl ScriptedAgent {
    fn new(events: Vec<AgentEvent>) -> Self {
        Self::with_results(events.into_iter().map(Ok).collect())
    }

    fn with_results(script: Vec<Result<AgentEvent>>) -> Self {
        Self {
            script,
            runs: Mutex::new(Vec::new()),
        }
    }
}

impl AgentRunner for ScriptedAgent {
    fn run(&self, run: AgentRun) -> EventStream {
        self.runs.lock().unwrap().push(run);
        let script: Vec<Result<AgentEvent>> = self
            .script
            .iter()
            .map(|item| match item {
                Ok(event) => Ok(event.clone()),
                Err(e) => Err(SvarError::Agent(e.to_string())),
            })
            .collect();
        Box::pin(futures::stream::iter(script))
    }
}

struct FixedFollowUps(Vec<String>);

#[async_trait]
impl FollowUpGenerator for FixedFollowUps {
    async fn suggest(&self, _history: &str, _answer: &str) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

fn weather_run() -> Vec<AgentEvent> {
    vec![
        AgentEvent::chain_start(),
        AgentEvent::tool_start("weather", json!({ "location": "Oslo" })),
        AgentEvent::tool_end("weather", r#"{"results":[]}"#),
        AgentEvent::token("It is sunny"),
        AgentEvent::chain_end(),
    ]
}

async fn run_through_transcoder(agent: &ScriptedAgent) -> (Vec<Frame>, TranscodeOutcome) {
    let events = agent.run(AgentRun::new(Vec::new(), ToolSet::new(), "system"));
    let mut frames: Vec<Frame> = Vec::new();
    let outcome = transcode(
        events,
        &Classifier::default(),
        &FixedFollowUps(vec!["What about tomorrow?".into()]),
        "human: Weather in Oslo?",
        &mut frames,
    )
    .await;
    (frames, outcome)
}

fn wire(frames: &[Frame]) -> Vec<u8> {
    frames
        .iter()
        .map(|f| f.encode().unwrap())
        .collect::<String>()
        .into_bytes()
}

#[tokio::test]
async fn test_weather_run_frames_in_order() {
    let agent = ScriptedAgent::new(weather_run());
    let (frames, outcome) = run_through_transcoder(&agent).await;

    assert_eq!(
        frames,
        vec![
            Frame::step_started("Checking weather for \"Oslo\"", "weather"),
            Frame::step_completed("weather", vec![], vec![]),
            Frame::answer("It is sunny"),
            Frame::done(vec![], vec![], vec!["What about tomorrow?".into()]),
        ]
    );
    match outcome {
        TranscodeOutcome::Completed(done) => assert_eq!(done.answer, "It is sunny"),
        other => panic!("expected a completed answer, got {:?}", other),
    }
}

#[tokio::test]
async fn test_reducer_is_independent_of_chunk_boundaries() {
    let agent = ScriptedAgent::new(vec![
        AgentEvent::tool_start("news_search", json!({ "query": "nordic weather" })),
        AgentEvent::tool_end(
            "news_search",
            r#"{"results":[{"title":"Yr","url":"https://www.yr.no/oslo","snippet":"Sun"}],"images":["sun.png"]}"#,
        ),
        AgentEvent::token("Sunny, "),
        AgentEvent::token("18°C æøå"),
    ]);
    let (frames, _) = run_through_transcoder(&agent).await;
    let bytes = wire(&frames);

    let mut expected = Conversation::new();
    expected.begin_ask("Weather?", true).unwrap();
    expected.feed(&bytes);
    let expected = expected.last_answer().unwrap().clone();

    assert_eq!(expected.content, "Sunny, 18°C æøå");
    assert_eq!(expected.steps().len(), 1);
    assert_eq!(expected.steps()[0].status, StepStatus::Completed);
    assert_eq!(expected.sources.as_ref().unwrap()[0].domain.as_deref(), Some("www.yr.no"));
    assert_eq!(expected.images, Some(vec!["sun.png".to_string()]));

    for split in 0..=bytes.len() {
        let mut conversation = Conversation::new();
        conversation.begin_ask("Weather?", true).unwrap();
        let (head, tail) = bytes.split_at(split);
        let effects = conversation.feed(head).merge(conversation.feed(tail));

        let answer = conversation.last_answer().unwrap();
        assert_eq!(answer.content, expected.content, "split at {}", split);
        assert_eq!(answer.sources, expected.sources, "split at {}", split);
        assert_eq!(answer.suggestions, expected.suggestions, "split at {}", split);
        assert!(!conversation.is_streaming(), "split at {}", split);
        assert!(effects.streaming_ended);
    }

    // One byte at a time.
    let mut conversation = Conversation::new();
    conversation.begin_ask("Weather?", true).unwrap();
    for byte in &bytes {
        conversation.feed(std::slice::from_ref(byte));
    }
    assert_eq!(conversation.last_answer().unwrap().content, expected.content);
}

#[tokio::test]
async fn test_failed_run_ends_with_single_error_frame() {
    let agent = ScriptedAgent::with_results(vec![
        Ok(AgentEvent::token("Partial")),
        Err(SvarError::Agent("model unavailable".into())),
        Ok(AgentEvent::token("never seen")),
    ]);
    let (frames, outcome) = run_through_transcoder(&agent).await;

    assert_eq!(frames.len(), 2);
    assert!(matches!(frames[1], Frame::Error { .. }));
    assert_eq!(frames.iter().filter(|f| f.is_terminal()).count(), 1);
    assert!(matches!(outcome, TranscodeOutcome::Failed { .. }));

    let mut conversation = Conversation::new();
    conversation.begin_ask("q", false).unwrap();
    conversation.feed(&wire(&frames));
    let answer = conversation.last_answer().unwrap();
    assert!(answer.content.starts_with("Partial\n\n**Error**: "));
    assert!(answer.content.contains("model unavailable"));
    assert!(!conversation.is_streaming());
}

async fn start_server(agent: Arc<ScriptedAgent>, history: Arc<InMemoryHistoryStore>) -> String {
    let settings = Settings::default();
    let history: Arc<dyn HistoryStore> = history;
    let state = Arc::new(AppState {
        agent,
        tools: ToolSet::new(),
        classifier: Classifier::from_settings(&settings.tools),
        suggester: Arc::new(NoFollowUps),
        history: history.clone(),
        sidecar: Sidecar {
            history,
            memory: None,
        },
        prompts: Prompts::default(),
        settings,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve(listener, state));
    format!("http://{}", addr)
}

/// Persistence runs in the background, so poll until the session shows up.
async fn wait_for_session(client: &SvarClient, session_id: &str, messages: usize) {
    for _ in 0..100 {
        if let Ok(session) = client.get_session(session_id).await {
            if session.messages.len() >= messages {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("session {} was never stored", session_id);
}

#[tokio::test]
async fn test_ask_over_http_persists_session() {
    let agent = Arc::new(ScriptedAgent::new(weather_run()));
    let history = Arc::new(InMemoryHistoryStore::new());
    let base_url = start_server(agent.clone(), history.clone()).await;
    let client = SvarClient::new(&base_url, "u1");

    let mut conversation = Conversation::with_session("session_http");
    let mut updates = 0;
    let effects = client
        .ask(
            &mut conversation,
            AskRequest {
                is_research_mode: true,
                ..AskRequest::new("What's the weather in Oslo right now?")
            },
            |_, _| updates += 1,
        )
        .await
        .unwrap();

    assert!(effects.refresh_sessions);
    assert!(updates > 0);
    let answer = conversation.last_answer().unwrap();
    assert_eq!(answer.content, "It is sunny");
    assert_eq!(answer.steps().len(), 1);
    assert_eq!(answer.steps()[0].title, "Checking weather for \"Oslo\"");
    assert_eq!(answer.suggestions, Some(vec![]));

    wait_for_session(&client, "session_http", 2).await;
    let sessions = client.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].title, "What's the weather in Oslo right now?");

    // A second question in the same session sees the first turn as history.
    client
        .ask(&mut conversation, AskRequest::new("And tomorrow?"), |_, _| {})
        .await
        .unwrap();
    wait_for_session(&client, "session_http", 4).await;
    {
        let runs = agent.runs.lock().unwrap();
        assert_eq!(runs.len(), 2);
        let contents: Vec<&str> = runs[1].messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["What's the weather in Oslo right now?", "It is sunny", "And tomorrow?"]
        );
    }

    let renamed = client.rename_session("session_http", "Oslo weather").await.unwrap();
    assert_eq!(renamed.title, "Oslo weather");

    client.delete_session("session_http").await.unwrap();
    assert!(matches!(
        client.get_session("session_http").await,
        Err(SvarError::SessionNotFound(_))
    ));
    assert!(matches!(
        client.delete_session("session_http").await,
        Err(SvarError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_sessions_are_scoped_per_user() {
    let agent = Arc::new(ScriptedAgent::new(weather_run()));
    let history = Arc::new(InMemoryHistoryStore::new());
    let base_url = start_server(agent, history).await;

    let alice = SvarClient::new(&base_url, "alice");
    let bob = SvarClient::new(&base_url, "bob");

    let mut conversation = Conversation::with_session("session_alice");
    alice
        .ask(&mut conversation, AskRequest::new("Weather?"), |_, _| {})
        .await
        .unwrap();
    wait_for_session(&alice, "session_alice", 2).await;

    assert!(bob.list_sessions().await.unwrap().is_empty());
    assert!(matches!(
        bob.get_session("session_alice").await,
        Err(SvarError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_ask_failure_is_streamed_and_not_persisted() {
    let agent = Arc::new(ScriptedAgent::with_results(vec![Err(SvarError::Agent(
        "rate limited".into(),
    ))]));
    let history = Arc::new(InMemoryHistoryStore::new());
    let base_url = start_server(agent, history.clone()).await;
    let client = SvarClient::new(&base_url, "u1");

    let mut conversation = Conversation::with_session("session_fail");
    let effects = client
        .ask(&mut conversation, AskRequest::new("q"), |_, _| {})
        .await
        .unwrap();

    assert!(effects.streaming_ended);
    assert!(!effects.refresh_sessions);
    assert!(conversation.last_answer().unwrap().content.contains("**Error**"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(history.list_sessions("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_blank_question_is_rejected() {
    let agent = Arc::new(ScriptedAgent::new(weather_run()));
    let base_url = start_server(agent.clone(), Arc::new(InMemoryHistoryStore::new())).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/ask", base_url))
        .json(&json!({ "message": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    assert!(agent.runs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_new_conversation_keeps_turns_in_one_session() {
    let agent = Arc::new(ScriptedAgent::new(weather_run()));
    let base_url = start_server(agent, Arc::new(InMemoryHistoryStore::new())).await;
    let client = SvarClient::new(&base_url, "u1");

    let mut conversation = Conversation::new();
    let session_id = conversation.session_id().unwrap().to_string();
    client
        .ask(&mut conversation, AskRequest::new("Weather in Oslo?"), |_, _| {})
        .await
        .unwrap();
    wait_for_session(&client, &session_id, 2).await;
    client
        .ask(&mut conversation, AskRequest::new("And in Bergen?"), |_, _| {})
        .await
        .unwrap();
    wait_for_session(&client, &session_id, 4).await;
    assert_eq!(client.list_sessions().await.unwrap().len(), 1);

    conversation.start_new_chat().unwrap();
    let next_id = conversation.session_id().unwrap().to_string();
    assert_ne!(next_id, session_id);
    client
        .ask(&mut conversation, AskRequest::new("Weather in Tromsø?"), |_, _| {})
        .await
        .unwrap();
    wait_for_session(&client, &next_id, 2).await;
    assert_eq!(client.list_sessions().await.unwrap().len(), 2);
}
