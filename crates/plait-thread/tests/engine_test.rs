use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use plait_actions::{ActionRegistry, LookupAction, LookupSpec, SearchCollection, SearchHit};
use plait_context::ContextStore;
use plait_llm::{
    replay_response, CompletionRequest, EventStream, Message, ModelInvoker, ModelResponse,
    StreamEvent,
};
use plait_store::MemoryPersister;
use plait_thread::{
    CompletionEngine, CompletionSeed, CompletionState, CompletionStore, StreamHandlers, Thread,
    ThreadSettings,
};
use serde_json::json;

enum ScriptedTurn {
    Events(Vec<StreamEvent>),
    Response(ModelResponse),
    Fail(String),
}

/// Invoker that plays back scripted turns, recording each request.
struct MockInvoker {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockInvoker {
    fn scripted(turns: Vec<ScriptedTurn>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    fn next_turn(&self) -> Option<ScriptedTurn> {
        self.turns.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl ModelInvoker for MockInvoker {
    async fn complete(&self, request: CompletionRequest) -> Result<ModelResponse> {
        self.requests.lock().unwrap().push(request);
        match self.next_turn() {
            Some(ScriptedTurn::Response(response)) => Ok(response),
            Some(ScriptedTurn::Fail(message)) => Err(anyhow::anyhow!(message)),
            Some(ScriptedTurn::Events(_)) | None => Err(anyhow::anyhow!("no scripted response")),
        }
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<EventStream> {
        self.requests.lock().unwrap().push(request);
        match self.next_turn() {
            Some(ScriptedTurn::Events(events)) => {
                Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
            }
            Some(ScriptedTurn::Response(response)) => Ok(replay_response(response)),
            Some(ScriptedTurn::Fail(message)) => Ok(Box::pin(futures::stream::iter(vec![Err(
                anyhow::anyhow!(message),
            )]))),
            None => Err(anyhow::anyhow!("no scripted turn")),
        }
    }
}

struct StubSearch {
    hits: Vec<SearchHit>,
}

#[async_trait]
impl SearchCollection for StubSearch {
    async fn lookup(&self, _spec: LookupSpec) -> Result<Vec<SearchHit>> {
        Ok(self.hits.clone())
    }
}

struct Fixture {
    engine: CompletionEngine,
    invoker: Arc<MockInvoker>,
    completions: Arc<CompletionStore>,
    contexts: Arc<ContextStore>,
    persister: Arc<MemoryPersister>,
}

async fn fixture(turns: Vec<ScriptedTurn>) -> Fixture {
    let invoker = MockInvoker::scripted(turns);
    let completions = Arc::new(CompletionStore::new());
    let contexts = Arc::new(ContextStore::new());
    let persister = Arc::new(MemoryPersister::new());

    let registry = Arc::new(ActionRegistry::new());
    let search = Arc::new(StubSearch {
        hits: vec![SearchHit::new("Note.md", 0.8)],
    });
    registry
        .register(Arc::new(LookupAction::new(search, contexts.clone())))
        .await;

    let engine = CompletionEngine::new(
        invoker.clone(),
        registry,
        contexts.clone(),
        completions.clone(),
    )
    .with_persister(persister.clone());

    Fixture {
        engine,
        invoker,
        completions,
        contexts,
        persister,
    }
}

fn message_events(parts: &[&str]) -> Vec<StreamEvent> {
    let mut events: Vec<StreamEvent> = parts
        .iter()
        .map(|part| StreamEvent::Message { content: part.to_string() })
        .collect();
    events.push(StreamEvent::Done { finish_reason: Some("stop".to_string()) });
    events
}

fn record_response(completions: &CompletionStore, key: &str, text: &str) {
    completions.update(key, |c| {
        c.responses.push(text.to_string());
        c.response_text = text.to_string();
        c.state = CompletionState::Done;
    });
}

#[tokio::test]
async fn fresh_thread_allocates_a_context_and_later_turns_inherit_it() {
    let fx = fixture(vec![]).await;
    let mut thread = Thread::new("t1");

    let first = fx.engine.new_completion(&mut thread, CompletionSeed::default());
    let first_context = first.context_key.clone().expect("fresh context allocated");
    assert!(fx.contexts.get(&first_context).is_some());

    record_response(&fx.completions, &first.key, "answer one");

    let second = fx.engine.new_completion(&mut thread, CompletionSeed::default());
    assert_eq!(second.context_key.as_deref(), Some(first_context.as_str()));

    record_response(&fx.completions, &second.key, "answer two");

    let explicit = fx.engine.new_completion(
        &mut thread,
        CompletionSeed {
            context_key: Some("other-context".to_string()),
            ..Default::default()
        },
    );
    assert_eq!(explicit.context_key.as_deref(), Some("other-context"));
}

#[tokio::test]
async fn default_system_prompt_attaches_to_the_first_turn_only() {
    let fx = fixture(vec![]).await;
    let settings = ThreadSettings {
        system_prompt: "You are a careful assistant.".to_string(),
        ..Default::default()
    };
    let mut thread = Thread::with_settings("t1", settings);

    let first = fx.engine.new_completion(&mut thread, CompletionSeed::default());
    assert_eq!(
        first.system_message.as_deref(),
        Some("You are a careful assistant.")
    );

    record_response(&fx.completions, &first.key, "hi");

    let second = fx.engine.new_completion(&mut thread, CompletionSeed::default());
    assert_eq!(second.system_message, None);
}

#[tokio::test]
async fn completion_keys_are_unique_within_a_run() {
    let fx = fixture(vec![]).await;
    let mut thread = Thread::new("t1");

    let a = fx.engine.new_completion(&mut thread, CompletionSeed::default());
    let b = fx.engine.new_completion(&mut thread, CompletionSeed::default());
    let c = fx.engine.new_completion(&mut thread, CompletionSeed::default());

    assert_ne!(a.key, b.key);
    assert_ne!(b.key, c.key);
    assert_eq!(thread.completion_keys(), vec![a.key, b.key, c.key]);
}

#[tokio::test]
async fn request_deduplicates_identical_prior_content_first_seen_wins() {
    let fx = fixture(vec![]).await;
    let mut thread = Thread::new("t1");

    let first = fx.engine.new_completion(
        &mut thread,
        CompletionSeed { user_message: Some("q1".into()), ..Default::default() },
    );
    record_response(&fx.completions, &first.key, "the same answer");

    let second = fx.engine.new_completion(
        &mut thread,
        CompletionSeed { user_message: Some("q2".into()), ..Default::default() },
    );
    record_response(&fx.completions, &second.key, "the same answer");

    let current = fx.engine.new_completion(
        &mut thread,
        CompletionSeed { user_message: Some("q3".into()), ..Default::default() },
    );

    let request = fx
        .engine
        .build_request(&thread, &current.key)
        .await
        .expect("request built");

    let assistants: Vec<&Message> = request
        .messages
        .iter()
        .filter(|m| m.role() == "assistant")
        .collect();
    assert_eq!(assistants.len(), 1, "duplicate assistant content collapsed");

    // The surviving copy is the first occurrence: right after q1.
    let q1_pos = request
        .messages
        .iter()
        .position(|m| m.dedup_key().as_deref() == Some("q1"))
        .unwrap();
    let answer_pos = request
        .messages
        .iter()
        .position(|m| m.role() == "assistant")
        .unwrap();
    assert_eq!(answer_pos, q1_pos + 1);

    // The current turn's message comes last.
    assert_eq!(
        request.messages.last().and_then(|m| m.dedup_key()).as_deref(),
        Some("q3")
    );
}

#[tokio::test]
async fn streaming_run_accumulates_chunks_and_finalizes() {
    let fx = fixture(vec![ScriptedTurn::Events(message_events(&["Hel", "lo"]))]).await;
    let mut thread = Thread::new("t1");
    let completion = fx.engine.new_completion(
        &mut thread,
        CompletionSeed { user_message: Some("hi".into()), ..Default::default() },
    );

    let chunks = Arc::new(AtomicUsize::new(0));
    let dones = Arc::new(AtomicUsize::new(0));
    let handlers = StreamHandlers {
        chunk: Some({
            let chunks = chunks.clone();
            Arc::new(move |_c| {
                chunks.fetch_add(1, Ordering::SeqCst);
            })
        }),
        done: Some({
            let dones = dones.clone();
            Arc::new(move |_c| {
                dones.fetch_add(1, Ordering::SeqCst);
            })
        }),
        error: None,
    };

    let follow = fx
        .engine
        .run(&mut thread, &completion.key, &handlers)
        .await
        .unwrap();
    assert_eq!(follow, None);

    let stored = fx.completions.get(&completion.key).unwrap();
    assert_eq!(stored.state, CompletionState::Done);
    assert_eq!(stored.responses, vec!["Hel", "lo"]);
    assert_eq!(stored.response_text, "Hello");
    assert_eq!(chunks.load(Ordering::SeqCst), 2);
    assert_eq!(dones.load(Ordering::SeqCst), 1);

    // The turn and its thread were queued and flush persists them.
    let flushed = fx.engine.process_save_queue().await.unwrap();
    assert!(flushed >= 2);
    let saved = fx.persister.saved();
    assert!(saved.contains(&completion.key));
    assert!(saved.contains(&"t1".to_string()));
}

#[tokio::test]
async fn non_streaming_run_matches_the_streaming_result() {
    let fx = fixture(vec![ScriptedTurn::Response(ModelResponse {
        content: Some("Hello".into()),
        ..Default::default()
    })])
    .await;
    let mut thread = Thread::with_settings(
        "t1",
        ThreadSettings { stream: false, ..Default::default() },
    );
    let completion = fx.engine.new_completion(
        &mut thread,
        CompletionSeed { user_message: Some("hi".into()), ..Default::default() },
    );

    fx.engine
        .run(&mut thread, &completion.key, &StreamHandlers::none())
        .await
        .unwrap();

    let stored = fx.completions.get(&completion.key).unwrap();
    assert_eq!(stored.state, CompletionState::Done);
    assert_eq!(stored.response_text, "Hello");
}

#[tokio::test]
async fn stream_errors_leave_the_completion_retryable() {
    let fx = fixture(vec![
        ScriptedTurn::Fail("connection reset".to_string()),
        ScriptedTurn::Events(message_events(&["recovered"])),
    ])
    .await;
    let mut thread = Thread::new("t1");
    let completion = fx.engine.new_completion(
        &mut thread,
        CompletionSeed { user_message: Some("hi".into()), ..Default::default() },
    );

    let errors = Arc::new(AtomicUsize::new(0));
    let handlers = StreamHandlers {
        chunk: None,
        done: None,
        error: Some({
            let errors = errors.clone();
            Arc::new(move |_msg| {
                errors.fetch_add(1, Ordering::SeqCst);
            })
        }),
    };

    fx.engine.run(&mut thread, &completion.key, &handlers).await.unwrap();
    let stored = fx.completions.get(&completion.key).unwrap();
    assert_eq!(stored.state, CompletionState::Errored);
    assert_eq!(errors.load(Ordering::SeqCst), 1);

    // Retrying re-enters the lifecycle from a clean accumulator.
    fx.engine
        .run(&mut thread, &completion.key, &StreamHandlers::none())
        .await
        .unwrap();
    let stored = fx.completions.get(&completion.key).unwrap();
    assert_eq!(stored.state, CompletionState::Done);
    assert_eq!(stored.response_text, "recovered");
}

#[tokio::test]
async fn a_new_turn_supersedes_a_streaming_one_and_its_writes_are_discarded() {
    let fx = fixture(vec![ScriptedTurn::Events(message_events(&["late"]))]).await;
    let mut thread = Thread::new("t1");
    let old = fx.engine.new_completion(&mut thread, CompletionSeed::default());

    // Simulate the old turn being mid-stream when the user moves on.
    fx.completions.update(&old.key, |c| c.state = CompletionState::Streaming);
    let newer = fx.engine.new_completion(&mut thread, CompletionSeed::default());

    let stored_old = fx.completions.get(&old.key).unwrap();
    assert!(stored_old.superseded);
    assert!(!fx.completions.get(&newer.key).unwrap().superseded);

    // Late writes from the orphaned stream land nowhere.
    fx.completions.update(&old.key, |c| c.state = CompletionState::Created);
    let chunks = Arc::new(AtomicUsize::new(0));
    let handlers = StreamHandlers {
        chunk: Some({
            let chunks = chunks.clone();
            Arc::new(move |_c| {
                chunks.fetch_add(1, Ordering::SeqCst);
            })
        }),
        done: None,
        error: None,
    };
    fx.engine.run(&mut thread, &old.key, &handlers).await.unwrap();

    let stored_old = fx.completions.get(&old.key).unwrap();
    assert!(stored_old.responses.is_empty(), "superseded chunks discarded");
    assert!(stored_old.response_text.is_empty());
    assert_ne!(stored_old.state, CompletionState::Done);
    assert_eq!(chunks.load(Ordering::SeqCst), 0, "no chunk callbacks fired");
}

#[tokio::test]
async fn tool_call_resolves_and_creates_the_follow_up_turn() {
    let fx = fixture(vec![ScriptedTurn::Events(vec![
        StreamEvent::ToolCall {
            index: 0,
            id: Some("call_1".into()),
            name: Some("lookup_context".into()),
            arguments: Some(r#"{"hypothetical_1":"a","#.into()),
        },
        StreamEvent::ToolCall {
            index: 0,
            id: None,
            name: None,
            arguments: Some(r#""hypothetical_2":"b"}"#.into()),
        },
        StreamEvent::Done { finish_reason: Some("tool_calls".into()) },
    ])])
    .await;
    let mut thread = Thread::new("t1");
    let completion = fx.engine.new_completion(
        &mut thread,
        CompletionSeed { user_message: Some("what do my notes say?".into()), ..Default::default() },
    );

    let follow = fx
        .engine
        .run(&mut thread, &completion.key, &StreamHandlers::none())
        .await
        .unwrap()
        .expect("follow-up created");

    // The action call and its result were recorded on the turn.
    let stored = fx.completions.get(&completion.key).unwrap();
    let action = stored.action_call.expect("action recorded");
    assert_eq!(action.action_key, "lookup_context");
    let result_key = action.result.unwrap();
    let result_key = result_key.as_str().unwrap();

    // The follow-up carries the action's context forward.
    let follow_completion = fx.completions.get(&follow).unwrap();
    assert_eq!(follow_completion.context_key.as_deref(), Some(result_key));
    let context = fx.contexts.get(result_key).unwrap();
    assert!(context.context_items.contains_key("Note.md"));

    // The request offered the lookup tool.
    let request = fx.invoker.last_request().unwrap();
    let tools = request.options.tools.unwrap();
    assert!(tools.iter().any(|t| t.name() == "lookup_context"));

    assert_eq!(thread.completion_keys().last().map(String::as_str), Some(follow.as_str()));
}

#[tokio::test]
async fn historical_completions_do_not_auto_continue() {
    let fx = fixture(vec![ScriptedTurn::Events(vec![
        StreamEvent::ToolCall {
            index: 0,
            id: Some("call_1".into()),
            name: Some("lookup_context".into()),
            arguments: Some(r#"{"hypothetical_1":"a","hypothetical_2":"b"}"#.into()),
        },
        StreamEvent::Done { finish_reason: Some("tool_calls".into()) },
    ])])
    .await;
    let mut thread = Thread::new("t1");
    let old = fx.engine.new_completion(&mut thread, CompletionSeed::default());
    let newer = fx.engine.new_completion(&mut thread, CompletionSeed::default());

    let follow = fx
        .engine
        .run(&mut thread, &old.key, &StreamHandlers::none())
        .await
        .unwrap();

    assert_eq!(follow, None, "only the most recent turn auto-continues");
    assert_eq!(thread.completion_keys(), vec![old.key, newer.key]);
}

#[tokio::test]
async fn self_referential_send_preseeds_a_lookup_only_against_an_empty_context() {
    let fx = fixture(vec![]).await;
    let mut thread = Thread::new("t1");

    let completion = fx
        .engine
        .send_user_message(&mut thread, "summarize my notes on Rust", None)
        .expect("turn created");
    let action = completion.action_call.expect("lookup pre-seeded");
    assert_eq!(action.action_key, "lookup_context");
    assert_eq!(completion.state, CompletionState::ToolPending);

    // A context the user filled by hand suppresses the automatic lookup.
    let mut thread2 = Thread::new("t2");
    fx.engine
        .attach_items_to_current_context(&mut thread2, &["Pinned.md".to_string()])
        .await
        .expect("context attached");
    let completion = fx
        .engine
        .send_user_message(&mut thread2, "summarize my notes on Rust", None)
        .expect("turn updated");
    assert!(completion.action_call.is_none());

    // Unremarkable messages never trigger a lookup.
    let mut thread3 = Thread::new("t3");
    let completion = fx
        .engine
        .send_user_message(&mut thread3, "explain lifetimes", None)
        .expect("turn created");
    assert!(completion.action_call.is_none());
}

#[tokio::test]
async fn attaching_paths_is_idempotent() {
    let fx = fixture(vec![]).await;
    let mut thread = Thread::new("t1");

    let ctx = fx
        .engine
        .attach_items_to_current_context(&mut thread, &["A.md".to_string(), "B.md".to_string()])
        .await
        .unwrap();
    let ctx = fx
        .engine
        .attach_items_to_current_context(&mut thread, &["B.md".to_string(), "C.md".to_string()])
        .await
        .unwrap_or(ctx);

    assert_eq!(ctx.member_keys(), vec!["A.md", "B.md", "C.md"]);
}

#[tokio::test]
async fn running_a_missing_completion_is_a_recoverable_no_op() {
    let fx = fixture(vec![]).await;
    let mut thread = Thread::new("t1");

    let follow = fx
        .engine
        .run(&mut thread, "t1-0", &StreamHandlers::none())
        .await
        .unwrap();
    assert_eq!(follow, None);
}
