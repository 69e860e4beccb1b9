use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use futures::StreamExt;
use plait_actions::{ActionRegistry, LOOKUP_ACTION_KEY};
use plait_context::{Context, ContextEntry, ContextStore};
use plait_llm::{
    replay_response, CompletionRequest, ModelInvoker, ModelSelection, RequestOptions, StreamEvent,
    ToolCallAccumulator, ToolChoice,
};
use plait_store::{NullPersister, Persister, SaveQueue};
use serde_json::json;
use tokio::sync::Mutex;

use crate::completion::{ActionCall, Completion, CompletionState, CompletionStore};
use crate::folder_tree::FolderTreeSource;
use crate::request::{build_request_messages, ContextRenderer, KeyListRenderer};
use crate::thread::Thread;

pub type CompletionCallback = Arc<dyn Fn(&Completion) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// View-layer callbacks fired as a completion streams. All optional; the
/// engine serializes chunk/done bodies per completion, so handlers never
/// observe interleaved partial text.
#[derive(Clone, Default)]
pub struct StreamHandlers {
    pub chunk: Option<CompletionCallback>,
    pub done: Option<CompletionCallback>,
    pub error: Option<ErrorCallback>,
}

impl StreamHandlers {
    pub fn none() -> Self {
        Self::default()
    }

    fn emit_chunk(&self, completion: &Completion) {
        if let Some(chunk) = &self.chunk {
            chunk(completion);
        }
    }

    fn emit_done(&self, completion: &Completion) {
        if let Some(done) = &self.done {
            done(completion);
        }
    }

    fn emit_error(&self, message: &str) {
        if let Some(error) = &self.error {
            error(message);
        }
    }
}

/// Caller-supplied parts of a new completion. Everything absent is
/// inherited: the context key from the previous turn, the model from the
/// engine default, the stream flag from the thread settings.
#[derive(Debug, Clone, Default)]
pub struct CompletionSeed {
    pub user_message: Option<String>,
    pub system_message: Option<String>,
    pub context_key: Option<String>,
    pub action_call: Option<ActionCall>,
    pub model: Option<ModelSelection>,
}

/// Drives completions through their lifecycle: construction with
/// inheritance, request building, streaming with a per-completion
/// single-flight guard, tool-call resolution with auto follow-up, and
/// persistence queueing. All collaborators are injected.
pub struct CompletionEngine {
    invoker: Arc<dyn ModelInvoker>,
    actions: Arc<ActionRegistry>,
    contexts: Arc<ContextStore>,
    completions: Arc<CompletionStore>,
    persister: Arc<dyn Persister>,
    folder_source: Option<Arc<dyn FolderTreeSource>>,
    renderer: Arc<dyn ContextRenderer>,
    default_model: ModelSelection,
    thread_saves: SaveQueue,
    guards: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CompletionEngine {
    pub fn new(
        invoker: Arc<dyn ModelInvoker>,
        actions: Arc<ActionRegistry>,
        contexts: Arc<ContextStore>,
        completions: Arc<CompletionStore>,
    ) -> Self {
        Self {
            invoker,
            actions,
            contexts,
            completions,
            persister: Arc::new(NullPersister),
            folder_source: None,
            renderer: Arc::new(KeyListRenderer),
            default_model: ModelSelection::default(),
            thread_saves: SaveQueue::new(),
            guards: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_persister(mut self, persister: Arc<dyn Persister>) -> Self {
        self.persister = persister;
        self
    }

    pub fn with_folder_source(mut self, source: Arc<dyn FolderTreeSource>) -> Self {
        self.folder_source = Some(source);
        self
    }

    pub fn with_context_renderer(mut self, renderer: Arc<dyn ContextRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_default_model(mut self, model: ModelSelection) -> Self {
        self.default_model = model;
        self
    }

    pub fn completion_store(&self) -> &CompletionStore {
        &self.completions
    }

    pub fn context_store(&self) -> &ContextStore {
        &self.contexts
    }

    /// Start a new turn at the end of the thread's active path.
    pub fn new_completion(&self, thread: &mut Thread, seed: CompletionSeed) -> Completion {
        self.supersede_streaming(thread);
        let completion = self.prepare_completion(thread, seed);
        self.completions.set(completion.clone());
        self.completions.queue_save(&completion.key);
        thread.tree.append(&completion.key);
        thread.set_current_completion(Some(completion.key.clone()));
        self.thread_saves.queue(&thread.key);
        completion
    }

    /// Start a variant turn alongside `sibling_key`. Returns `None` when
    /// the sibling is unknown (stale reference from a reentrant caller).
    pub fn new_variant(
        &self,
        thread: &mut Thread,
        sibling_key: &str,
        seed: CompletionSeed,
    ) -> Option<Completion> {
        if !thread.tree.contains(sibling_key) {
            tracing::debug!(sibling = sibling_key, "variant sibling not found; nothing created");
            return None;
        }
        self.supersede_streaming(thread);
        let completion = self.prepare_completion(thread, seed);
        self.completions.set(completion.clone());
        self.completions.queue_save(&completion.key);
        thread.tree.branch(&completion.key, sibling_key);
        thread.set_current_completion(Some(completion.key.clone()));
        self.thread_saves.queue(&thread.key);
        Some(completion)
    }

    /// Attach the user's message to the current turn, creating one when
    /// absent. When self-referential detection fires and the current
    /// context is still empty, a lookup action is pre-seeded so the model
    /// retrieves the user's material before answering.
    pub fn send_user_message(
        &self,
        thread: &mut Thread,
        text: &str,
        extra_system: Option<&str>,
    ) -> Option<Completion> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let current = match thread.current_completion(&self.completions) {
            Some(completion) => completion,
            None => self.new_completion(thread, CompletionSeed::default()),
        };

        let system_message = extra_system
            .filter(|s| !s.trim().is_empty())
            .map(|s| thread.system_prompt(Some(s), self.folder_source.as_deref()));

        let mut action_call = None;
        if thread.has_self_referential_pronoun(text) && thread.settings.use_tool_calls {
            // A context the user already filled by hand makes a lookup
            // redundant; only pre-seed against an empty one.
            let has_manual_context = current
                .context_key
                .as_deref()
                .and_then(|key| self.contexts.get(key))
                .map(|context| !context.is_empty())
                .unwrap_or(false);
            if !has_manual_context {
                action_call = Some(ActionCall::new(
                    LOOKUP_ACTION_KEY,
                    json!({ "context_key": current.context_key }),
                ));
            }
        }

        let updated = self.completions.update(&current.key, |completion| {
            completion.user_message = Some(text.to_string());
            if let Some(system) = system_message.clone() {
                completion.system_message = Some(system);
            }
            if let Some(action) = action_call.clone() {
                completion.action_call = Some(action);
                completion.state = CompletionState::ToolPending;
            }
        });
        if updated.is_some() {
            self.completions.queue_save(&current.key);
        }
        updated
    }

    /// Build the model request for a completion: prior turns in thread
    /// order, deduplicated, then this turn's own messages, plus tool
    /// wiring (forced for a pre-seeded action, auto otherwise).
    pub async fn build_request(
        &self,
        thread: &Thread,
        completion_key: &str,
    ) -> Option<CompletionRequest> {
        let Some(completion) = self.completions.get(completion_key) else {
            tracing::warn!(key = completion_key, "completion not found; no request built");
            return None;
        };

        let messages = build_request_messages(
            thread,
            &completion,
            &self.completions,
            &self.contexts,
            self.renderer.as_ref(),
            self.folder_source.as_deref(),
        );

        let mut options = RequestOptions::new();
        if let Some(action) = &completion.action_call {
            if let Some(tool) = self.actions.tool_for(&action.action_key).await {
                options = options
                    .tools(vec![tool])
                    .tool_choice(ToolChoice::force(action.action_key.clone()));
            }
        } else if thread.settings.use_tool_calls {
            let tools = self.actions.tools().await;
            if !tools.is_empty() {
                options = options.tools(tools).tool_choice(ToolChoice::auto());
            }
        }

        self.completions
            .update(completion_key, |c| c.state = CompletionState::RequestBuilt);
        Some(CompletionRequest::new(completion.model.clone(), messages).with_options(options))
    }

    /// Run a completion through the model and back.
    ///
    /// Streams (or replays a non-streaming response through the same
    /// pipeline), accumulates chunks and tool-call deltas, resolves a
    /// resulting action, and — for the thread's most recent turn only —
    /// creates the follow-up completion carrying the action's context key.
    /// Returns the follow-up key when one was created.
    ///
    /// Stream failures leave the completion in `Errored`, which a later
    /// `run` call retries from a clean accumulator. They are never
    /// propagated as hard faults.
    pub async fn run(
        &self,
        thread: &mut Thread,
        completion_key: &str,
        handlers: &StreamHandlers,
    ) -> Result<Option<String>> {
        let Some(completion) = self.completions.get(completion_key) else {
            tracing::warn!(key = completion_key, "completion not found; nothing to run");
            return Ok(None);
        };
        match completion.state {
            CompletionState::Done | CompletionState::Streaming => return Ok(None),
            CompletionState::Errored => {
                self.completions.update(completion_key, Completion::clear_partial);
            }
            _ => {}
        }

        let Some(request) = self.build_request(thread, completion_key).await else {
            return Ok(None);
        };

        self.completions
            .update(completion_key, |c| c.state = CompletionState::Streaming);

        let stream_result = if completion.stream {
            self.invoker.complete_stream(request).await
        } else {
            self.invoker.complete(request).await.map(replay_response)
        };
        let mut stream = match stream_result {
            Ok(stream) => stream,
            Err(e) => {
                self.fail_stream(completion_key, handlers, &e.to_string()).await;
                return Ok(None);
            }
        };

        let mut tool_calls = ToolCallAccumulator::new();
        let mut finish_reason = None;
        while let Some(event) = stream.next().await {
            match event {
                Ok(StreamEvent::Message { content }) => {
                    self.handle_chunk(completion_key, &content, handlers).await;
                }
                Ok(StreamEvent::ToolCall { index, id, name, arguments }) => {
                    tool_calls.push(index, id, name, arguments);
                }
                Ok(StreamEvent::Done { finish_reason: reason }) => {
                    finish_reason = reason;
                    break;
                }
                Err(e) => {
                    self.fail_stream(completion_key, handlers, &e.to_string()).await;
                    return Ok(None);
                }
            }
        }

        self.handle_done(thread, completion_key, tool_calls, finish_reason, handlers)
            .await
    }

    /// Idempotently add vault paths to the current turn's context,
    /// creating the turn and/or context as needed. Every path ends up
    /// present exactly once, at depth 0.
    pub async fn attach_items_to_current_context(
        &self,
        thread: &mut Thread,
        paths: &[String],
    ) -> Option<Context> {
        if paths.is_empty() {
            return None;
        }
        let current = match thread.current_completion(&self.completions) {
            Some(completion) => completion,
            None => self.new_completion(thread, CompletionSeed::default()),
        };

        // Existing members are re-asserted at depth 0 alongside the new
        // paths; the merge collapses duplicates.
        let mut entries: Vec<ContextEntry> = current
            .context_key
            .as_deref()
            .and_then(|key| self.contexts.get(key))
            .map(|context| context.member_keys().into_iter().map(ContextEntry::new).collect())
            .unwrap_or_default();
        entries.extend(paths.iter().map(|path| ContextEntry::new(path.as_str())));

        let context = self.contexts.merge_into(current.context_key.as_deref(), &entries);
        self.completions
            .update(&current.key, |c| c.context_key = Some(context.key.clone()));
        self.completions.queue_save(&current.key);
        self.thread_saves.queue(&thread.key);
        if let Err(e) = self.contexts.process_save_queue(self.persister.as_ref()).await {
            tracing::error!(error = %e, "context save flush failed");
        }
        Some(context)
    }

    /// Point the current turn at a different context (or none).
    pub fn update_current_context(&self, thread: &Thread, context_key: Option<&str>) {
        if let Some(current) = thread.current_completion(&self.completions) {
            self.completions
                .update(&current.key, |c| c.context_key = context_key.map(str::to_string));
            self.completions.queue_save(&current.key);
        }
    }

    /// Flush all pending saves: threads, completions, contexts.
    /// Idempotent; safe to call redundantly.
    pub async fn process_save_queue(&self) -> plait_store::Result<usize> {
        let persister = self.persister.as_ref();
        let mut total = self.thread_saves.flush(persister).await?;
        total += self.completions.process_save_queue(persister).await?;
        total += self.contexts.process_save_queue(persister).await?;
        Ok(total)
    }

    fn prepare_completion(&self, thread: &Thread, seed: CompletionSeed) -> Completion {
        let key = self.next_completion_key(&thread.key);
        let mut completion = Completion::new(key, thread.key.clone());
        completion.stream = thread.settings.stream;
        completion.model = seed.model.unwrap_or_else(|| self.default_model.clone());
        completion.user_message = seed.user_message;

        // The thread's default system prompt attaches once, to the turn
        // that opens the thread (or the first turn after the prompt was
        // configured).
        let first_has_system = thread
            .completion_keys()
            .first()
            .and_then(|key| self.completions.get(key))
            .map(|c| c.system_message.is_some())
            .unwrap_or(false);
        if thread.has_default_system_prompt() && !first_has_system {
            completion.system_message = Some(
                thread.system_prompt(seed.system_message.as_deref(), self.folder_source.as_deref()),
            );
        } else {
            completion.system_message = seed.system_message;
        }

        // Context persists across turns without being re-specified.
        completion.context_key = seed
            .context_key
            .or_else(|| thread.last_completion(&self.completions).and_then(|c| c.context_key))
            .or_else(|| Some(self.contexts.new_context(None).key));

        if let Some(action) = seed.action_call {
            completion.action_call = Some(action);
            completion.state = CompletionState::ToolPending;
        }
        completion
    }

    /// Keys are `{thread_key}-{millis}`; a same-millisecond collision
    /// bumps the timestamp until the key is free.
    fn next_completion_key(&self, thread_key: &str) -> String {
        let mut millis = Utc::now().timestamp_millis();
        loop {
            let key = format!("{thread_key}-{millis}");
            if !self.completions.contains(&key) {
                return key;
            }
            millis += 1;
        }
    }

    /// Creating a new turn orphans any still-streaming one: its late
    /// writes must land nowhere.
    fn supersede_streaming(&self, thread: &Thread) {
        for key in thread.completion_keys() {
            self.completions.update(&key, |c| {
                if c.state == CompletionState::Streaming {
                    c.superseded = true;
                }
            });
        }
    }

    async fn guard_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut guards = self.guards.lock().await;
        guards
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn handle_chunk(&self, key: &str, content: &str, handlers: &StreamHandlers) {
        let guard = self.guard_for(key).await;
        let _held = guard.lock().await;
        let mut discarded = false;
        let updated = self.completions.update(key, |completion| {
            if completion.superseded {
                discarded = true;
            } else {
                completion.responses.push(content.to_string());
            }
        });
        if discarded {
            tracing::debug!(key, "discarding chunk for superseded completion");
            return;
        }
        if let Some(completion) = updated {
            handlers.emit_chunk(&completion);
        }
    }

    async fn handle_done(
        &self,
        thread: &mut Thread,
        key: &str,
        tool_calls: ToolCallAccumulator,
        finish_reason: Option<String>,
        handlers: &StreamHandlers,
    ) -> Result<Option<String>> {
        let guard = self.guard_for(key).await;
        let finalized = {
            let _held = guard.lock().await;
            let mut discarded = false;
            let updated = self.completions.update(key, |completion| {
                if completion.superseded {
                    discarded = true;
                    return;
                }
                completion.response_text = completion.responses.concat();
                completion.state = CompletionState::Done;
            });
            if discarded {
                tracing::debug!(key, "discarding final write for superseded completion");
                return Ok(None);
            }
            updated
        };
        let Some(completion) = finalized else {
            return Ok(None);
        };
        tracing::debug!(key, ?finish_reason, "completion finished");

        self.completions.queue_save(key);
        self.thread_saves.queue(&thread.key);
        handlers.emit_done(&completion);

        if tool_calls.is_empty() {
            return Ok(None);
        }
        let Some(call) = tool_calls.finish().into_iter().next() else {
            return Ok(None);
        };

        let mut args = call.arguments_value().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "tool-call arguments were not valid JSON");
            json!({})
        });
        // Pre-seeded arguments (the carried context key) fill in whatever
        // the model did not supply itself.
        if let Some(pre) = completion.action_call.as_ref() {
            if let (Some(args_obj), Some(pre_obj)) = (args.as_object_mut(), pre.args.as_object()) {
                for (k, v) in pre_obj {
                    args_obj.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
        }

        let action_key = call.function.name.clone();
        self.completions.update(key, |c| {
            c.action_call = Some(ActionCall::new(action_key.as_str(), args.clone()));
        });

        let result = match self.actions.execute(&action_key, args).await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(action = %action_key, error = %e, "action execution failed");
                json!({"error": e.to_string()})
            }
        };
        self.completions.update(key, |c| {
            if let Some(action) = c.action_call.as_mut() {
                action.result = Some(result.clone());
            }
        });
        self.completions.queue_save(key);

        // Only the most recent turn may auto-continue; resolving an
        // action on a historical turn must not rewrite what followed it.
        if thread.completion_keys().last().map(String::as_str) != Some(key) {
            tracing::debug!(key, "action resolved on a historical completion; no follow-up");
            return Ok(None);
        }
        let Some(result_context_key) = result.as_str() else {
            // Validation errors come back as objects; they end the turn.
            return Ok(None);
        };

        let follow = self.new_completion(
            thread,
            CompletionSeed {
                context_key: Some(result_context_key.to_string()),
                ..Default::default()
            },
        );
        Ok(Some(follow.key))
    }

    async fn fail_stream(&self, key: &str, handlers: &StreamHandlers, message: &str) {
        tracing::error!(key, error = message, "stream failed; completion remains retryable");
        let guard = self.guard_for(key).await;
        let _held = guard.lock().await;
        self.completions
            .update(key, |c| c.state = CompletionState::Errored);
        handlers.emit_error(message);
    }
}
