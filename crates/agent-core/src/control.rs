//! Control Loop
//!
//! The tool-calling state machine for one user turn:
//!
//! ```text
//! AwaitingUserInput ──user msg──▶ Reasoning ──FinalAnswer──▶ AwaitingUserInput
//!                                   ▲   │
//!                                   │   └──ToolCalls──▶ DispatchingTools
//!                                   └──────all results appended──┘
//! ```
//!
//! The conversation is checkpointed after every iteration and before any
//! fatal error is returned, so a failed turn keeps everything appended up
//! to the failure.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{AgentError, Result};
use crate::executor::ToolExecutor;
use crate::message::{Conversation, Message};
use crate::prompt::PromptSource;
use crate::provider::{GenerationOptions, LlmProvider};
use crate::reasoning::{ReasoningOutcome, ReasoningStep};
use crate::session::{MemoryCheckpoint, SessionCheckpoint, SessionId};
use crate::tool::{ToolCall, ToolRegistry};

/// Where a turn currently is
#[derive(Clone, Debug, PartialEq)]
pub enum LoopState {
    AwaitingUserInput,
    Reasoning,
    DispatchingTools(Vec<ToolCall>),
}

impl LoopState {
    fn name(&self) -> &'static str {
        match self {
            LoopState::AwaitingUserInput => "awaiting_user_input",
            LoopState::Reasoning => "reasoning",
            LoopState::DispatchingTools(_) => "dispatching_tools",
        }
    }
}

/// Loop limits and retry policy
#[derive(Clone, Debug)]
pub struct LoopConfig {
    /// Tool rounds allowed per user turn before `ReasoningLoopExceeded`
    pub max_iterations: usize,

    /// Extra attempts for retryable backend errors
    pub backend_retries: u32,

    /// Delay before retry `n` is `retry_backoff * n`
    pub retry_backoff: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            backend_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Use the available tools when they help answer the user, then reply concisely.";

/// Orchestrates reasoning and tool dispatch for any number of sessions.
///
/// Turns for different sessions may run concurrently; turns for the same
/// session are serialized.
pub struct ControlLoop {
    reasoning: ReasoningStep,
    executor: ToolExecutor,
    checkpoint: Arc<dyn SessionCheckpoint>,
    config: LoopConfig,
    session_locks: Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ControlLoop {
    pub fn builder() -> ControlLoopBuilder {
        ControlLoopBuilder::new()
    }

    pub fn new(
        reasoning: ReasoningStep,
        executor: ToolExecutor,
        checkpoint: Arc<dyn SessionCheckpoint>,
        config: LoopConfig,
    ) -> Self {
        Self {
            reasoning,
            executor,
            checkpoint,
            config,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Run one user turn on a session and return the final answer.
    pub async fn run_turn(&self, session: &SessionId, input: &str) -> Result<String> {
        let lock = self.session_lock(session)?;
        let outcome = {
            let _guard = lock.lock().await;
            self.turn(session, input).await
        };
        drop(lock);
        self.release_session_lock(session);
        outcome
    }

    async fn turn(&self, session: &SessionId, input: &str) -> Result<String> {
        let mut conversation = self.checkpoint.load(session)?.unwrap_or_default();
        tracing::debug!(session = %session, history = conversation.len(), "Starting turn");

        conversation.push(Message::user(input))?;

        let outcome = self.drive(session, &mut conversation).await;
        if let Err(e) = &outcome {
            tracing::error!(session = %session, error = %e, "Turn aborted");
            if let Err(save_err) = self.checkpoint.save(session, &conversation) {
                tracing::error!(session = %session, error = %save_err, "Failed to checkpoint aborted turn");
            }
        }
        outcome
    }

    /// Current conversation for a session (empty if never used)
    pub fn history(&self, session: &SessionId) -> Result<Conversation> {
        Ok(self.checkpoint.load(session)?.unwrap_or_default())
    }

    /// Sessions with a checkpoint, most recently updated first
    pub fn sessions(&self) -> Result<Vec<SessionId>> {
        self.checkpoint.list()
    }

    pub fn tools(&self) -> &ToolRegistry {
        self.executor.registry()
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn system_prompt(&self) -> &str {
        self.reasoning.system_prompt()
    }

    async fn drive(&self, session: &SessionId, conversation: &mut Conversation) -> Result<String> {
        let mut state = LoopState::Reasoning;
        let mut rounds = 0;
        let mut answer = String::new();

        loop {
            tracing::debug!(session = %session, state = state.name(), "Loop transition");

            state = match state {
                LoopState::AwaitingUserInput => return Ok(answer),

                LoopState::Reasoning => match self.infer_with_retry(conversation).await? {
                    ReasoningOutcome::FinalAnswer(text) => {
                        conversation.push(Message::assistant(text.clone()))?;
                        self.checkpoint.save(session, conversation)?;
                        answer = text;
                        LoopState::AwaitingUserInput
                    }
                    ReasoningOutcome::ToolCalls { content, calls } => {
                        if rounds >= self.config.max_iterations {
                            return Err(AgentError::ReasoningLoopExceeded(self.config.max_iterations));
                        }
                        rounds += 1;

                        conversation.push(Message::assistant_tool_calls(content, calls.clone()))?;
                        self.checkpoint.save(session, conversation)?;
                        LoopState::DispatchingTools(calls)
                    }
                },

                LoopState::DispatchingTools(calls) => {
                    for result in self.executor.execute_all(&calls).await {
                        conversation.push(Message::tool(&result))?;
                    }
                    self.checkpoint.save(session, conversation)?;
                    LoopState::Reasoning
                }
            };
        }
    }

    async fn infer_with_retry(&self, conversation: &Conversation) -> Result<ReasoningOutcome> {
        let mut attempt = 0;
        loop {
            match self.reasoning.infer(conversation).await {
                Err(e) if e.is_retryable() && attempt < self.config.backend_retries => {
                    attempt += 1;
                    let delay = self.config.retry_backoff * attempt;
                    tracing::warn!(error = %e, attempt, ?delay, "Retrying model call");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    fn session_lock(&self, session: &SessionId) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .session_locks
            .lock()
            .map_err(|_| AgentError::Session("session lock table poisoned".into()))?;
        Ok(locks.entry(session.clone()).or_default().clone())
    }

    /// Drop the session's lock once no turn holds or waits on it
    fn release_session_lock(&self, session: &SessionId) {
        let Ok(mut locks) = self.session_locks.lock() else {
            return;
        };
        if locks.get(session).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(session);
        }
    }
}

/// Builder for `ControlLoop`
pub struct ControlLoopBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    generation: GenerationOptions,
    checkpoint: Option<Arc<dyn SessionCheckpoint>>,
    config: LoopConfig,
}

impl Default for ControlLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlLoopBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: Arc::new(ToolRegistry::new()),
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            generation: GenerationOptions::default(),
            checkpoint: None,
            config: LoopConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Fetch the system prompt once from an external source
    pub async fn system_prompt_from(mut self, source: &dyn PromptSource, name: &str) -> Result<Self> {
        self.system_prompt = source.fetch_prompt(name).await?;
        Ok(self)
    }

    pub fn generation(mut self, options: GenerationOptions) -> Self {
        self.generation = options;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.generation.model = model.into();
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.generation.temperature = temp;
        self
    }

    pub fn checkpoint(mut self, checkpoint: Arc<dyn SessionCheckpoint>) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn backend_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.config.backend_retries = retries;
        self.config.retry_backoff = backoff;
        self
    }

    pub fn build(self) -> Result<ControlLoop> {
        let provider = self.provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        if self.config.max_iterations == 0 {
            return Err(AgentError::Config("max_iterations must be at least 1".into()));
        }

        let reasoning = ReasoningStep::new(provider, &self.tools, self.system_prompt, self.generation);
        let checkpoint = self
            .checkpoint
            .unwrap_or_else(|| Arc::new(MemoryCheckpoint::new()));

        Ok(ControlLoop::new(
            reasoning,
            ToolExecutor::new(self.tools),
            checkpoint,
            self.config,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use crate::provider::{Completion, ModelInfo, ProviderInfo};
    use crate::tool::{ParameterSchema, Tool, ToolResult, ToolSchema};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use tokio::sync::Notify;

    /// Plays back scripted replies; repeats `fallback` once the script runs out
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<Completion>>>,
        fallback: Option<Completion>,
        requests: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<Completion>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                fallback: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn looping(reply: Completion) -> Self {
            Self {
                replies: Mutex::new(VecDeque::new()),
                fallback: Some(reply),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<Vec<Message>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn info(&self) -> Result<ProviderInfo> {
            Ok(ProviderInfo {
                name: "scripted".into(),
                version: None,
                models: Vec::new(),
                supports_tools: true,
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            messages: &[Message],
            _tools: &[ToolSchema],
            _options: &GenerationOptions,
        ) -> Result<Completion> {
            self.requests.lock().unwrap().push(messages.to_vec());
            let next = self.replies.lock().unwrap().pop_front();
            match next {
                Some(reply) => reply,
                None => self
                    .fallback
                    .clone()
                    .ok_or_else(|| AgentError::Provider("script exhausted".into())),
            }
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }

        fn supports_tools(&self) -> bool {
            true
        }
    }

    struct GetClientTool;

    #[async_trait]
    impl Tool for GetClientTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "get_client".into(),
                description: "Fetch a client by id".into(),
                parameters: vec![ParameterSchema::required("id", "integer", "Client id")],
                category: None,
                has_side_effects: false,
            }
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
            match call.argument("id").and_then(Value::as_i64) {
                Some(1) => Ok(ToolResult::success("get_client", r#"{"id":1,"name":"Ana","email":"ana@example.com"}"#)),
                Some(500) => Err(AgentError::ToolExecution("server error".into())),
                _ => Ok(ToolResult::failure("get_client", "Client not found")),
            }
        }
    }

    fn tools() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(GetClientTool).unwrap();
        Arc::new(registry)
    }

    fn calls(ids: &[(&str, i64)]) -> Completion {
        Completion::text("", "scripted").with_tool_calls(
            ids.iter()
                .map(|(id, client)| ToolCall::new("get_client", json!({"id": client})).with_id(*id))
                .collect(),
        )
    }

    fn build(provider: Arc<ScriptedProvider>, max_iterations: usize) -> ControlLoop {
        ControlLoop::builder()
            .provider(provider)
            .tools(tools())
            .system_prompt("You manage clients.")
            .max_iterations(max_iterations)
            .backend_retries(1, Duration::ZERO)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_final_answer_skips_dispatch() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(Completion::text("Hello!", "scripted"))]));
        let agent = build(provider.clone(), 3);
        let session = SessionId::new();

        let answer = agent.run_turn(&session, "hi").await.unwrap();
        assert_eq!(answer, "Hello!");

        let history = agent.history(&session).unwrap();
        let roles: Vec<_> = history.messages().iter().map(|m| m.role.clone()).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
        assert_eq!(provider.requests().len(), 1);
        assert_eq!(provider.requests()[0][0].role, Role::System);
    }

    #[tokio::test]
    async fn test_every_call_answered_before_next_inference() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(calls(&[("c1", 1), ("c2", 500), ("c3", 9)])),
            Ok(Completion::text("Client 1 is Ana.", "scripted")),
        ]));
        let agent = build(provider.clone(), 3);
        let session = SessionId::from_string("1234");

        let answer = agent.run_turn(&session, "show clients 1, 500 and 9").await.unwrap();
        assert_eq!(answer, "Client 1 is Ana.");

        // Second inference saw system + user + assistant + 3 tool results
        let second = &provider.requests()[1];
        assert_eq!(second.len(), 6);
        let ids: Vec<_> = second[3..]
            .iter()
            .map(|m| m.tool_call_id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert!(second[4].content.contains("server error"));
        assert!(second[5].content.contains("Client not found"));

        let history = agent.history(&session).unwrap();
        assert_eq!(history.len(), 6);
        assert!(history.pending_tool_call_ids().is_empty());
    }

    #[tokio::test]
    async fn test_loop_cap_is_fatal_and_keeps_history() {
        let provider = Arc::new(ScriptedProvider::looping(calls(&[("again", 1)])));
        let agent = build(provider.clone(), 2);
        let session = SessionId::new();

        let err = agent.run_turn(&session, "loop forever").await.unwrap_err();
        assert!(matches!(err, AgentError::ReasoningLoopExceeded(2)));

        // user, (assistant, tool) x 2 - the third request was never appended
        let history = agent.history(&session).unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history.last().unwrap().role, Role::Tool);
        assert!(history.pending_tool_call_ids().is_empty());
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_backend_error_aborts_turn_but_keeps_input() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(AgentError::Auth("invalid api key".into())),
            Ok(Completion::text("Back again.", "scripted")),
        ]));
        let agent = build(provider.clone(), 3);
        let session = SessionId::new();

        let err = agent.run_turn(&session, "first").await.unwrap_err();
        assert!(err.is_backend_error());
        assert_eq!(agent.history(&session).unwrap().len(), 1);

        // The session is usable again on the next turn
        let answer = agent.run_turn(&session, "second").await.unwrap();
        assert_eq!(answer, "Back again.");
        assert_eq!(agent.history(&session).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_retryable_error_is_retried() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(AgentError::ProviderUnavailable("503".into())),
            Ok(Completion::text("ok", "scripted")),
        ]));
        let agent = build(provider.clone(), 3);

        let answer = agent.run_turn(&SessionId::new(), "hi").await.unwrap();
        assert_eq!(answer, "ok");
        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_sessions_resume_by_key() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(Completion::text("Nice to meet you, Ana.", "scripted")),
            Ok(Completion::text("Your name is Ana.", "scripted")),
            Ok(Completion::text("I don't know yet.", "scripted")),
        ]));
        let agent = build(provider.clone(), 3);
        let thread = SessionId::from_string("1234");

        agent.run_turn(&thread, "I'm Ana").await.unwrap();
        agent.run_turn(&thread, "what's my name?").await.unwrap();
        agent.run_turn(&SessionId::new(), "what's my name?").await.unwrap();

        let requests = provider.requests();
        // system + 3 messages of history + new input
        assert_eq!(requests[1].len(), 4);
        assert_eq!(requests[1][1].content, "I'm Ana");
        // A fresh key starts from an empty conversation
        assert_eq!(requests[2].len(), 2);
    }

    #[test]
    fn test_builder_requires_provider() {
        assert!(ControlLoop::builder().build().is_err());
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        assert!(ControlLoop::builder().provider(provider).max_iterations(0).build().is_err());
    }

    /// Holds every inference until released, then echoes the last user message
    struct GatedProvider {
        gate: Notify,
        requests: Mutex<Vec<Vec<Message>>>,
    }

    impl GatedProvider {
        fn new() -> Self {
            Self {
                gate: Notify::new(),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<Vec<Message>> {
            self.requests.lock().unwrap().clone()
        }

        async fn wait_for_requests(&self, count: usize) {
            tokio::time::timeout(Duration::from_secs(5), async {
                while self.requests.lock().unwrap().len() < count {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .expect("provider never reached the expected number of requests");
        }

        fn release(&self) {
            self.gate.notify_waiters();
        }
    }

    #[async_trait]
    impl LlmProvider for GatedProvider {
        async fn info(&self) -> Result<ProviderInfo> {
            Ok(ProviderInfo {
                name: "gated".into(),
                version: None,
                models: Vec::new(),
                supports_tools: true,
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            messages: &[Message],
            _tools: &[ToolSchema],
            _options: &GenerationOptions,
        ) -> Result<Completion> {
            let released = self.gate.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            self.requests.lock().unwrap().push(messages.to_vec());
            released.await;

            let input = messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(Completion::text(format!("echo: {}", input), "gated"))
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }

        fn supports_tools(&self) -> bool {
            true
        }
    }

    fn gated(provider: Arc<GatedProvider>) -> Arc<ControlLoop> {
        Arc::new(
            ControlLoop::builder()
                .provider(provider)
                .tools(tools())
                .build()
                .unwrap(),
        )
    }

    fn contents(agent: &ControlLoop, session: &SessionId) -> Vec<(Role, String)> {
        agent
            .history(session)
            .unwrap()
            .messages()
            .iter()
            .map(|m| (m.role.clone(), m.content.clone()))
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_distinct_sessions_run_concurrently_without_interleaving() {
        let provider = Arc::new(GatedProvider::new());
        let agent = gated(provider.clone());
        let (a, b) = (SessionId::from_string("a"), SessionId::from_string("b"));

        let first = tokio::spawn({
            let (agent, a) = (agent.clone(), a.clone());
            async move { agent.run_turn(&a, "from a").await }
        });
        let second = tokio::spawn({
            let (agent, b) = (agent.clone(), b.clone());
            async move { agent.run_turn(&b, "from b").await }
        });

        // Both turns are inside the provider at the same time
        provider.wait_for_requests(2).await;
        provider.release();

        assert_eq!(first.await.unwrap().unwrap(), "echo: from a");
        assert_eq!(second.await.unwrap().unwrap(), "echo: from b");

        assert_eq!(
            contents(&agent, &a),
            vec![(Role::User, "from a".to_string()), (Role::Assistant, "echo: from a".to_string())]
        );
        assert_eq!(
            contents(&agent, &b),
            vec![(Role::User, "from b".to_string()), (Role::Assistant, "echo: from b".to_string())]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_same_session_turns_are_serialized() {
        let provider = Arc::new(GatedProvider::new());
        let agent = gated(provider.clone());
        let session = SessionId::from_string("shared");

        let first = tokio::spawn({
            let (agent, session) = (agent.clone(), session.clone());
            async move { agent.run_turn(&session, "first").await }
        });
        provider.wait_for_requests(1).await;

        let second = tokio::spawn({
            let (agent, session) = (agent.clone(), session.clone());
            async move { agent.run_turn(&session, "second").await }
        });

        // The second turn waits on the session, not on the provider
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(provider.requests().len(), 1);

        provider.release();
        assert_eq!(first.await.unwrap().unwrap(), "echo: first");

        provider.wait_for_requests(2).await;
        provider.release();
        assert_eq!(second.await.unwrap().unwrap(), "echo: second");

        let seen: Vec<_> = provider.requests()[1][1..]
            .iter()
            .map(|m| (m.role.clone(), m.content.clone()))
            .collect();
        assert_eq!(
            seen,
            vec![
                (Role::User, "first".to_string()),
                (Role::Assistant, "echo: first".to_string()),
                (Role::User, "second".to_string()),
            ]
        );
        assert_eq!(contents(&agent, &session).len(), 4);
    }

    #[tokio::test]
    async fn test_session_locks_released_after_turns() {
        let provider = Arc::new(ScriptedProvider::looping(Completion::text("ok", "scripted")));
        let agent = build(provider, 3);

        agent.run_turn(&SessionId::from_string("one"), "hi").await.unwrap();
        agent.run_turn(&SessionId::from_string("two"), "hi").await.unwrap();

        assert!(agent.session_locks.lock().unwrap().is_empty());
        assert_eq!(agent.sessions().unwrap().len(), 2);
    }

    /// Loads nothing and refuses every save
    struct ReadOnlyCheckpoint;

    impl SessionCheckpoint for ReadOnlyCheckpoint {
        fn save(&self, _id: &SessionId, _conversation: &Conversation) -> Result<()> {
            Err(AgentError::Session("disk full".into()))
        }

        fn load(&self, _id: &SessionId) -> Result<Option<Conversation>> {
            Ok(None)
        }

        fn list(&self) -> Result<Vec<SessionId>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_failed_checkpoint_keeps_original_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(AgentError::Auth("invalid api key".into()))]));
        let agent = ControlLoop::builder()
            .provider(provider)
            .tools(tools())
            .checkpoint(Arc::new(ReadOnlyCheckpoint))
            .build()
            .unwrap();

        let err = agent.run_turn(&SessionId::new(), "hi").await.unwrap_err();
        assert!(matches!(err, AgentError::Auth(_)));
    }
}
