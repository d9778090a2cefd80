//! RAG chat orchestration
//!
//! A [`ChatSession`] owns one backend, a bounded conversation history, and
//! borrowed handles to the store and embedder. Each turn retrieves vault
//! context for the user's message, sends the assembled prompt to the
//! backend, and hands back a [`Reply`] stream. The turn is committed to
//! history only once at least one fragment has actually arrived, so a
//! backend that fails before producing anything leaves history untouched.

pub mod backend;

pub use backend::{build_backend, ChatBackend, FragmentStream};

use crate::config::ChatConfig;
use crate::embed::Embedder;
use crate::error::{NotariumError, Result};
use crate::search::{format_context, search_context, ContextChunk};
use crate::store::VectorStore;
use futures::stream::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in backend wire order
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A completed user/assistant exchange
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub user: String,
    pub assistant: String,
    /// Chunk ids that informed the assistant reply
    pub context_ids: Vec<String>,
}

/// Bounded FIFO of completed turns. When full, the oldest turn is evicted;
/// the system prompt is rebuilt per request and never counts against the
/// bound.
#[derive(Debug)]
pub struct ConversationHistory {
    max_turns: usize,
    turns: VecDeque<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns,
            turns: VecDeque::new(),
        }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        if self.max_turns == 0 {
            return;
        }
        while self.turns.len() >= self.max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// Flatten retained turns into alternating user/assistant messages,
    /// oldest first.
    pub fn messages(&self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.turns.len() * 2);
        for turn in &self.turns {
            out.push(Message::user(turn.user.clone()));
            out.push(Message::assistant(turn.assistant.clone()));
        }
        out
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }
}

const RAG_SYSTEM_PROMPT: &str = "You are a helpful assistant with access to the user's personal \
note vault. Answer using the provided note excerpts when they are relevant, and say so when \
they do not cover the question. Mention which notes you drew on when it helps the user \
find them.";

const PLAIN_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Per-session behaviour knobs, frozen at construction
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub use_rag: bool,
    pub context_limit: usize,
    pub max_turns: usize,
}

impl ChatOptions {
    pub fn from_config(config: &ChatConfig, use_rag: bool) -> Self {
        Self {
            use_rag,
            context_limit: config.context_limit,
            max_turns: config.max_turns,
        }
    }
}

/// One interactive conversation over the vault
pub struct ChatSession<'a> {
    backend: Box<dyn ChatBackend>,
    store: &'a VectorStore,
    embedder: &'a dyn Embedder,
    options: ChatOptions,
    history: Arc<Mutex<ConversationHistory>>,
    last_context: Vec<ContextChunk>,
    closed: bool,
}

impl<'a> ChatSession<'a> {
    pub fn new(
        backend: Box<dyn ChatBackend>,
        store: &'a VectorStore,
        embedder: &'a dyn Embedder,
        options: ChatOptions,
    ) -> Self {
        let history = ConversationHistory::new(options.max_turns);
        Self {
            backend,
            store,
            embedder,
            options,
            history: Arc::new(Mutex::new(history)),
            last_context: Vec::new(),
            closed: false,
        }
    }

    /// Send one user message. Returns a [`Reply`] whose fragments must be
    /// consumed to see the answer; the turn enters history when the reply
    /// is dropped, provided at least one fragment arrived.
    pub async fn send(&mut self, user_input: &str) -> Result<Reply> {
        if self.closed {
            return Err(NotariumError::SessionClosed);
        }

        let (system, context_ids) = if self.options.use_rag {
            let context = search_context(
                self.store,
                self.embedder,
                user_input,
                self.options.context_limit,
            )
            .await?;
            let ids: Vec<String> = context.iter().map(ContextChunk::id).collect();
            let system = format!(
                "{}\n\nContext from the vault:\n\n{}",
                RAG_SYSTEM_PROMPT,
                format_context(&context)
            );
            self.last_context = context;
            (system, ids)
        } else {
            self.last_context.clear();
            (PLAIN_SYSTEM_PROMPT.to_string(), Vec::new())
        };

        let mut messages = lock_history(&self.history).messages();
        messages.push(Message::user(user_input));

        tracing::debug!(
            backend = self.backend.name(),
            context_chunks = context_ids.len(),
            "dispatching chat turn"
        );

        let stream = self.backend.send(&messages, Some(&system)).await?;

        Ok(Reply {
            stream,
            history: Arc::clone(&self.history),
            user: user_input.to_string(),
            context_ids,
            buffer: String::new(),
        })
    }

    /// Context retrieved for the most recent turn
    pub fn last_context(&self) -> &[ContextChunk] {
        &self.last_context
    }

    /// Drop all retained turns
    pub fn clear(&mut self) {
        lock_history(&self.history).clear();
        self.last_context.clear();
    }

    pub fn history_len(&self) -> usize {
        lock_history(&self.history).len()
    }

    /// Close the session; any later `send` fails with `SessionClosed`
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

fn lock_history(history: &Mutex<ConversationHistory>) -> std::sync::MutexGuard<'_, ConversationHistory> {
    match history.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Streaming assistant reply for one turn.
///
/// Accumulates fragments as they are polled; on drop, commits the turn to
/// the owning session's history if anything arrived. Dropping an
/// unconsumed or half-consumed reply therefore records exactly what the
/// user actually saw.
pub struct Reply {
    stream: FragmentStream,
    history: Arc<Mutex<ConversationHistory>>,
    user: String,
    context_ids: Vec<String>,
    buffer: String,
}

impl Reply {
    /// Drain the whole stream and return the assembled reply text
    pub async fn collect_text(mut self) -> Result<String> {
        while let Some(fragment) = self.next().await {
            fragment?;
        }
        Ok(self.buffer.clone())
    }
}

impl Stream for Reply {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.stream.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(fragment))) => {
                self.buffer.push_str(&fragment);
                Poll::Ready(Some(Ok(fragment)))
            }
            other => other,
        }
    }
}

impl Drop for Reply {
    fn drop(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        lock_history(&self.history).push(ConversationTurn {
            user: std::mem::take(&mut self.user),
            assistant: std::mem::take(&mut self.buffer),
            context_ids: std::mem::take(&mut self.context_ids),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::EmbedMode;
    use async_trait::async_trait;
    use futures::stream;

    struct MockBackend {
        replies: Mutex<VecDeque<Vec<Result<String>>>>,
    }

    impl MockBackend {
        fn scripted(replies: Vec<Vec<Result<String>>>) -> Box<Self> {
            Box::new(Self {
                replies: Mutex::new(replies.into()),
            })
        }

        fn failing() -> Box<Self> {
            Box::new(Self {
                replies: Mutex::new(VecDeque::new()),
            })
        }
    }

    #[async_trait]
    impl ChatBackend for MockBackend {
        async fn send(&self, _messages: &[Message], _system: Option<&str>) -> Result<FragmentStream> {
            let next = self.replies.lock().unwrap().pop_front();
            match next {
                Some(fragments) => Ok(stream::iter(fragments).boxed()),
                None => Err(NotariumError::BackendUnavailable("scripted outage".into())),
            }
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }

    struct NullEmbedder;

    #[async_trait]
    impl Embedder for NullEmbedder {
        async fn embed(&self, _mode: EmbedMode, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0; 4])
        }

        async fn embed_batch(&self, _mode: EmbedMode, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0; 4]).collect())
        }

        fn dimensions(&self) -> usize {
            4
        }

        fn model_name(&self) -> &str {
            "null"
        }
    }

    fn options(max_turns: usize) -> ChatOptions {
        ChatOptions {
            use_rag: false,
            context_limit: 5,
            max_turns,
        }
    }

    fn ok_reply(text: &str) -> Vec<Result<String>> {
        vec![Ok(text.to_string())]
    }

    #[tokio::test]
    async fn test_turn_commits_after_consumption() {
        let store = VectorStore::open_in_memory().unwrap();
        let embedder = NullEmbedder;
        let backend = MockBackend::scripted(vec![ok_reply("four")]);
        let mut session = ChatSession::new(backend, &store, &embedder, options(10));

        let reply = session.send("what is 2+2?").await.unwrap();
        let text = reply.collect_text().await.unwrap();
        assert_eq!(text, "four");
        assert_eq!(session.history_len(), 1);
    }

    #[tokio::test]
    async fn test_history_keeps_most_recent_turns_in_order() {
        let store = VectorStore::open_in_memory().unwrap();
        let embedder = NullEmbedder;
        let backend = MockBackend::scripted(vec![
            ok_reply("first"),
            ok_reply("second"),
            ok_reply("third"),
        ]);
        let mut session = ChatSession::new(backend, &store, &embedder, options(2));

        for question in ["q1", "q2", "q3"] {
            session.send(question).await.unwrap().collect_text().await.unwrap();
        }

        assert_eq!(session.history_len(), 2);
        let history = lock_history(&session.history);
        let users: Vec<&str> = history.turns().map(|t| t.user.as_str()).collect();
        assert_eq!(users, vec!["q2", "q3"]);
    }

    #[tokio::test]
    async fn test_dispatch_failure_leaves_history_unchanged() {
        let store = VectorStore::open_in_memory().unwrap();
        let embedder = NullEmbedder;
        let backend = MockBackend::failing();
        let mut session = ChatSession::new(backend, &store, &embedder, options(10));

        let err = session.send("hello").await.err().unwrap();
        assert!(matches!(err, NotariumError::BackendUnavailable(_)));
        assert_eq!(session.history_len(), 0);
    }

    #[tokio::test]
    async fn test_partially_consumed_reply_commits_partial_text() {
        let store = VectorStore::open_in_memory().unwrap();
        let embedder = NullEmbedder;
        let backend = MockBackend::scripted(vec![vec![
            Ok("partial ".to_string()),
            Ok("rest".to_string()),
        ]]);
        let mut session = ChatSession::new(backend, &store, &embedder, options(10));

        let mut reply = session.send("go").await.unwrap();
        let first = reply.next().await.unwrap().unwrap();
        assert_eq!(first, "partial ");
        drop(reply);

        let history = lock_history(&session.history);
        assert_eq!(history.len(), 1);
        let turn = history.turns().next().unwrap();
        assert_eq!(turn.assistant, "partial ");
    }

    #[tokio::test]
    async fn test_unconsumed_reply_commits_nothing() {
        let store = VectorStore::open_in_memory().unwrap();
        let embedder = NullEmbedder;
        let backend = MockBackend::scripted(vec![ok_reply("never seen")]);
        let mut session = ChatSession::new(backend, &store, &embedder, options(10));

        let reply = session.send("go").await.unwrap();
        drop(reply);
        assert_eq!(session.history_len(), 0);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_send() {
        let store = VectorStore::open_in_memory().unwrap();
        let embedder = NullEmbedder;
        let backend = MockBackend::scripted(vec![ok_reply("hi")]);
        let mut session = ChatSession::new(backend, &store, &embedder, options(10));

        session.close();
        let err = session.send("hello").await.err().unwrap();
        assert!(matches!(err, NotariumError::SessionClosed));
    }

    #[tokio::test]
    async fn test_clear_resets_history() {
        let store = VectorStore::open_in_memory().unwrap();
        let embedder = NullEmbedder;
        let backend = MockBackend::scripted(vec![ok_reply("one"), ok_reply("two")]);
        let mut session = ChatSession::new(backend, &store, &embedder, options(10));

        session.send("a").await.unwrap().collect_text().await.unwrap();
        session.clear();
        assert_eq!(session.history_len(), 0);

        session.send("b").await.unwrap().collect_text().await.unwrap();
        assert_eq!(session.history_len(), 1);
    }

    #[test]
    fn test_history_messages_alternate_roles() {
        let mut history = ConversationHistory::new(10);
        history.push(ConversationTurn {
            user: "hi".to_string(),
            assistant: "hello".to_string(),
            context_ids: vec![],
        });
        let messages = history.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
    }
}
