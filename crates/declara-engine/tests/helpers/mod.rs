//! Test helpers: a scripted in-memory backend and event utilities.
//!
//! Run from workspace root: `cargo test -p declara-engine`.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use declara_core::models::{
    ChatEvent, ChatRequest, DocumentKind, ProvidersResponse, RemoteDocumentId, SourceFile,
    StreamEvent,
};
use declara_core::{AiProvider, BackendError, ClientConfig, EventStream, GenerationBackend};
use declara_engine::{Engine, EngineEvent};
use futures::stream::{self, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch, Notify};

pub type EventSender = mpsc::UnboundedSender<Result<StreamEvent, BackendError>>;

/// Every call the engine made, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Upload(String),
    Open(RemoteDocumentId, DocumentKind, AiProvider),
    Chat(ChatRequest),
    Download(RemoteDocumentId, DocumentKind, String),
    Providers,
    ClearMemory(String),
}

enum GenerationScript {
    Events(Vec<Result<StreamEvent, BackendError>>),
    Channel(mpsc::UnboundedReceiver<Result<StreamEvent, BackendError>>),
    OpenError(BackendError),
}

/// Scripted backend. Unscripted calls succeed with canned content; uploads are
/// numbered "1", "2", ... in call order.
#[derive(Default)]
pub struct MockBackend {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicU64,
    upload_results: Mutex<VecDeque<Result<RemoteDocumentId, BackendError>>>,
    upload_gate: Mutex<Option<Arc<Notify>>>,
    generations: Mutex<HashMap<(RemoteDocumentId, DocumentKind), VecDeque<GenerationScript>>>,
    chats: Mutex<VecDeque<Vec<Result<ChatEvent, BackendError>>>>,
    providers: Mutex<Option<Result<ProvidersResponse, BackendError>>>,
    opened: OpenCounter,
}

struct OpenCounter(watch::Sender<usize>);

impl Default for OpenCounter {
    fn default() -> Self {
        Self(watch::channel(0).0)
    }
}

pub const DECLARATION_TEXT: [&str; 2] = ["I, Jane Q. Public, ", "declare the following facts."];
pub const COVER_TEXT: &str = "Dear Officer, please find the enclosed declaration.";

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn open_calls(&self) -> Vec<(RemoteDocumentId, DocumentKind)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Open(id, kind, _) => Some((id, kind)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn fail_next_upload(&self, error: BackendError) {
        self.upload_results.lock().unwrap().push_back(Err(error));
    }

    /// Make uploads wait until the returned handle is notified (once per upload).
    pub fn hold_uploads(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.upload_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn script(&self, id: &str, kind: DocumentKind, events: Vec<Result<StreamEvent, BackendError>>) {
        self.push_script(id, kind, GenerationScript::Events(events));
    }

    pub fn fail_open(&self, id: &str, kind: DocumentKind, error: BackendError) {
        self.push_script(id, kind, GenerationScript::OpenError(error));
    }

    /// Drive a stream by hand. Events are delivered as they are sent.
    pub fn channel(&self, id: &str, kind: DocumentKind) -> EventSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push_script(id, kind, GenerationScript::Channel(rx));
        tx
    }

    fn push_script(&self, id: &str, kind: DocumentKind, script: GenerationScript) {
        self.generations
            .lock()
            .unwrap()
            .entry((RemoteDocumentId::new(id), kind))
            .or_default()
            .push_back(script);
    }

    pub fn script_chat(&self, events: Vec<Result<ChatEvent, BackendError>>) {
        self.chats.lock().unwrap().push_back(events);
    }

    pub fn set_providers(&self, result: Result<ProvidersResponse, BackendError>) {
        *self.providers.lock().unwrap() = Some(result);
    }

    /// Wait until at least `n` generation streams have been opened.
    pub async fn wait_for_opens(&self, n: usize) {
        let mut rx = self.opened.0.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|count| *count >= n))
            .await
            .expect("timed out waiting for stream open")
            .expect("open counter closed");
    }
}

fn default_generation(kind: DocumentKind, id: &RemoteDocumentId) -> Vec<Result<StreamEvent, BackendError>> {
    match kind {
        DocumentKind::Declaration => vec![
            Ok(StreamEvent::Content(DECLARATION_TEXT[0].to_string())),
            Ok(StreamEvent::Content(DECLARATION_TEXT[1].to_string())),
            Ok(StreamEvent::Complete {
                filename: Some(format!("declaration_{id}.docx")),
            }),
        ],
        DocumentKind::Cover => vec![
            Ok(StreamEvent::Content(COVER_TEXT.to_string())),
            Ok(StreamEvent::Complete {
                filename: Some(format!("cover_{id}.docx")),
            }),
        ],
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn upload(&self, file_name: &str, _bytes: Bytes) -> Result<RemoteDocumentId, BackendError> {
        self.record(Call::Upload(file_name.to_string()));
        let gate = self.upload_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let scripted = self.upload_results.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(RemoteDocumentId::from(id as i64))
            }
        }
    }

    async fn open_generation(
        &self,
        document_id: &RemoteDocumentId,
        kind: DocumentKind,
        provider: AiProvider,
    ) -> Result<EventStream<StreamEvent>, BackendError> {
        self.record(Call::Open(document_id.clone(), kind, provider));
        self.opened.0.send_modify(|count| *count += 1);

        let script = self
            .generations
            .lock()
            .unwrap()
            .get_mut(&(document_id.clone(), kind))
            .and_then(VecDeque::pop_front);

        match script {
            Some(GenerationScript::Events(events)) => Ok(stream::iter(events).boxed()),
            Some(GenerationScript::Channel(rx)) => Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|event| (event, rx))
            })
            .boxed()),
            Some(GenerationScript::OpenError(error)) => Err(error),
            None => Ok(stream::iter(default_generation(kind, document_id)).boxed()),
        }
    }

    async fn open_chat(&self, request: &ChatRequest) -> Result<EventStream<ChatEvent>, BackendError> {
        self.record(Call::Chat(request.clone()));
        let events = self.chats.lock().unwrap().pop_front().unwrap_or_else(|| {
            vec![
                Ok(ChatEvent::Content("Sure.".to_string())),
                Ok(ChatEvent::Complete {
                    has_modification: false,
                    modified_text: None,
                }),
            ]
        });
        Ok(stream::iter(events).boxed())
    }

    async fn download_edited(
        &self,
        document_id: &RemoteDocumentId,
        kind: DocumentKind,
        content: &str,
    ) -> Result<Bytes, BackendError> {
        self.record(Call::Download(document_id.clone(), kind, content.to_string()));
        Ok(Bytes::from(format!("docx:{content}")))
    }

    async fn list_providers(&self) -> Result<ProvidersResponse, BackendError> {
        self.record(Call::Providers);
        self.providers.lock().unwrap().clone().unwrap_or_else(|| {
            Ok(ProvidersResponse {
                success: true,
                providers: vec!["google_gemini".to_string(), "groq_ai".to_string()],
                default_provider: Some("google_gemini".to_string()),
            })
        })
    }

    async fn clear_chat_memory(&self, user_id: &str) -> Result<(), BackendError> {
        self.record(Call::ClearMemory(user_id.to_string()));
        Ok(())
    }
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        typing_effect_delay: Duration::from_millis(30),
        ..ClientConfig::default()
    }
}

pub fn engine(backend: &Arc<MockBackend>) -> Engine {
    Engine::new(test_config(), backend.clone())
}

pub fn pdf(name: &str, size: usize) -> SourceFile {
    SourceFile::new(name, vec![b'%'; size])
}

pub fn declaration_text() -> String {
    DECLARATION_TEXT.concat()
}

/// Receive until an event matches, skipping the rest.
pub async fn wait_for<F>(rx: &mut broadcast::Receiver<EngineEvent>, pred: F) -> EngineEvent
where
    F: Fn(&EngineEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Everything published so far and not yet received.
pub fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
