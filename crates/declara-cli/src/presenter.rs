//! Renders engine events to the terminal.
//!
//! Generated text goes to stdout as it streams in; status lines and errors go to stderr.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use declara_core::models::{DocumentKind, QueueStatus, RemoteDocumentId};
use declara_engine::{EngineContext, EngineEvent};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, oneshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Written as-is, without a trailing newline.
    Stdout(String),
    /// One status line.
    Stderr(String),
}

/// Turns events into terminal output, tracking how much of each stream is on screen.
pub struct Presenter {
    ctx: Arc<EngineContext>,
    printed: HashMap<(RemoteDocumentId, DocumentKind), usize>,
}

impl Presenter {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self {
            ctx,
            printed: HashMap::new(),
        }
    }

    pub fn render(&mut self, event: &EngineEvent) -> Vec<Output> {
        match event {
            EngineEvent::ItemRejected { error } => vec![Output::Stderr(format!("✗ {error}"))],
            EngineEvent::StatusChanged { item_id, status } => {
                let name = self
                    .ctx
                    .queue
                    .find_by_id(*item_id)
                    .map(|item| item.file_name)
                    .unwrap_or_else(|| "unknown file".to_string());
                vec![Output::Stderr(format!("[{name}] {}", status_label(*status)))]
            }
            EngineEvent::UploadFailed {
                file_name, message, ..
            } => vec![Output::Stderr(format!(
                "Error uploading {file_name}: {message}"
            ))],
            EngineEvent::StreamStarted { document_id, kind } => {
                self.printed.insert((document_id.clone(), *kind), 0);
                let name = self.file_name(document_id);
                vec![Output::Stdout(format!(
                    "\n=== {} · {name} ===\n",
                    kind.display_name()
                ))]
            }
            EngineEvent::ContentFlushed {
                document_id,
                kind,
                text,
            } => {
                let printed = self
                    .printed
                    .entry((document_id.clone(), *kind))
                    .or_insert(0);
                let suffix = text.get(*printed..).unwrap_or_default().to_string();
                *printed = text.len();
                if suffix.is_empty() {
                    Vec::new()
                } else {
                    vec![Output::Stdout(suffix)]
                }
            }
            EngineEvent::StreamFinished {
                document_id,
                kind,
                partial,
                ..
            } => {
                self.printed.remove(&(document_id.clone(), *kind));
                let mut out = vec![Output::Stdout("\n".to_string())];
                if *partial {
                    out.push(Output::Stderr(format!(
                        "⚠ Connection dropped, the {} may be incomplete",
                        kind.display_name()
                    )));
                }
                out
            }
            EngineEvent::ApplicantIdentified { name, .. } => {
                vec![Output::Stderr(format!("Applicant: {name}"))]
            }
            EngineEvent::DocumentError {
                document_id,
                file_name,
                kind,
                message,
            } => {
                self.printed.remove(&(document_id.clone(), *kind));
                let line = match kind {
                    DocumentKind::Declaration => {
                        format!("Error processing {file_name}: {message}")
                    }
                    DocumentKind::Cover => format!("Error generating Cover Letter: {message}"),
                };
                vec![Output::Stderr(line)]
            }
            EngineEvent::ChatChunk { text, .. } => vec![Output::Stdout(text.clone())],
            EngineEvent::QueueChanged { .. }
            | EngineEvent::ProcessingChanged(_)
            | EngineEvent::DocumentClosed { .. }
            | EngineEvent::PreviewReady { .. } => Vec::new(),
        }
    }

    fn file_name(&self, document_id: &RemoteDocumentId) -> String {
        self.ctx
            .queue
            .find_by_remote_id(document_id)
            .map(|item| item.file_name)
            .or_else(|| self.ctx.documents.get(document_id).map(|doc| doc.file_name))
            .unwrap_or_else(|| format!("document {document_id}"))
    }
}

fn status_label(status: QueueStatus) -> &'static str {
    match status {
        QueueStatus::Error => "✗ Error",
        _ => status.label(),
    }
}

fn emit(outputs: Vec<Output>) {
    let mut stdout = std::io::stdout().lock();
    for output in outputs {
        match output {
            Output::Stdout(text) => {
                let _ = stdout.write_all(text.as_bytes());
            }
            Output::Stderr(line) => {
                let _ = stdout.flush();
                eprintln!("{line}");
            }
        }
    }
    let _ = stdout.flush();
}

/// Print events until the bus closes or `stop` fires. On stop, whatever is already
/// queued on the receiver is still printed.
pub async fn run_presenter(
    ctx: Arc<EngineContext>,
    mut rx: broadcast::Receiver<EngineEvent>,
    mut stop: oneshot::Receiver<()>,
) {
    let mut presenter = Presenter::new(ctx);
    loop {
        tokio::select! {
            biased;
            event = rx.recv() => match event {
                Ok(event) => emit(presenter.render(&event)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped = skipped, "Presenter fell behind the event bus");
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut stop => {
                while let Ok(event) = rx.try_recv() {
                    emit(presenter.render(&event));
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declara_api_client::ApiClient;
    use declara_core::models::SourceFile;
    use declara_core::{ClientConfig, ValidationError};
    use declara_engine::Engine;
    use std::time::Duration;

    fn engine() -> Engine {
        // Nothing in these tests reaches the network
        let client = ApiClient::new("http://127.0.0.1:9".to_string(), Duration::from_secs(1))
            .unwrap();
        Engine::new(ClientConfig::default(), Arc::new(client))
    }

    fn stdout_text(outputs: &[Output]) -> String {
        outputs
            .iter()
            .filter_map(|o| match o {
                Output::Stdout(text) => Some(text.as_str()),
                Output::Stderr(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_flushes_print_only_new_text() {
        let engine = engine();
        let mut presenter = Presenter::new(engine.ctx.clone());
        let document_id = RemoteDocumentId::new("3");
        let kind = DocumentKind::Declaration;

        let header = presenter.render(&EngineEvent::StreamStarted {
            document_id: document_id.clone(),
            kind,
        });
        assert!(stdout_text(&header).contains("Declaration Letter · document 3"));

        let mut streamed = String::new();
        for text in ["I, Jane", "I, Jane Doe, declare", "I, Jane Doe, declare"] {
            streamed.push_str(&stdout_text(&presenter.render(&EngineEvent::ContentFlushed {
                document_id: document_id.clone(),
                kind,
                text: text.to_string(),
            })));
        }
        assert_eq!(streamed, "I, Jane Doe, declare");
    }

    #[test]
    fn test_restarted_stream_prints_from_the_beginning() {
        let engine = engine();
        let mut presenter = Presenter::new(engine.ctx.clone());
        let document_id = RemoteDocumentId::new("3");
        let kind = DocumentKind::Cover;
        let flush = |text: &str| EngineEvent::ContentFlushed {
            document_id: document_id.clone(),
            kind,
            text: text.to_string(),
        };

        presenter.render(&flush("Dear Officer"));
        presenter.render(&EngineEvent::StreamStarted {
            document_id: document_id.clone(),
            kind,
        });

        assert_eq!(stdout_text(&presenter.render(&flush("Dear"))), "Dear");
    }

    #[test]
    fn test_status_lines_use_file_names() {
        let engine = engine();
        let item_id = engine.add_files(vec![SourceFile::new("intake.pdf", vec![0u8; 16])]).added[0];
        let mut presenter = Presenter::new(engine.ctx.clone());

        let outputs = presenter.render(&EngineEvent::StatusChanged {
            item_id,
            status: QueueStatus::Completed,
        });

        assert_eq!(
            outputs,
            vec![Output::Stderr("[intake.pdf] ✓ Completed".to_string())]
        );
    }

    #[test]
    fn test_error_lines() {
        let engine = engine();
        let mut presenter = Presenter::new(engine.ctx.clone());
        let document_id = RemoteDocumentId::new("1");

        let declaration = presenter.render(&EngineEvent::DocumentError {
            document_id: document_id.clone(),
            file_name: "a.pdf".into(),
            kind: DocumentKind::Declaration,
            message: "Connection lost".into(),
        });
        let cover = presenter.render(&EngineEvent::DocumentError {
            document_id,
            file_name: "a.pdf".into(),
            kind: DocumentKind::Cover,
            message: "Model overloaded".into(),
        });
        let rejected = presenter.render(&EngineEvent::ItemRejected {
            error: ValidationError::QueueFull { max: 5 },
        });

        assert_eq!(
            declaration,
            vec![Output::Stderr("Error processing a.pdf: Connection lost".into())]
        );
        assert_eq!(
            cover,
            vec![Output::Stderr(
                "Error generating Cover Letter: Model overloaded".into()
            )]
        );
        assert!(matches!(&rejected[0], Output::Stderr(line) if line.starts_with("✗ Maximum limit")));
    }

    #[test]
    fn test_partial_stream_warns() {
        let engine = engine();
        let mut presenter = Presenter::new(engine.ctx.clone());

        let outputs = presenter.render(&EngineEvent::StreamFinished {
            document_id: RemoteDocumentId::new("1"),
            kind: DocumentKind::Cover,
            filename: None,
            partial: true,
        });

        assert_eq!(outputs.len(), 2);
        assert!(matches!(&outputs[1], Output::Stderr(line) if line.contains("Cover Letter may be incomplete")));
    }

    #[tokio::test]
    async fn test_presenter_stops_after_draining() {
        let engine = engine();
        let rx = engine.subscribe();
        let (stop_tx, stop_rx) = oneshot::channel();
        engine.ctx.events.publish(EngineEvent::QueueChanged { len: 0 });
        stop_tx.send(()).unwrap();

        tokio::time::timeout(
            Duration::from_secs(5),
            run_presenter(engine.ctx.clone(), rx, stop_rx),
        )
        .await
        .unwrap();
    }
}
