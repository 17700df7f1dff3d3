//! Declara CLI: generate declaration and cover letters from intake documents.
//!
//! Set DECLARA_API_URL (or API_URL) to point at the generation backend.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use declara_api_client::ApiClient;
use declara_cli::input::{load_sources, read_source};
use declara_cli::output::write_documents;
use declara_cli::presenter::run_presenter;
use declara_cli::{init_tracing, truncate_string};
use declara_core::models::{DocumentKind, RemoteDocumentId};
use declara_core::{AiProvider, ClientConfig, DocumentValidator};
use declara_engine::Engine;
use serde::Serialize;
use tokio::sync::oneshot;

#[derive(Parser)]
#[command(name = "declara", about = "Declaration and cover letter generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files and generate a declaration and cover letter for each
    Process {
        /// Intake documents (pdf, docx, doc, txt)
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Directory for the generated markdown
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// AI provider: google_gemini or groq_ai
        #[arg(long)]
        provider: Option<AiProvider>,
    },
    /// List the AI providers the backend offers
    Providers,
    /// Ask the assistant about a generated document
    Chat {
        /// Backend document id
        #[arg(long)]
        document_id: String,
        /// declaration or cover
        #[arg(long, default_value = "declaration")]
        r#type: DocumentKind,
        /// Where to save a proposed rewrite, if the assistant makes one
        #[arg(long)]
        save: Option<PathBuf>,
        message: String,
    },
    /// Forget the chat history for a document
    ClearMemory {
        #[arg(long)]
        document_id: String,
    },
    /// Convert edited markdown into a downloadable docx
    Download {
        #[arg(long)]
        document_id: String,
        #[arg(long, default_value = "declaration")]
        r#type: DocumentKind,
        /// Markdown file with the edited content
        #[arg(long)]
        input: PathBuf,
        /// Output path. Defaults to the suggested draft filename.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Render a local file the way the queue preview shows it
    Preview {
        file: PathBuf,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = ClientConfig::from_env().context("Invalid client configuration")?;
    let client = ApiClient::from_config(&config).context("Failed to create API client")?;

    match cli.command {
        Commands::Process {
            files,
            out,
            provider,
        } => {
            let validator = DocumentValidator::new(&config.queue);
            let engine = Engine::new(config, Arc::new(client));
            if let Some(provider) = provider {
                engine.ctx.set_provider(provider);
            }

            let (stop_tx, stop_rx) = oneshot::channel();
            let presenter = tokio::spawn(run_presenter(
                engine.ctx.clone(),
                engine.subscribe(),
                stop_rx,
            ));

            let (sources, oversized) = load_sources(&files, &validator)?;
            for error in &oversized {
                eprintln!("✗ {error}");
            }
            let admitted = engine.add_files(sources);
            if admitted.added.is_empty() {
                let _ = stop_tx.send(());
                let _ = presenter.await;
                anyhow::bail!("No files were accepted");
            }

            let interrupt = tokio::spawn({
                let engine = engine.clone();
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        let removed = engine.cancel_all();
                        tracing::warn!(removed = removed, "Interrupted, cancelling all documents");
                    }
                }
            });

            let report = engine.process_all().await?;
            interrupt.abort();
            let _ = stop_tx.send(());
            let _ = presenter.await;

            let docs: Vec<_> = engine
                .ctx
                .queue
                .items()
                .into_iter()
                .filter_map(|item| item.remote_document_id)
                .filter_map(|id| engine.ctx.documents.get(&id).map(|doc| (id, doc)))
                .collect();
            let written = write_documents(
                &out,
                &docs.iter().map(|(_, doc)| doc.clone()).collect::<Vec<_>>(),
            )?;

            for (id, doc) in &docs {
                eprintln!(
                    "{} (document {}): {}",
                    truncate_string(&doc.file_name, 40),
                    id,
                    doc.applicant_name
                );
            }
            for path in &written {
                println!("{}", path.display());
            }
            eprintln!(
                "Completed {}, partial {}, failed {}, cancelled {}, skipped {}",
                report.completed, report.partial, report.failed, report.aborted, report.skipped
            );
        }
        Commands::Providers => {
            let response = client.providers().await?;
            print_json(&response)?;
        }
        Commands::Chat {
            document_id,
            r#type,
            save,
            message,
        } => {
            let engine = Engine::new(config, Arc::new(client));
            let (stop_tx, stop_rx) = oneshot::channel();
            let presenter = tokio::spawn(run_presenter(
                engine.ctx.clone(),
                engine.subscribe(),
                stop_rx,
            ));

            let result = engine
                .chat
                .send(&RemoteDocumentId::new(document_id), r#type, &message)
                .await;
            let _ = stop_tx.send(());
            let _ = presenter.await;
            println!();

            let reply = result?;
            match (reply.modified_text, save) {
                (Some(text), Some(path)) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!("Proposed rewrite saved to {}", path.display());
                }
                (Some(_), None) => {
                    eprintln!("The assistant proposed a rewrite. Pass --save to keep it.")
                }
                (None, _) => {}
            }
        }
        Commands::ClearMemory { document_id } => {
            let engine = Engine::new(config, Arc::new(client));
            engine
                .chat
                .clear_memory(&RemoteDocumentId::new(document_id))
                .await?;
            eprintln!("Chat memory cleared");
        }
        Commands::Download {
            document_id,
            r#type,
            input,
            out,
        } => {
            let content = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let bytes = client
                .download_edited_document(&RemoteDocumentId::new(document_id), r#type, &content)
                .await?;
            let path = out.unwrap_or_else(|| PathBuf::from(r#type.download_filename(None)));
            std::fs::write(&path, &bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{}", path.display());
        }
        Commands::Preview { file } => {
            let source = read_source(&file)?;
            let engine = Engine::new(config, Arc::new(client));
            let fragment = engine
                .previews
                .render_file(source.name, source.bytes.to_vec())
                .await;
            println!("{}", fragment);
        }
    }

    Ok(())
}
