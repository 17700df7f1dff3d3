//! Local preview of queued source files.
//!
//! Rendering never fails from the caller's point of view: any error becomes a
//! `preview-error` fragment. Extraction is CPU-bound and runs on the blocking pool.

use std::io::{Cursor, Read};
use std::sync::{Arc, LazyLock};

use declara_core::models::{file_extension, PreviewState, QueueItemId};
use declara_core::PreviewLimits;
use regex::Regex;

use crate::context::EngineContext;
use crate::error::EngineError;
use crate::events::EngineEvent;

const UNSUPPORTED_FRAGMENT: &str = "<div class=\"preview-error\">Unsupported file format for preview. Supported formats: PDF, DOCX, TXT</div>";

/// Paragraphs of a WordprocessingML body, with their text runs.
static DOCX_PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:p[\s>].*?</w:p>").expect("valid paragraph regex"));
static DOCX_TEXT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>").expect("valid text run regex"));

/// Converts raw file bytes into an HTML fragment.
pub trait PreviewRenderer: Send + Sync {
    fn render(&self, file_name: &str, bytes: &[u8]) -> Result<String, EngineError>;
}

/// Text-only renderer for TXT, PDF and DOCX.
#[derive(Debug, Clone)]
pub struct DefaultPreviewRenderer {
    limits: PreviewLimits,
}

impl DefaultPreviewRenderer {
    pub fn new(limits: PreviewLimits) -> Self {
        Self { limits }
    }

    fn render_text(&self, bytes: &[u8]) -> String {
        let text = String::from_utf8_lossy(bytes);
        let limited = match text.char_indices().nth(self.limits.text_max_chars) {
            Some((cut, _)) => format!("{}\n\n... (text truncated)", &text[..cut]),
            None => text.into_owned(),
        };
        format!(
            "<pre class=\"text-preview-content\">{}</pre>",
            escape_html(&limited)
        )
    }

    fn render_pdf(&self, bytes: &[u8]) -> Result<String, EngineError> {
        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| EngineError::Preview(format!("Failed to render PDF: {e}")))?;
        let pages: Vec<&str> = text.split('\u{c}').collect();

        let mut html = String::from("<div class=\"pdf-preview-wrapper\">");
        for (index, page) in pages.iter().take(self.limits.pdf_max_pages).enumerate() {
            html.push_str(&format!(
                "<pre class=\"pdf-page-text\" data-page=\"{}\">{}</pre>",
                index + 1,
                escape_html(page.trim())
            ));
        }
        if pages.len() > self.limits.pdf_max_pages {
            html.push_str(&format!(
                "<div class=\"more-pages-indicator\">+ {} more pages...</div>",
                pages.len() - self.limits.pdf_max_pages
            ));
        }
        html.push_str("</div>");
        Ok(html)
    }

    fn render_docx(&self, bytes: &[u8]) -> Result<String, EngineError> {
        let fail = |e: String| EngineError::Preview(format!("Failed to render DOCX: {e}"));

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| fail(e.to_string()))?;
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .map_err(|e| fail(e.to_string()))?
            .read_to_string(&mut xml)
            .map_err(|e| fail(e.to_string()))?;

        let mut html = String::from("<div class=\"docx-preview-wrapper\"><div class=\"docx-preview-content\">");
        for paragraph in DOCX_PARAGRAPH.find_iter(&xml) {
            // Run text is already XML-escaped, which is valid HTML as-is
            let text: String = DOCX_TEXT_RUN
                .captures_iter(paragraph.as_str())
                .filter_map(|c| c.get(1).map(|m| m.as_str()))
                .collect();
            if !text.trim().is_empty() {
                html.push_str(&format!("<p>{text}</p>"));
            }
        }
        html.push_str("</div></div>");
        Ok(html)
    }
}

impl PreviewRenderer for DefaultPreviewRenderer {
    fn render(&self, file_name: &str, bytes: &[u8]) -> Result<String, EngineError> {
        match file_extension(file_name).as_deref() {
            Some(".txt") => Ok(self.render_text(bytes)),
            Some(".pdf") => self.render_pdf(bytes),
            Some(".docx") => self.render_docx(bytes),
            other => {
                tracing::warn!(file_name = %file_name, extension = ?other, "Unsupported preview format");
                Ok(UNSUPPORTED_FRAGMENT.to_string())
            }
        }
    }
}

/// Render with `renderer`, turning any failure into an error fragment.
pub fn render_fragment(renderer: &dyn PreviewRenderer, file_name: &str, bytes: &[u8]) -> String {
    match renderer.render(file_name, bytes) {
        Ok(html) => html,
        Err(e) => {
            tracing::warn!(file_name = %file_name, error = %e, "Preview rendering failed");
            error_fragment(&e.to_string())
        }
    }
}

fn error_fragment(message: &str) -> String {
    format!(
        "<div class=\"preview-error\">Error loading preview: {}</div>",
        escape_html(message)
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Clone)]
pub struct PreviewService {
    ctx: Arc<EngineContext>,
    renderer: Arc<dyn PreviewRenderer>,
}

impl PreviewService {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        let renderer = Arc::new(DefaultPreviewRenderer::new(ctx.config.preview.clone()));
        Self::with_renderer(ctx, renderer)
    }

    pub fn with_renderer(ctx: Arc<EngineContext>, renderer: Arc<dyn PreviewRenderer>) -> Self {
        Self { ctx, renderer }
    }

    /// Expand or collapse an item's preview. The first expansion renders and caches it.
    pub async fn toggle(&self, item_id: QueueItemId) -> Result<PreviewState, EngineError> {
        let state = self
            .ctx
            .queue
            .update_preview(item_id, |p| p.expanded = !p.expanded)
            .ok_or(EngineError::ItemNotFound(item_id))?;

        if !state.expanded || state.rendered {
            return Ok(state);
        }

        let item = self
            .ctx
            .queue
            .find_by_id(item_id)
            .ok_or(EngineError::ItemNotFound(item_id))?;
        let html = self.render_file(item.file_name, item.file.to_vec()).await;

        let state = self
            .ctx
            .queue
            .update_preview(item_id, |p| {
                p.rendered = true;
                p.content = Some(html);
            })
            .ok_or(EngineError::ItemNotFound(item_id))?;
        self.ctx.events.publish(EngineEvent::PreviewReady { item_id });
        Ok(state)
    }

    /// Render any file off the async runtime.
    pub async fn render_file(&self, file_name: String, bytes: Vec<u8>) -> String {
        let renderer = Arc::clone(&self.renderer);
        tokio::task::spawn_blocking(move || render_fragment(renderer.as_ref(), &file_name, &bytes))
            .await
            .unwrap_or_else(|e| error_fragment(&format!("Preview task failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::offline_context;
    use declara_core::models::SourceFile;
    use std::io::Write;

    fn renderer() -> DefaultPreviewRenderer {
        DefaultPreviewRenderer::new(PreviewLimits {
            pdf_max_pages: 2,
            text_max_chars: 10,
        })
    }

    fn docx(document_xml: &str) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            writer
                .start_file("word/document.xml", zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(document_xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_text_is_escaped_and_truncated() {
        let html = renderer().render("a.txt", b"<b>hello</b> world").unwrap();
        assert_eq!(
            html,
            "<pre class=\"text-preview-content\">&lt;b&gt;hello&lt;/\n\n... (text truncated)</pre>"
        );

        let short = renderer().render("a.TXT", b"hi").unwrap();
        assert_eq!(short, "<pre class=\"text-preview-content\">hi</pre>");
    }

    #[test]
    fn test_docx_paragraphs() {
        let bytes = docx(
            r#"<w:document><w:body><w:p><w:r><w:t>I, Jane</w:t></w:r><w:r><w:t xml:space="preserve"> Public</w:t></w:r></w:p><w:p/><w:p w:rsidR="1"><w:r><w:t>A &amp; B</w:t></w:r></w:p></w:body></w:document>"#,
        );
        let html = renderer().render("letter.docx", &bytes).unwrap();
        assert!(html.contains("<p>I, Jane Public</p>"));
        assert!(html.contains("<p>A &amp; B</p>"));
        assert!(html.starts_with("<div class=\"docx-preview-wrapper\">"));
    }

    #[test]
    fn test_failures_become_fragments() {
        let html = render_fragment(&renderer(), "broken.docx", b"not a zip");
        assert!(html.starts_with("<div class=\"preview-error\">Error loading preview: Failed to render DOCX"));

        let html = render_fragment(&renderer(), "broken.pdf", b"not a pdf");
        assert!(html.starts_with("<div class=\"preview-error\">Error loading preview: Failed to render PDF"));
    }

    #[test]
    fn test_unsupported_formats() {
        assert_eq!(renderer().render("old.doc", b"x").unwrap(), UNSUPPORTED_FRAGMENT);
        assert_eq!(renderer().render("noext", b"x").unwrap(), UNSUPPORTED_FRAGMENT);
    }

    #[tokio::test]
    async fn test_toggle_renders_once() {
        let ctx = offline_context();
        let mut rx = ctx.events.subscribe();
        let id = ctx
            .queue
            .add_files(vec![SourceFile::new("notes.txt", b"plain notes".to_vec())])
            .added[0];
        let previews = PreviewService::new(ctx.clone());

        let opened = previews.toggle(id).await.unwrap();
        assert!(opened.expanded && opened.rendered);
        assert!(opened.content.as_deref().unwrap().contains("plain notes"));

        let closed = previews.toggle(id).await.unwrap();
        assert!(!closed.expanded);
        assert_eq!(closed.content, opened.content);

        let reopened = previews.toggle(id).await.unwrap();
        assert!(reopened.expanded);

        let mut ready = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, EngineEvent::PreviewReady { .. }) {
                ready += 1;
            }
        }
        assert_eq!(ready, 1);
    }

    #[tokio::test]
    async fn test_toggle_unknown_item() {
        let previews = PreviewService::new(offline_context());
        assert!(matches!(
            previews.toggle(QueueItemId::new()).await,
            Err(EngineError::ItemNotFound(_))
        ));
    }
}
