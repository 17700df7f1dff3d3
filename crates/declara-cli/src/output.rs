//! Writes generated documents to disk as markdown.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use declara_core::models::{DocumentKind, ProcessedDocument};

/// Write each document's declaration and (when present) cover letter into `out_dir`.
///
/// Names follow `DeclarationLetter[Applicant].md`; a second document for the same
/// applicant gets a numeric suffix instead of overwriting the first.
pub fn write_documents(out_dir: &Path, docs: &[ProcessedDocument]) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

    let mut used = HashSet::new();
    let mut written = Vec::new();
    for doc in docs {
        for kind in [DocumentKind::Declaration, DocumentKind::Cover] {
            let Some(content) = doc.content(kind) else {
                continue;
            };
            let name = unique_name(&mut used, kind.markdown_filename(&doc.applicant_name));
            let path = out_dir.join(name);
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            written.push(path);
        }
    }

    Ok(written)
}

fn unique_name(used: &mut HashSet<String>, name: String) -> String {
    if used.insert(name.clone()) {
        return name;
    }
    let stem = name.trim_end_matches(".md");
    let mut n = 2;
    loop {
        let candidate = format!("{stem} ({n}).md");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_both_documents() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = ProcessedDocument::new("a.pdf", "Jane Doe", "Declaration body", None);
        doc.set_content(DocumentKind::Cover, "Cover body".to_string());

        let written = write_documents(dir.path(), &[doc]).unwrap();

        assert_eq!(written.len(), 2);
        let declaration = dir.path().join("DeclarationLetter[Jane Doe].md");
        let cover = dir.path().join("CoverLetter[Jane Doe].md");
        assert_eq!(std::fs::read_to_string(declaration).unwrap(), "Declaration body");
        assert_eq!(std::fs::read_to_string(cover).unwrap(), "Cover body");
    }

    #[test]
    fn test_missing_cover_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ProcessedDocument::new("a.pdf", "Jane Doe", "Declaration body", None);

        let written = write_documents(dir.path(), &[doc]).unwrap();

        assert_eq!(written, vec![dir.path().join("DeclarationLetter[Jane Doe].md")]);
    }

    #[test]
    fn test_same_applicant_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let first = ProcessedDocument::new("a.pdf", "Applicant", "First", None);
        let second = ProcessedDocument::new("b.pdf", "Applicant", "Second", None);

        write_documents(dir.path(), &[first, second]).unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("DeclarationLetter[Applicant].md")).unwrap(),
            "First"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("DeclarationLetter[Applicant] (2).md"))
                .unwrap(),
            "Second"
        );
    }
}
