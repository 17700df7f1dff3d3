use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::applicant::DEFAULT_APPLICANT_NAME;

/// Server-assigned document id returned by the upload endpoint.
///
/// The backend sends it as a JSON integer; it is kept as an opaque string on this side,
/// accepted in either form and written back as an integer whenever it is numeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteDocumentId(String);

impl RemoteDocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteDocumentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<&str> for RemoteDocumentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<i64> for RemoteDocumentId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for RemoteDocumentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.parse::<i64>() {
            Ok(id) => serializer.serialize_i64(id),
            Err(_) => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for RemoteDocumentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(id) => Ok(Self(id.to_string())),
            Raw::Str(id) => Ok(Self(id)),
        }
    }
}

/// Which of the two generated artifacts a stream or edit refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Declaration,
    Cover,
}

impl DocumentKind {
    /// Path segment used by the download and chat endpoints.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Declaration => "declaration",
            DocumentKind::Cover => "cover",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DocumentKind::Declaration => "Declaration Letter",
            DocumentKind::Cover => "Cover Letter",
        }
    }

    /// Filename prefix, e.g. `DeclarationLetter[Jane Doe]_draft.docx`.
    fn file_stem(&self) -> &'static str {
        match self {
            DocumentKind::Declaration => "DeclarationLetter",
            DocumentKind::Cover => "CoverLetter",
        }
    }

    /// Suggested filename for a downloaded edited draft.
    pub fn download_filename(&self, applicant_name: Option<&str>) -> String {
        let name = applicant_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_APPLICANT_NAME);
        format!("{}[{}]_draft.docx", self.file_stem(), name)
    }

    /// Local filename for the generated markdown text.
    pub fn markdown_filename(&self, applicant_name: &str) -> String {
        format!("{}[{}].md", self.file_stem(), applicant_name)
    }
}

impl Display for DocumentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "declaration" => Ok(DocumentKind::Declaration),
            "cover" | "cover_letter" => Ok(DocumentKind::Cover),
            _ => Err(anyhow::anyhow!("Invalid document type: {}", s)),
        }
    }
}

/// Generated content for one uploaded document.
///
/// Created when the declaration stream completes and overwritten in place on regeneration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedDocument {
    pub file_name: String,
    pub applicant_name: String,
    pub declaration_content: String,
    pub declaration_filename: Option<String>,
    pub cover_letter_content: Option<String>,
    pub cover_letter_filename: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessedDocument {
    pub fn new(
        file_name: impl Into<String>,
        applicant_name: impl Into<String>,
        declaration_content: impl Into<String>,
        declaration_filename: Option<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            applicant_name: applicant_name.into(),
            declaration_content: declaration_content.into(),
            declaration_filename,
            cover_letter_content: None,
            cover_letter_filename: None,
            updated_at: Utc::now(),
        }
    }

    pub fn content(&self, kind: DocumentKind) -> Option<&str> {
        match kind {
            DocumentKind::Declaration => Some(self.declaration_content.as_str()),
            DocumentKind::Cover => self.cover_letter_content.as_deref(),
        }
    }

    pub fn set_content(&mut self, kind: DocumentKind, text: String) {
        match kind {
            DocumentKind::Declaration => self.declaration_content = text,
            DocumentKind::Cover => self.cover_letter_content = Some(text),
        }
        self.updated_at = Utc::now();
    }

    pub fn download_filename(&self, kind: DocumentKind) -> String {
        kind.download_filename(Some(&self.applicant_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_id_accepts_int_and_string() {
        let from_int: RemoteDocumentId = serde_json::from_str("42").unwrap();
        let from_str: RemoteDocumentId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(from_int, from_str);
        assert_eq!(from_int.as_str(), "42");
        assert!(serde_json::from_str::<RemoteDocumentId>("null").is_err());
        assert_eq!(serde_json::to_string(&from_str).unwrap(), "42");
        assert_eq!(
            serde_json::to_string(&RemoteDocumentId::new("doc-a")).unwrap(),
            "\"doc-a\""
        );
    }

    #[test]
    fn test_document_kind_round_trip() {
        assert_eq!(DocumentKind::Cover.to_string(), "cover");
        assert_eq!(
            "declaration".parse::<DocumentKind>().unwrap(),
            DocumentKind::Declaration
        );
        assert!("letter".parse::<DocumentKind>().is_err());
    }

    #[test]
    fn test_download_filenames() {
        assert_eq!(
            DocumentKind::Declaration.download_filename(Some("Jane Doe")),
            "DeclarationLetter[Jane Doe]_draft.docx"
        );
        assert_eq!(
            DocumentKind::Cover.download_filename(None),
            "CoverLetter[Applicant]_draft.docx"
        );
        assert_eq!(
            DocumentKind::Cover.download_filename(Some("  ")),
            "CoverLetter[Applicant]_draft.docx"
        );
    }

    #[test]
    fn test_set_content_overwrites() {
        let mut doc = ProcessedDocument::new("a.pdf", "Jane Doe", "first", None);
        assert_eq!(doc.content(DocumentKind::Cover), None);
        doc.set_content(DocumentKind::Cover, "cover".to_string());
        doc.set_content(DocumentKind::Declaration, "second".to_string());
        assert_eq!(doc.content(DocumentKind::Declaration), Some("second"));
        assert_eq!(doc.content(DocumentKind::Cover), Some("cover"));
    }
}
