//! Queue admission rules for user-picked files.

use crate::config::QueueLimits;
use crate::error::ValidationError;
use crate::models::{file_extension, SourceFile};

/// Source document validator
///
/// Checks a single file against the configured extension and size limits. Queue-level
/// rules (capacity, duplicate names) live with the queue, which owns that state.
#[derive(Debug, Clone)]
pub struct DocumentValidator {
    max_file_size_bytes: u64,
    max_file_size_mb: u64,
    allowed_extensions: Vec<String>,
}

impl DocumentValidator {
    pub fn new(limits: &QueueLimits) -> Self {
        Self {
            max_file_size_bytes: limits.max_file_size_bytes(),
            max_file_size_mb: limits.max_file_size_mb,
            allowed_extensions: limits.valid_extensions.clone(),
        }
    }

    /// Validate file extension
    pub fn validate_extension(&self, file_name: &str) -> Result<(), ValidationError> {
        let allowed = file_extension(file_name)
            .map(|ext| {
                let ext = ext.trim_start_matches('.');
                self.allowed_extensions.iter().any(|a| a == ext)
            })
            .unwrap_or(false);

        if !allowed {
            return Err(ValidationError::InvalidExtension {
                file_name: file_name.to_string(),
            });
        }

        Ok(())
    }

    /// Validate file size
    pub fn validate_size(&self, file_name: &str, size: u64) -> Result<(), ValidationError> {
        if size > self.max_file_size_bytes {
            return Err(ValidationError::FileTooLarge {
                file_name: file_name.to_string(),
                max_mb: self.max_file_size_mb,
            });
        }

        Ok(())
    }

    /// Run all per-file checks, extension first.
    pub fn validate(&self, file: &SourceFile) -> Result<(), ValidationError> {
        self.validate_extension(&file.name)?;
        self.validate_size(&file.name, file.size())
    }
}

impl Default for DocumentValidator {
    fn default() -> Self {
        Self::new(&QueueLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_extensions() {
        let validator = DocumentValidator::default();
        assert!(validator.validate_extension("intake.pdf").is_ok());
        assert!(validator.validate_extension("Intake.DOCX").is_ok());
        assert!(validator.validate_extension("notes.txt").is_ok());
        assert!(validator.validate_extension("legacy.doc").is_ok());
    }

    #[test]
    fn test_invalid_extensions() {
        let validator = DocumentValidator::default();
        assert_eq!(
            validator.validate_extension("photo.png"),
            Err(ValidationError::InvalidExtension {
                file_name: "photo.png".to_string()
            })
        );
        assert!(validator.validate_extension("README").is_err());
        assert!(validator.validate_extension("archive.pdf.zip").is_err());
    }

    #[test]
    fn test_size_limits() {
        let validator = DocumentValidator::default();
        let max = 10 * 1024 * 1024;
        assert!(validator.validate_size("a.pdf", max).is_ok());
        assert_eq!(
            validator.validate_size("a.pdf", max + 1),
            Err(ValidationError::FileTooLarge {
                file_name: "a.pdf".to_string(),
                max_mb: 10
            })
        );
        assert!(validator.validate_size("empty.txt", 0).is_ok());
    }

    #[test]
    fn test_validate_checks_extension_before_size() {
        let validator = DocumentValidator::default();
        let file = SourceFile::new("huge.exe", vec![0u8; 11 * 1024 * 1024]);
        assert!(matches!(
            validator.validate(&file),
            Err(ValidationError::InvalidExtension { .. })
        ));
    }
}
