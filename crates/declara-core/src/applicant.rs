//! Best-effort applicant name extraction from generated declaration text.
//!
//! The name is only used to label tabs and suggest download filenames, so a miss
//! falls back to [`DEFAULT_APPLICANT_NAME`] instead of failing.

use regex::Regex;
use std::sync::LazyLock;

pub const DEFAULT_APPLICANT_NAME: &str = "Applicant";

/// Two to five capitalized words on one line. Single-letter initials may carry a period.
const NAME: &str = r"([A-Z](?:\.|[a-zA-Z]*)(?:[ \t]+[A-Z](?:\.|[a-zA-Z]*)){1,4})";

/// Tried in order, first match wins.
static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // "I, Jane Doe, declare ..."
        format!(r"(?i)I,\s+{NAME},\s+(?:declare|solemnly|state)"),
        // "My name is Jane Doe."
        format!(r"(?i)My name is\s+{NAME}(?:\.|,|\s+and)"),
        // "DECLARATION OF JANE DOE IN SUPPORT ..."
        format!(r"(?i)DECLARATION OF\s+{NAME}(?:\s+(?:IN|FOR|TO|ON|REGARDING))?"),
        // "I am Jane Doe, ..."
        format!(r"(?i)I am\s+{NAME}(?:\.|,|\s+and)"),
        // "RE: Application of Jane Doe"
        format!(r"(?i)RE?:\s*(?:Application|Petition|Declaration|Case)\s+(?:of|for)\s+{NAME}"),
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

const CONNECTIVE_WORDS: &[&str] = &[
    "IN",
    "SUPPORT",
    "FOR",
    "TO",
    "ON",
    "REGARDING",
    "OF",
    "THE",
    "A",
    "AN",
];

/// Extract the applicant's name from generated declaration text.
///
/// Returns [`DEFAULT_APPLICANT_NAME`] when no pattern matches or the match is made
/// entirely of connective words.
pub fn extract_applicant_name(text: &str) -> String {
    PATTERNS
        .iter()
        .find_map(|re| re.captures(text).and_then(|caps| caps.get(1)))
        .map(|m| clean_name(m.as_str().trim()))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_APPLICANT_NAME.to_string())
}

fn clean_name(raw: &str) -> String {
    raw.split_whitespace()
        .filter(|word| {
            let upper = word.to_uppercase();
            !CONNECTIVE_WORDS.contains(&upper.as_str())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_pattern_with_initial() {
        assert_eq!(
            extract_applicant_name("I, Jane Q. Public, declare that the following is true."),
            "Jane Q. Public"
        );
    }

    #[test]
    fn test_no_match_falls_back() {
        assert_eq!(
            extract_applicant_name("the following statement is true and correct."),
            DEFAULT_APPLICANT_NAME
        );
        assert_eq!(extract_applicant_name(""), DEFAULT_APPLICANT_NAME);
    }

    #[test]
    fn test_my_name_is_pattern() {
        assert_eq!(
            extract_applicant_name("Hello. My name is Carlos Alberto Ruiz, and I was born in 1990."),
            "Carlos Alberto Ruiz"
        );
    }

    #[test]
    fn test_declaration_of_strips_connectives() {
        assert_eq!(
            extract_applicant_name("# DECLARATION OF MARIA LOPEZ IN SUPPORT OF HER APPLICATION"),
            "MARIA LOPEZ"
        );
    }

    #[test]
    fn test_re_line_pattern() {
        assert_eq!(
            extract_applicant_name("RE: Petition for Ahmed Karim Hassan\n\nDear Officer"),
            "Ahmed Karim Hassan"
        );
    }

    #[test]
    fn test_name_does_not_cross_lines() {
        assert_eq!(
            extract_applicant_name("RE: Case of Lina Park.\nDeclaration follows"),
            "Lina Park"
        );
    }

    #[test]
    fn test_first_pattern_wins() {
        let text = "My name is Other Person. I, John Smith, state the following.";
        assert_eq!(extract_applicant_name(text), "John Smith");
    }

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(PATTERNS.len(), 5);
    }
}
