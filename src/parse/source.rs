//! Coverage tag grammar.
//!
//! Tags can appear anywhere in a source file, typically in a comment:
//!
//! ```text
//! // [~server.api.v2/Post.handler~impl]
//! ```

use std::{path::Path, sync::LazyLock};

use regex::Regex;

use crate::domain::{CoverageTag, RequirementId, SyntaxError, SyntaxErrorKind};

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[~([^~/\]\s]+)/([^~\]\s]+)~([A-Za-z0-9_.\-]+)\]").expect("tag pattern is valid")
});

/// The result of parsing one source file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedSource {
    /// Coverage tags in the order they appear.
    pub tags: Vec<CoverageTag>,
    /// Tags whose package or requirement name is malformed.
    pub errors: Vec<SyntaxError>,
}

/// Parses every coverage tag in a source file.
///
/// Text that only resembles a tag (an unmatched `[~`, a missing type) is left
/// alone.
#[must_use]
pub fn parse(path: &Path, text: &str) -> ParsedSource {
    let mut parsed = ParsedSource::default();

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        for captures in TAG.captures_iter(line) {
            let id = format!("{}/{}", &captures[1], &captures[2]);
            match id.parse::<RequirementId>() {
                Ok(requirement) => parsed.tags.push(CoverageTag {
                    requirement,
                    coverage_type: captures[3].to_string(),
                    line: line_no,
                }),
                Err(_) => parsed.errors.push(SyntaxError::new(
                    path.to_path_buf(),
                    line_no,
                    SyntaxErrorKind::InvalidCoverageTag(captures[0].to_string()),
                )),
            }
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use test_case::test_case;

    use super::*;

    fn source(text: &str) -> ParsedSource {
        parse(&PathBuf::from("main.go"), text)
    }

    #[test]
    fn finds_tags_with_line_numbers() {
        let parsed = source(
            "package main\n\n// [~server.api/Post.handler~impl]\nfunc post() {}\n// [~server.api/Get~test] and [~other/X~impl]\n",
        );
        assert!(parsed.errors.is_empty());

        let found: Vec<_> = parsed
            .tags
            .iter()
            .map(|tag| (tag.requirement.to_string(), tag.coverage_type.as_str(), tag.line))
            .collect();
        assert_eq!(
            found,
            [
                ("server.api/Post.handler".to_string(), "impl", 3),
                ("server.api/Get".to_string(), "test", 5),
                ("other/X".to_string(), "impl", 5),
            ]
        );
    }

    #[test_case("// [~server.api/Post"; "unterminated")]
    #[test_case("x = a[~b]"; "index expression")]
    #[test_case("// [~pkg/Name~]"; "missing type")]
    #[test_case("// [~pkgName~impl]"; "missing slash")]
    fn lookalikes_are_plain_text(text: &str) {
        let parsed = source(text);
        assert!(parsed.tags.is_empty());
        assert!(parsed.errors.is_empty());
    }

    #[test]
    fn invalid_identifiers_are_errors() {
        let parsed = source("ok\n// [~9pkg/Name~impl]\n");
        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].line, 2);
        assert_eq!(
            parsed.errors[0].kind,
            SyntaxErrorKind::InvalidCoverageTag("[~9pkg/Name~impl]".to_string())
        );
    }

    #[test]
    fn coverage_type_is_free_form() {
        let parsed = source("[~pkg/A~integration-test.v2]");
        assert_eq!(parsed.tags[0].coverage_type, "integration-test.v2");
    }
}
