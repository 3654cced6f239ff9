use std::path::PathBuf;

use crate::domain::RequirementId;

/// A malformed grammar construct in a markdown or source file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}:{}: {}", .path.display(), .line, .kind)]
pub struct SyntaxError {
    /// The file containing the error.
    pub path: PathBuf,
    /// One-based line number.
    pub line: usize,
    /// What went wrong.
    pub kind: SyntaxErrorKind,
}

impl SyntaxError {
    /// Creates a syntax error.
    #[must_use]
    pub const fn new(path: PathBuf, line: usize, kind: SyntaxErrorKind) -> Self {
        Self { path, line, kind }
    }
}

/// The kinds of syntax error the parsers report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxErrorKind {
    /// The header declares a package that is not a valid identifier.
    #[error("invalid package identifier '{0}'")]
    InvalidPackage(String),

    /// A requirement marker names an invalid identifier.
    #[error("invalid requirement name '{0}'")]
    InvalidRequirementName(String),

    /// The status word does not pair with the status glyph.
    #[error("status '{status}' does not match glyph '{glyph}'")]
    StatusMismatch {
        /// The status word found.
        status: String,
        /// The glyph found.
        glyph: String,
    },

    /// A coverage annotation is missing its status, reference or glyph.
    #[error("incomplete coverage annotation '{0}'")]
    IncompleteAnnotation(String),

    /// A requirement marker references a footnote for another requirement.
    #[error("requirement '{site}' references footnote '{reference}'")]
    FootnoteReferenceMismatch {
        /// The name in the marker.
        site: String,
        /// The name in the footnote reference.
        reference: String,
    },

    /// A footnote names an invalid identifier.
    #[error("invalid footnote name '{0}'")]
    InvalidFootnoteName(String),

    /// A footnote does not start with a backticked hint.
    #[error("footnote '{0}' is missing its hint")]
    MissingHint(String),

    /// The coverer list of a footnote cannot be parsed.
    #[error("malformed coverer list in footnote '{0}'")]
    MalformedCoverers(String),

    /// A document contains two footnotes for the same requirement.
    #[error("duplicate footnote '{0}'")]
    DuplicateFootnote(String),

    /// A coverage tag names an invalid package or requirement.
    #[error("invalid coverage tag '{0}'")]
    InvalidCoverageTag(String),

    /// A manifest file is not a JSON object of strings.
    #[error("malformed manifest: {0}")]
    MalformedManifest(String),
}

/// A well-formed construct that violates a global invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}:{}: {}", .path.display(), .line, .kind)]
pub struct SemanticError {
    /// The file containing the error.
    pub path: PathBuf,
    /// One-based line number.
    pub line: usize,
    /// What went wrong.
    pub kind: SemanticErrorKind,
}

/// The kinds of semantic error the analyzer reports.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SemanticErrorKind {
    /// A requirement ID is declared by more than one site.
    #[error(
        "duplicate requirement '{}', first declared at {}:{}",
        .id,
        .first_path.display(),
        .first_line
    )]
    DuplicateRequirement {
        /// The duplicated ID.
        id: RequirementId,
        /// File of the first declaration.
        first_path: PathBuf,
        /// Line of the first declaration.
        first_line: usize,
    },

    /// A document declares requirements without a package header.
    #[error("missing package declaration")]
    MissingPackage,
}
