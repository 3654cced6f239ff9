use std::{ops::Range, path::PathBuf};

use crate::domain::{PackageId, RequirementId, RequirementName};

/// Coverage annotation state of a requirement site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteStatus {
    /// A plain `` `~Name~` `` marker with no annotation.
    Bare,
    /// Annotated as covered, pointing at a footnote.
    Covered,
    /// Annotated as uncovered, pointing at a footnote.
    Uncovered,
}

/// A requirement marker inside a markdown document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementSite {
    /// The requirement name; the package comes from the owning document.
    pub name: RequirementName,
    /// One-based line number.
    pub line: usize,
    /// Byte range of the whole marker (annotation included) within the line.
    pub span: Range<usize>,
    /// Current annotation state.
    pub status: SiteStatus,
    /// The raw status word, if the marker carries one.
    pub status_word: Option<String>,
}

/// One piece of coverage evidence listed in a footnote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverer {
    /// `file:line:type`
    pub label: String,
    /// Link to the covering line.
    pub url: String,
}

/// A footnote listing the coverage evidence for one requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageFootnote {
    /// The requirement name this footnote belongs to.
    pub name: RequirementName,
    /// One-based line number.
    pub line: usize,
    /// The hint text, without its surrounding backticks.
    pub hint: String,
    /// Coverers in document order.
    pub coverers: Vec<Coverer>,
    /// The full line as found on disk, without its line terminator.
    pub raw: String,
}

/// A coverage tag found in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageTag {
    /// The covered requirement.
    pub requirement: RequirementId,
    /// Free-form coverage type, such as `impl` or `test`.
    pub coverage_type: String,
    /// One-based line number.
    pub line: usize,
}

/// Which grammar a file was parsed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// A requirements document.
    Markdown,
    /// A source file that may carry coverage tags.
    Source,
}

/// Everything the scan learned about one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path of the file, below one of the scanned roots.
    pub path: PathBuf,
    /// Grammar used for the file.
    pub kind: FileKind,
    /// Package declared in the document header.
    pub package: Option<PackageId>,
    /// Requirement sites in line order.
    pub sites: Vec<RequirementSite>,
    /// Coverage footnotes in line order.
    pub footnotes: Vec<CoverageFootnote>,
    /// Coverage tags in line order.
    pub tags: Vec<CoverageTag>,
    /// Content hash reported by version control, for tracked source files.
    pub hash: Option<String>,
    /// Web URL of the file, for tracked source files.
    pub url: Option<String>,
    /// Path relative to the repository root, `/`-separated.
    pub relative_path: Option<String>,
}

impl FileRecord {
    /// Creates an empty record for a file.
    #[must_use]
    pub const fn new(path: PathBuf, kind: FileKind) -> Self {
        Self {
            path,
            kind,
            package: None,
            sites: Vec::new(),
            footnotes: Vec::new(),
            tags: Vec::new(),
            hash: None,
            url: None,
            relative_path: None,
        }
    }

    /// Returns the footnote for the given requirement name, if present.
    #[must_use]
    pub fn footnote(&self, name: &RequirementName) -> Option<&CoverageFootnote> {
        self.footnotes.iter().find(|footnote| &footnote.name == name)
    }
}
