//! Requirement document grammar.
//!
//! A document optionally starts with a header block declaring its package:
//!
//! ````text
//! ```markdown
//! reqmd.package: server.api.v2
//! ```
//! ````
//!
//! The body may contain requirement sites, either bare or annotated:
//!
//! ```text
//! `~Post.handler~`
//! `~Post.handler~`covered[^~Post.handler~]✅
//! `~Post.handler~`uncvrd[^~Post.handler~]❓
//! ```
//!
//! and coverage footnotes:
//!
//! ```text
//! [^~Post.handler~]: `[~server.api.v2/Post.handler~impl]` [api/post.go:42:impl](https://…#L42)
//! ```

use std::{collections::HashSet, path::Path, sync::LazyLock};

use regex::Regex;

use crate::domain::{
    CoverageFootnote, Coverer, PackageId, RequirementId, RequirementName, RequirementSite,
    SiteStatus, SyntaxError, SyntaxErrorKind,
};

const PACKAGE_PREFIX: &str = "reqmd.package:";
const FENCE: &str = "```";

const COVERED: &str = "covered";
const UNCOVERED: &str = "uncvrd";
const COVERED_GLYPH: &str = "✅";
const UNCOVERED_GLYPH: &str = "❓";

static SITE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"`~([^~`]+)~`([A-Za-z]*)(\[\^~([^~\]]*)~\])?(✅|❓)?")
        .expect("site pattern is valid")
});

static FOOTNOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\^~([^~\]]+)~\]:(.*)$").expect("footnote pattern is valid"));

static COVERER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[((?:[^\]\\]|\\.)*)\]\(([^)\s]*)\)").expect("coverer pattern is valid")
});

/// The result of parsing one document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedMarkdown {
    /// Package declared in the header.
    pub package: Option<PackageId>,
    /// Requirement sites in line order.
    pub sites: Vec<RequirementSite>,
    /// Coverage footnotes in line order.
    pub footnotes: Vec<CoverageFootnote>,
    /// Every syntax error found, in line order.
    pub errors: Vec<SyntaxError>,
}

/// Parses a requirements document.
///
/// Errors are collected and parsing continues with the next construct; a
/// malformed line never hides the rest of the document.
#[must_use]
pub fn parse(path: &Path, text: &str) -> ParsedMarkdown {
    let lines: Vec<&str> = text.lines().collect();
    let mut parsed = ParsedMarkdown::default();
    let error = |line: usize, kind: SyntaxErrorKind| {
        SyntaxError::new(path.to_path_buf(), line, kind)
    };

    let (package, body_start) = match parse_header(&lines) {
        Header::Missing => (None, 0),
        Header::Declared { package, body_start } => (Some(package), body_start),
        Header::Invalid { line, value, body_start } => {
            parsed
                .errors
                .push(error(line, SyntaxErrorKind::InvalidPackage(value)));
            (None, body_start)
        }
    };
    parsed.package = package;

    let mut footnote_names = HashSet::new();
    for (index, line) in lines.iter().enumerate().skip(body_start) {
        let line_no = index + 1;

        if let Some(footnote) = parse_footnote_line(line, line_no) {
            match footnote {
                Ok(footnote) => {
                    if footnote_names.insert(footnote.name.clone()) {
                        parsed.footnotes.push(footnote);
                    } else {
                        parsed.errors.push(error(
                            line_no,
                            SyntaxErrorKind::DuplicateFootnote(footnote.name.to_string()),
                        ));
                    }
                }
                Err(kind) => parsed.errors.push(error(line_no, kind)),
            }
            continue;
        }

        for site in parse_line_sites(line, line_no) {
            match site {
                Ok(site) => parsed.sites.push(site),
                Err(kind) => parsed.errors.push(error(line_no, kind)),
            }
        }
    }

    parsed
}

enum Header {
    Missing,
    Declared {
        package: PackageId,
        body_start: usize,
    },
    Invalid {
        line: usize,
        value: String,
        body_start: usize,
    },
}

fn parse_header(lines: &[&str]) -> Header {
    let Some(start) = lines.iter().position(|line| !line.trim().is_empty()) else {
        return Header::Missing;
    };

    let is_fence = |index: usize| {
        lines
            .get(index)
            .is_some_and(|line| line.trim_start().starts_with(FENCE))
    };
    if !is_fence(start) || !is_fence(start + 2) {
        return Header::Missing;
    }
    let Some(value) = lines
        .get(start + 1)
        .and_then(|line| line.trim().strip_prefix(PACKAGE_PREFIX))
        .map(str::trim)
    else {
        return Header::Missing;
    };

    let body_start = start + 3;
    match value.parse() {
        Ok(package) => Header::Declared {
            package,
            body_start,
        },
        Err(_) => Header::Invalid {
            line: start + 2,
            value: value.to_string(),
            body_start,
        },
    }
}

/// Parses every requirement site on one line.
///
/// Each entry is either a site or the reason its marker is malformed.
#[must_use]
pub fn parse_line_sites(
    line: &str,
    line_no: usize,
) -> Vec<Result<RequirementSite, SyntaxErrorKind>> {
    SITE.captures_iter(line)
        .map(|captures| {
            let whole = captures.get(0).expect("group 0 always participates");
            let name = &captures[1];
            let status = captures.get(2).map_or("", |m| m.as_str());
            let reference = captures.get(4).map(|m| m.as_str());
            let glyph = captures.get(5).map(|m| m.as_str());

            let name: RequirementName = name
                .parse()
                .map_err(|_| SyntaxErrorKind::InvalidRequirementName(name.to_string()))?;

            let annotated = reference.is_some()
                || glyph.is_some()
                || status == COVERED
                || status == UNCOVERED;

            if !annotated {
                // Any word glued to the marker is prose, not part of the site.
                let end = captures.get(2).map_or(whole.end(), |m| m.start());
                return Ok(RequirementSite {
                    name,
                    line: line_no,
                    span: whole.start()..end,
                    status: SiteStatus::Bare,
                    status_word: None,
                });
            }

            let (Some(reference), Some(glyph)) = (reference, glyph) else {
                return Err(SyntaxErrorKind::IncompleteAnnotation(
                    whole.as_str().to_string(),
                ));
            };
            if status.is_empty() {
                return Err(SyntaxErrorKind::IncompleteAnnotation(
                    whole.as_str().to_string(),
                ));
            }
            if reference != name.as_str() {
                return Err(SyntaxErrorKind::FootnoteReferenceMismatch {
                    site: name.to_string(),
                    reference: reference.to_string(),
                });
            }
            let status_kind = match (status, glyph) {
                (COVERED, COVERED_GLYPH) => SiteStatus::Covered,
                (UNCOVERED, UNCOVERED_GLYPH) => SiteStatus::Uncovered,
                _ => {
                    return Err(SyntaxErrorKind::StatusMismatch {
                        status: status.to_string(),
                        glyph: glyph.to_string(),
                    });
                }
            };

            Ok(RequirementSite {
                name,
                line: line_no,
                span: whole.range(),
                status: status_kind,
                status_word: Some(status.to_string()),
            })
        })
        .collect()
}

/// Returns `true` if the line is shaped like a coverage footnote, valid or not.
#[must_use]
pub fn is_footnote_line(line: &str) -> bool {
    FOOTNOTE.is_match(line)
}

/// Parses a footnote line.
///
/// Returns `None` if the line is not a footnote at all.
#[must_use]
pub fn parse_footnote_line(
    line: &str,
    line_no: usize,
) -> Option<Result<CoverageFootnote, SyntaxErrorKind>> {
    let captures = FOOTNOTE.captures(line)?;
    let name = &captures[1];
    let rest = &captures[2];

    let Ok(name) = name.parse::<RequirementName>() else {
        return Some(Err(SyntaxErrorKind::InvalidFootnoteName(name.to_string())));
    };

    let Some((hint, tail)) = rest
        .trim_start()
        .strip_prefix('`')
        .and_then(|after| after.split_once('`'))
    else {
        return Some(Err(SyntaxErrorKind::MissingHint(name.to_string())));
    };

    let Some(coverers) = parse_coverers(tail) else {
        return Some(Err(SyntaxErrorKind::MalformedCoverers(name.to_string())));
    };

    Some(Ok(CoverageFootnote {
        name,
        line: line_no,
        hint: hint.to_string(),
        coverers,
        raw: line.trim_end_matches('\r').to_string(),
    }))
}

fn parse_coverers(text: &str) -> Option<Vec<Coverer>> {
    let mut rest = text.trim();
    let mut coverers = Vec::new();
    while !rest.is_empty() {
        let captures = COVERER.captures(rest)?;
        coverers.push(Coverer {
            label: unescape_label(&captures[1]),
            url: captures[2].to_string(),
        });
        rest = rest[captures[0].len()..].trim_start();
        if rest.is_empty() {
            break;
        }
        rest = rest.strip_prefix(',')?.trim_start();
        if rest.is_empty() {
            return None;
        }
    }
    Some(coverers)
}

/// Backslash-escapes the characters that would end or nest a link label.
fn escape_label(label: &str) -> String {
    let mut escaped = String::with_capacity(label.len());
    for c in label.chars() {
        if matches!(c, '\\' | '[' | ']') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn unescape_label(label: &str) -> String {
    let mut unescaped = String::with_capacity(label.len());
    let mut chars = label.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            unescaped.extend(chars.next());
        } else {
            unescaped.push(c);
        }
    }
    unescaped
}

/// The hint placed at the start of every footnote: the tag to paste into
/// source code to cover the requirement.
#[must_use]
pub fn hint(requirement: &RequirementId) -> String {
    format!("[~{requirement}~impl]")
}

/// Renders a requirement site marker.
#[must_use]
pub fn render_site(name: &RequirementName, status: SiteStatus) -> String {
    match status {
        SiteStatus::Bare => format!("`~{name}~`"),
        SiteStatus::Covered => format!("`~{name}~`{COVERED}[^~{name}~]{COVERED_GLYPH}"),
        SiteStatus::Uncovered => format!("`~{name}~`{UNCOVERED}[^~{name}~]{UNCOVERED_GLYPH}"),
    }
}

/// Renders a complete footnote line.
#[must_use]
pub fn render_footnote(name: &RequirementName, hint: &str, coverers: &[Coverer]) -> String {
    let mut line = format!("[^~{name}~]: `{hint}`");
    if !coverers.is_empty() {
        let list = coverers
            .iter()
            .map(|coverer| format!("[{}]({})", escape_label(&coverer.label), coverer.url))
            .collect::<Vec<_>>()
            .join(", ");
        line.push(' ');
        line.push_str(&list);
    }
    line
}
