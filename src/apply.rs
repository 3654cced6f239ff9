//! Writing planned actions back to disk.
//!
//! Actions are grouped by file and each file is read, patched and written
//! once. Every in-place edit first re-parses its target line and checks that
//! it still holds the expected site or footnote, so a file edited between
//! scan and apply is refused rather than corrupted.

use std::{
    io,
    path::{Path, PathBuf},
};

use crate::{
    analyze::Action,
    domain::RequirementId,
    parse::markdown::{parse_footnote_line, parse_line_sites},
    storage::{Manifest, ManifestError, TextFile},
};

/// Errors that stop applying actions.
///
/// Files handled before the failing one have already been written.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// The target line no longer exists.
    #[error("{}:{line}: line no longer exists", .path.display())]
    LineDrift {
        /// The document.
        path: PathBuf,
        /// The missing line.
        line: usize,
    },

    /// The target line no longer holds the expected construct.
    #[error("{}:{line}: expected {expected} for '{requirement}'", .path.display())]
    UnexpectedContent {
        /// The document.
        path: PathBuf,
        /// The line that changed.
        line: usize,
        /// The requirement the action was for.
        requirement: RequirementId,
        /// What the line should have held.
        expected: &'static str,
    },

    /// A document could not be read or written.
    #[error("failed to update {}: {source}", .path.display())]
    Io {
        /// The document.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A manifest could not be read or written.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Applies actions, one file at a time, in the order files first appear.
///
/// Returns the number of files written.
///
/// # Errors
///
/// Stops at the first file that cannot be patched or written. That file is
/// left untouched.
pub fn apply(actions: &[Action]) -> Result<usize, ApplyError> {
    let groups = group_by_file(actions);
    for (path, actions) in &groups {
        let is_manifest = actions.iter().any(|action| {
            matches!(
                action,
                Action::UpsertManifestEntry { .. } | Action::DeleteManifestEntry { .. }
            )
        });
        if is_manifest {
            apply_to_manifest(path, actions)?;
        } else {
            apply_to_document(path, actions)?;
        }
        tracing::debug!("Updated {} ({} actions)", path.display(), actions.len());
    }
    Ok(groups.len())
}

fn group_by_file(actions: &[Action]) -> Vec<(&Path, Vec<&Action>)> {
    let mut groups: Vec<(&Path, Vec<&Action>)> = Vec::new();
    for action in actions {
        let path = action.path();
        match groups.iter_mut().find(|(existing, _)| *existing == path) {
            Some((_, group)) => group.push(action),
            None => groups.push((path, vec![action])),
        }
    }
    groups
}

fn apply_to_manifest(path: &Path, actions: &[&Action]) -> Result<(), ApplyError> {
    let mut manifest = Manifest::load(path)?.unwrap_or_default();
    for action in actions {
        match action {
            Action::UpsertManifestEntry { url, hash, .. } => {
                manifest.insert(url.clone(), hash.clone());
            }
            Action::DeleteManifestEntry { url, .. } => manifest.remove(url),
            Action::UpsertSite { .. } | Action::UpsertFootnote { .. } => {}
        }
    }
    manifest.save(path)?;
    Ok(())
}

fn apply_to_document(path: &Path, actions: &[&Action]) -> Result<(), ApplyError> {
    let io_error = |source| ApplyError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = TextFile::load(path).map_err(io_error)?;
    let mut appended = Vec::new();

    for action in actions {
        match action {
            Action::UpsertSite {
                line,
                requirement,
                payload,
                ..
            } => {
                let text = file.line(*line).ok_or_else(|| ApplyError::LineDrift {
                    path: path.to_path_buf(),
                    line: *line,
                })?;
                // Any malformed marker on the line counts as drift.
                let span = parse_line_sites(text, *line)
                    .into_iter()
                    .collect::<Result<Vec<_>, _>>()
                    .ok()
                    .and_then(|sites| {
                        sites
                            .into_iter()
                            .find(|site| &site.name == requirement.name())
                    })
                    .map(|site| site.span);
                let replaced = span.is_some_and(|span| file.replace(*line, span, payload));
                if !replaced {
                    return Err(unexpected(path, *line, requirement, "a requirement site"));
                }
            }
            Action::UpsertFootnote {
                line: 0, payload, ..
            } => appended.push(payload.clone()),
            Action::UpsertFootnote {
                line,
                requirement,
                payload,
                ..
            } => {
                let text = file.line(*line).ok_or_else(|| ApplyError::LineDrift {
                    path: path.to_path_buf(),
                    line: *line,
                })?;
                let len = text.len();
                let matches = matches!(
                    parse_footnote_line(text, *line),
                    Some(Ok(footnote)) if &footnote.name == requirement.name()
                );
                if !matches || !file.replace(*line, 0..len, payload) {
                    return Err(unexpected(path, *line, requirement, "a footnote"));
                }
            }
            Action::UpsertManifestEntry { .. } | Action::DeleteManifestEntry { .. } => {}
        }
    }

    file.append_footnotes(appended);
    file.save(path).map_err(io_error)
}

fn unexpected(
    path: &Path,
    line: usize,
    requirement: &RequirementId,
    expected: &'static str,
) -> ApplyError {
    ApplyError::UnexpectedContent {
        path: path.to_path_buf(),
        line,
        requirement: requirement.clone(),
        expected,
    }
}
