//! Planning the edits that bring documents in line with the code.
//!
//! The analyzer runs single-threaded over a finished scan. It validates the
//! requirement graph as a whole, then compares what each document currently
//! says with what the coverage tags say it should, and emits the minimal
//! ordered list of [`Action`]s that closes the gap. It never touches the disk.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
    path::{Path, PathBuf},
};

use crate::{
    domain::{
        CoverageTag, Coverer, FileKind, FileRecord, RequirementId, RequirementSite,
        SemanticError, SemanticErrorKind, SiteStatus,
    },
    location::line_url,
    parse::markdown::{hint, render_footnote, render_site},
    scan::ScanResult,
    storage::{MANIFEST_FILE_NAME, Manifest},
};

/// One edit to apply to the file set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Rewrite a requirement site marker in place.
    UpsertSite {
        /// The document.
        path: PathBuf,
        /// One-based line holding the marker.
        line: usize,
        /// The requirement the marker must still name.
        requirement: RequirementId,
        /// The new marker text.
        payload: String,
    },

    /// Rewrite a footnote in place, or append it when `line` is 0.
    UpsertFootnote {
        /// The document.
        path: PathBuf,
        /// One-based line holding the footnote, or 0 to append.
        line: usize,
        /// The requirement the footnote must still name.
        requirement: RequirementId,
        /// The complete new footnote line.
        payload: String,
    },

    /// Record a file URL and its hash in a manifest.
    UpsertManifestEntry {
        /// The manifest file.
        path: PathBuf,
        /// The cited file URL.
        url: String,
        /// The file's content hash.
        hash: String,
    },

    /// Drop a file URL from a manifest.
    DeleteManifestEntry {
        /// The manifest file.
        path: PathBuf,
        /// The file URL no longer cited.
        url: String,
    },
}

impl Action {
    /// The file this action modifies.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::UpsertSite { path, .. }
            | Self::UpsertFootnote { path, .. }
            | Self::UpsertManifestEntry { path, .. }
            | Self::DeleteManifestEntry { path, .. } => path,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpsertSite {
                path,
                line,
                payload,
                ..
            } => write!(f, "{}:{line}: site {payload}", path.display()),
            Self::UpsertFootnote {
                path,
                line: 0,
                payload,
                ..
            } => write!(f, "{}: append {payload}", path.display()),
            Self::UpsertFootnote {
                path,
                line,
                payload,
                ..
            } => write!(f, "{}:{line}: footnote {payload}", path.display()),
            Self::UpsertManifestEntry { path, url, hash } => {
                write!(f, "{}: set {url} = {hash}", path.display())
            }
            Self::DeleteManifestEntry { path, url } => {
                write!(f, "{}: remove {url}", path.display())
            }
        }
    }
}

/// The outcome of analysis.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Analysis {
    /// Edits, in the order they must be applied. Empty if there are errors.
    pub actions: Vec<Action>,
    /// Semantic errors, sorted by path and line.
    pub errors: Vec<SemanticError>,
}

type Site<'a> = (&'a FileRecord, &'a RequirementSite);
type Tag<'a> = (&'a FileRecord, &'a CoverageTag);

/// Analyzes a scan that produced no syntax errors.
#[must_use]
pub fn analyze(scan: &ScanResult) -> Analysis {
    let documents: Vec<&FileRecord> = scan
        .files
        .iter()
        .filter(|file| file.kind == FileKind::Markdown)
        .collect();

    let (requirements, mut errors) = index_requirements(&documents);
    if !errors.is_empty() {
        errors.sort_by(|a, b| (&a.path, a.line).cmp(&(&b.path, b.line)));
        return Analysis {
            actions: Vec::new(),
            errors,
        };
    }

    let coverage = index_coverage(&scan.files, &requirements);

    let mut actions = Vec::new();
    let mut cited: BTreeMap<&Path, Manifest> = BTreeMap::new();
    for (id, (document, site)) in requirements_in_document_order(&requirements) {
        let tags = coverage.get(id).map_or(&[][..], Vec::as_slice);

        let desired_status = if !tags.is_empty() {
            SiteStatus::Covered
        } else if site.status == SiteStatus::Covered {
            SiteStatus::Uncovered
        } else {
            continue;
        };

        let coverers: Vec<Coverer> = tags.iter().map(|(file, tag)| coverer(file, tag)).collect();
        if let Some(dir) = document.path.parent() {
            let manifest = cited.entry(dir).or_default();
            for (file, _) in tags {
                if let (Some(url), Some(hash)) = (&file.url, &file.hash) {
                    manifest.insert(url.clone(), hash.clone());
                }
            }
        }

        if site.status != desired_status {
            actions.push(Action::UpsertSite {
                path: document.path.clone(),
                line: site.line,
                requirement: id.clone(),
                payload: render_site(&site.name, desired_status),
            });
        }

        let footnote = render_footnote(&site.name, &hint(id), &coverers);
        match document.footnote(&site.name) {
            Some(existing) if existing.raw == footnote => {}
            existing => actions.push(Action::UpsertFootnote {
                path: document.path.clone(),
                line: existing.map_or(0, |existing| existing.line),
                requirement: id.clone(),
                payload: footnote,
            }),
        }
    }

    actions.extend(manifest_actions(scan, &documents, &cited));

    tracing::info!("Planned {} actions", actions.len());
    Analysis { actions, errors }
}

fn index_requirements<'a>(
    documents: &[&'a FileRecord],
) -> (BTreeMap<RequirementId, Site<'a>>, Vec<SemanticError>) {
    let mut requirements: BTreeMap<RequirementId, Site<'a>> = BTreeMap::new();
    let mut errors = Vec::new();

    for &document in documents {
        let Some(first) = document.sites.first() else {
            continue;
        };
        let Some(package) = &document.package else {
            errors.push(SemanticError {
                path: document.path.clone(),
                line: first.line,
                kind: SemanticErrorKind::MissingPackage,
            });
            continue;
        };

        for site in &document.sites {
            let id = RequirementId::new(package.clone(), site.name.clone());
            if let Some((first_file, first_site)) = requirements.get(&id) {
                errors.push(SemanticError {
                    path: document.path.clone(),
                    line: site.line,
                    kind: SemanticErrorKind::DuplicateRequirement {
                        id,
                        first_path: first_file.path.clone(),
                        first_line: first_site.line,
                    },
                });
            } else {
                requirements.insert(id, (document, site));
            }
        }
    }

    (requirements, errors)
}

/// Tags per requirement, ordered by file path then line.
///
/// Tags naming unknown requirements are dropped; they may belong to documents
/// scanned in another run.
fn index_coverage<'a>(
    files: &'a [FileRecord],
    requirements: &BTreeMap<RequirementId, Site<'a>>,
) -> HashMap<&'a RequirementId, Vec<Tag<'a>>> {
    let mut coverage: HashMap<&RequirementId, Vec<Tag<'a>>> = HashMap::new();
    for file in files.iter().filter(|file| file.kind == FileKind::Source) {
        for tag in &file.tags {
            if requirements.contains_key(&tag.requirement) {
                coverage.entry(&tag.requirement).or_default().push((file, tag));
            } else {
                tracing::trace!(
                    "Ignoring tag for unknown requirement {} at {}:{}",
                    tag.requirement,
                    file.path.display(),
                    tag.line
                );
            }
        }
    }
    for tags in coverage.values_mut() {
        tags.sort_by(|(a, x), (b, y)| (&a.path, x.line).cmp(&(&b.path, y.line)));
    }
    coverage
}

fn requirements_in_document_order<'a, 'b>(
    requirements: &'b BTreeMap<RequirementId, Site<'a>>,
) -> Vec<(&'b RequirementId, Site<'a>)> {
    let mut ordered: Vec<_> = requirements.iter().map(|(id, &site)| (id, site)).collect();
    ordered.sort_by(|(_, (a, x)), (_, (b, y))| {
        (&a.path, x.line, x.span.start).cmp(&(&b.path, y.line, y.span.start))
    });
    ordered
}

fn coverer(file: &FileRecord, tag: &CoverageTag) -> Coverer {
    let relative = file
        .relative_path
        .clone()
        .unwrap_or_else(|| file.path.display().to_string());
    Coverer {
        label: format!("{relative}:{}:{}", tag.line, tag.coverage_type),
        url: line_url(file.url.as_deref().unwrap_or_default(), tag.line),
    }
}

fn manifest_actions(
    scan: &ScanResult,
    documents: &[&FileRecord],
    cited: &BTreeMap<&Path, Manifest>,
) -> Vec<Action> {
    let dirs: BTreeSet<&Path> = documents
        .iter()
        .filter_map(|document| document.path.parent())
        .chain(scan.manifests.keys().map(PathBuf::as_path))
        .collect();

    let empty = Manifest::new();
    let mut actions = Vec::new();
    for dir in dirs {
        let desired = cited.get(dir).unwrap_or(&empty);
        let previous = scan.manifests.get(dir).unwrap_or(&empty);
        let path = dir.join(MANIFEST_FILE_NAME);

        for (url, hash) in desired.iter() {
            if previous.get(url) != Some(hash) {
                actions.push(Action::UpsertManifestEntry {
                    path: path.clone(),
                    url: url.to_string(),
                    hash: hash.to_string(),
                });
            }
        }
        for (url, _) in previous.iter() {
            if desired.get(url).is_none() {
                actions.push(Action::DeleteManifestEntry {
                    path: path.clone(),
                    url: url.to_string(),
                });
            }
        }
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{markdown, source};

    fn document(path: &str, text: &str) -> FileRecord {
        let path = PathBuf::from(path);
        let parsed = markdown::parse(&path, text);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        let mut record = FileRecord::new(path, FileKind::Markdown);
        record.package = parsed.package;
        record.sites = parsed.sites;
        record.footnotes = parsed.footnotes;
        record
    }

    fn source_file(relative: &str, text: &str, hash: &str) -> FileRecord {
        let path = PathBuf::from("/src").join(relative);
        let parsed = source::parse(&path, text);
        let mut record = FileRecord::new(path, FileKind::Source);
        record.tags = parsed.tags;
        record.hash = Some(hash.to_string());
        record.url = Some(format!("https://h/{relative}"));
        record.relative_path = Some(relative.to_string());
        record
    }

    fn scan_of(files: Vec<FileRecord>) -> ScanResult {
        let mut files = files;
        files.sort_by(|a, b| a.path.cmp(&b.path));
        ScanResult {
            files,
            ..ScanResult::default()
        }
    }

    const HEADER: &str = "```\nreqmd.package: pkg\n```\n";

    #[test]
    fn bare_site_with_tag_gets_annotated() {
        let scan = scan_of(vec![
            document("/docs/req.md", &format!("{HEADER}text `~A~` text\n")),
            source_file("a.go", "\n\n// [~pkg/A~impl]\n", "h1"),
        ]);

        let analysis = analyze(&scan);

        assert!(analysis.errors.is_empty());
        let id: RequirementId = "pkg/A".parse().unwrap();
        assert_eq!(
            analysis.actions,
            vec![
                Action::UpsertSite {
                    path: PathBuf::from("/docs/req.md"),
                    line: 4,
                    requirement: id.clone(),
                    payload: "`~A~`covered[^~A~]✅".to_string(),
                },
                Action::UpsertFootnote {
                    path: PathBuf::from("/docs/req.md"),
                    line: 0,
                    requirement: id,
                    payload: "[^~A~]: `[~pkg/A~impl]` [a.go:3:impl](https://h/a.go#L3)"
                        .to_string(),
                },
                Action::UpsertManifestEntry {
                    path: PathBuf::from("/docs/reqmdfiles.json"),
                    url: "https://h/a.go".to_string(),
                    hash: "h1".to_string(),
                },
            ]
        );
    }

    #[test]
    fn up_to_date_documents_need_no_actions() {
        let text = format!(
            "{HEADER}`~A~`covered[^~A~]✅\n\n[^~A~]: `[~pkg/A~impl]` [a.go:1:impl](https://h/a.go#L1)\n"
        );
        let mut scan = scan_of(vec![
            document("/docs/req.md", &text),
            source_file("a.go", "// [~pkg/A~impl]\n", "h1"),
        ]);
        scan.manifests.insert(
            PathBuf::from("/docs"),
            [("https://h/a.go".to_string(), "h1".to_string())]
                .into_iter()
                .collect(),
        );

        let analysis = analyze(&scan);
        assert!(analysis.errors.is_empty());
        assert!(analysis.actions.is_empty(), "{:?}", analysis.actions);
    }

    #[test]
    fn duplicate_requirement_is_one_error_and_no_actions() {
        let scan = scan_of(vec![
            document("/docs/a.md", &format!("{HEADER}`~A~`\n")),
            document("/docs/b.md", &format!("{HEADER}`~A~`\n")),
            source_file("a.go", "// [~pkg/A~impl]\n", "h1"),
        ]);

        let analysis = analyze(&scan);

        assert!(analysis.actions.is_empty());
        assert_eq!(analysis.errors.len(), 1);
        let error = &analysis.errors[0];
        assert_eq!(error.path, PathBuf::from("/docs/b.md"));
        assert_eq!(
            error.kind,
            SemanticErrorKind::DuplicateRequirement {
                id: "pkg/A".parse().unwrap(),
                first_path: PathBuf::from("/docs/a.md"),
                first_line: 4,
            }
        );
    }

    #[test]
    fn sites_without_package_are_reported_once_per_document() {
        let scan = scan_of(vec![document("/docs/a.md", "intro\n`~A~`\n`~B~`\n")]);

        let analysis = analyze(&scan);

        assert!(analysis.actions.is_empty());
        assert_eq!(
            analysis.errors,
            vec![SemanticError {
                path: PathBuf::from("/docs/a.md"),
                line: 2,
                kind: SemanticErrorKind::MissingPackage,
            }]
        );
    }

    #[test]
    fn documents_without_sites_need_no_package() {
        let scan = scan_of(vec![document("/docs/readme.md", "# Hello\n")]);
        let analysis = analyze(&scan);
        assert!(analysis.errors.is_empty());
        assert!(analysis.actions.is_empty());
    }

    #[test]
    fn coverers_are_ordered_by_file_path() {
        let scan = scan_of(vec![
            document("/docs/req.md", &format!("{HEADER}`~A~`\n")),
            source_file("z_test.go", "// [~pkg/A~test]\n", "h2"),
            source_file("a.go", "\n// [~pkg/A~impl]\n", "h1"),
        ]);

        let analysis = analyze(&scan);

        let footnote = analysis
            .actions
            .iter()
            .find_map(|action| match action {
                Action::UpsertFootnote { payload, .. } => Some(payload.as_str()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            footnote,
            "[^~A~]: `[~pkg/A~impl]` [a.go:2:impl](https://h/a.go#L2), [z_test.go:1:test](https://h/z_test.go#L1)"
        );
    }

    #[test]
    fn covered_site_without_tags_regresses() {
        let text = format!(
            "{HEADER}`~A~`covered[^~A~]✅\n\n[^~A~]: `[~pkg/A~impl]` [a.go:1:impl](https://h/a.go#L1)\n"
        );
        let mut scan = scan_of(vec![
            document("/docs/req.md", &text),
            source_file("a.go", "// nothing here\n", "h2"),
        ]);
        scan.manifests.insert(
            PathBuf::from("/docs"),
            [("https://h/a.go".to_string(), "h1".to_string())]
                .into_iter()
                .collect(),
        );

        let analysis = analyze(&scan);
        let id: RequirementId = "pkg/A".parse().unwrap();
        assert_eq!(
            analysis.actions,
            vec![
                Action::UpsertSite {
                    path: PathBuf::from("/docs/req.md"),
                    line: 4,
                    requirement: id.clone(),
                    payload: "`~A~`uncvrd[^~A~]❓".to_string(),
                },
                Action::UpsertFootnote {
                    path: PathBuf::from("/docs/req.md"),
                    line: 6,
                    requirement: id,
                    payload: "[^~A~]: `[~pkg/A~impl]`".to_string(),
                },
                Action::DeleteManifestEntry {
                    path: PathBuf::from("/docs/reqmdfiles.json"),
                    url: "https://h/a.go".to_string(),
                },
            ]
        );
    }

    #[test]
    fn uncovered_and_bare_sites_without_tags_are_left_alone() {
        let text = format!("{HEADER}`~A~`uncvrd[^~A~]❓ `~B~`\n\n[^~A~]: `[~pkg/A~impl]`\n");
        let scan = scan_of(vec![document("/docs/req.md", &text)]);
        assert!(analyze(&scan).actions.is_empty());
    }

    #[test]
    fn tags_for_unknown_requirements_are_ignored() {
        let scan = scan_of(vec![
            document("/docs/req.md", &format!("{HEADER}`~A~`\n")),
            source_file("a.go", "// [~other/X~impl]\n", "h1"),
        ]);
        let analysis = analyze(&scan);
        assert!(analysis.errors.is_empty());
        assert!(analysis.actions.is_empty());
    }

    #[test]
    fn changed_hash_updates_manifest_only() {
        let text = format!(
            "{HEADER}`~A~`covered[^~A~]✅\n\n[^~A~]: `[~pkg/A~impl]` [a.go:1:impl](https://h/a.go#L1)\n"
        );
        let mut scan = scan_of(vec![
            document("/docs/req.md", &text),
            source_file("a.go", "// [~pkg/A~impl]\n", "new"),
        ]);
        scan.manifests.insert(
            PathBuf::from("/docs"),
            [("https://h/a.go".to_string(), "old".to_string())]
                .into_iter()
                .collect(),
        );

        assert_eq!(
            analyze(&scan).actions,
            vec![Action::UpsertManifestEntry {
                path: PathBuf::from("/docs/reqmdfiles.json"),
                url: "https://h/a.go".to_string(),
                hash: "new".to_string(),
            }]
        );
    }

    #[test]
    fn stale_footnote_is_rewritten_in_place() {
        let text = format!(
            "{HEADER}`~A~`covered[^~A~]✅\n\n[^~A~]: `[~pkg/A~impl]` [a.go:9:impl](https://h/a.go#L9)\n"
        );
        let scan = scan_of(vec![
            document("/docs/req.md", &text),
            source_file("a.go", "// [~pkg/A~impl]\n", "h1"),
        ]);

        let actions = analyze(&scan).actions;
        assert!(matches!(
            &actions[0],
            Action::UpsertFootnote { line: 6, payload, .. }
                if payload.ends_with("[a.go:1:impl](https://h/a.go#L1)")
        ));
    }

    #[test]
    fn actions_follow_document_order() {
        let scan = scan_of(vec![
            document("/docs/b.md", &format!("{HEADER}`~B~`\n")),
            document("/docs/a.md", &format!("{HEADER}`~Z~`\n`~C~`\n")),
            source_file("x.go", "[~pkg/B~impl] [~pkg/C~impl] [~pkg/Z~impl]\n", "h"),
        ]);

        let sites: Vec<_> = analyze(&scan)
            .actions
            .iter()
            .filter_map(|action| match action {
                Action::UpsertSite {
                    path, requirement, ..
                } => Some((path.clone(), requirement.to_string())),
                _ => None,
            })
            .collect();
        assert_eq!(
            sites,
            vec![
                (PathBuf::from("/docs/a.md"), "pkg/Z".to_string()),
                (PathBuf::from("/docs/a.md"), "pkg/C".to_string()),
                (PathBuf::from("/docs/b.md"), "pkg/B".to_string()),
            ]
        );
    }
}
