//! Concurrent discovery and parsing of the scanned trees.
//!
//! Every directory below a root is one unit of work. Units are spread over a
//! fixed-size pool of workers; a worker handles all files of its directory in
//! file name order, so there is no contention inside a directory. The scan
//! returns only once every worker has finished, and merges their output in a
//! single place.

use std::{
    collections::{BTreeMap, btree_map::Entry},
    ffi::OsStr,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use rayon::{
    ThreadPoolBuildError, ThreadPoolBuilder,
    iter::{IntoParallelRefIterator, ParallelIterator},
};
use walkdir::WalkDir;

use crate::{
    domain::{Config, FileKind, FileRecord, SyntaxError, SyntaxErrorKind},
    parse::{markdown, source},
    storage::{MANIFEST_FILE_NAME, Manifest},
    vcs::VersionControl,
};

const MARKDOWN_EXTENSION: &str = "md";

/// A tree to scan, with the provider answering for its source files.
#[derive(Debug, Clone)]
pub struct ScanRoot {
    path: PathBuf,
    vcs: Option<Arc<dyn VersionControl>>,
}

impl ScanRoot {
    /// A root whose source files are looked up in `vcs`.
    #[must_use]
    pub fn new(path: PathBuf, vcs: Arc<dyn VersionControl>) -> Self {
        Self {
            path,
            vcs: Some(vcs),
        }
    }

    /// A root without version control; only its documents are scanned.
    #[must_use]
    pub const fn untracked(path: PathBuf) -> Self {
        Self { path, vcs: None }
    }

    /// The root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Everything a scan found.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// One record per parsed file, sorted by path.
    pub files: Vec<FileRecord>,
    /// Previously written manifests, keyed by their directory.
    pub manifests: BTreeMap<PathBuf, Manifest>,
    /// Syntax errors, sorted by path and line.
    pub errors: Vec<SyntaxError>,
}

/// Errors that stop a scan.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// A root or file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// The path that failed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The worker pool could not be started.
    #[error("failed to start scan workers: {0}")]
    Pool(#[from] ThreadPoolBuildError),
}

impl ScanError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Scans every root.
///
/// Roots are canonicalized, and a directory reachable from several roots is
/// scanned once.
///
/// # Errors
///
/// Returns an error if a root or a file cannot be read, or if the worker pool
/// cannot be created. Malformed content is not an error here; it is reported
/// in [`ScanResult::errors`].
pub fn scan(roots: &[ScanRoot], config: &Config) -> Result<ScanResult, ScanError> {
    let units = collect_units(roots)?;
    tracing::debug!("Scanning {} folders", units.len());

    let pool = ThreadPoolBuilder::new()
        .num_threads(config.workers().get())
        .thread_name(|index| format!("reqmd-scan-{index}"))
        .build()?;

    let units: Vec<_> = units.into_iter().collect();
    let folders: Vec<Result<FolderScan, ScanError>> = pool.install(|| {
        units
            .par_iter()
            .map(|(dir, vcs)| scan_folder(dir, vcs.as_deref(), config))
            .collect()
    });

    let mut result = ScanResult::default();
    for folder in folders {
        let folder = folder?;
        result.files.extend(folder.files);
        result.errors.extend(folder.errors);
        if let Some(manifest) = folder.manifest {
            result.manifests.insert(folder.dir, manifest);
        }
    }

    result.files.sort_by(|a, b| a.path.cmp(&b.path));
    result
        .errors
        .sort_by(|a, b| (&a.path, a.line).cmp(&(&b.path, b.line)));

    tracing::info!(
        "Scanned {} files, found {} syntax errors",
        result.files.len(),
        result.errors.len()
    );
    Ok(result)
}

type Units = BTreeMap<PathBuf, Option<Arc<dyn VersionControl>>>;

fn collect_units(roots: &[ScanRoot]) -> Result<Units, ScanError> {
    let mut units = Units::new();
    for root in roots {
        let path = fs::canonicalize(&root.path).map_err(ScanError::io(&root.path))?;
        let walk = WalkDir::new(&path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

        for entry in walk {
            let entry = entry.map_err(|e| {
                let failed = e.path().unwrap_or(path.as_path()).to_path_buf();
                ScanError::Io {
                    path: failed,
                    source: e.into(),
                }
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            match units.entry(entry.into_path()) {
                Entry::Vacant(entry) => {
                    entry.insert(root.vcs.clone());
                }
                Entry::Occupied(mut entry) => {
                    if entry.get().is_none() {
                        entry.insert(root.vcs.clone());
                    }
                }
            }
        }
    }
    Ok(units)
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_str().is_some_and(|name| name.starts_with('.'))
}

struct FolderScan {
    dir: PathBuf,
    files: Vec<FileRecord>,
    manifest: Option<Manifest>,
    errors: Vec<SyntaxError>,
}

fn scan_folder(
    dir: &Path,
    vcs: Option<&dyn VersionControl>,
    config: &Config,
) -> Result<FolderScan, ScanError> {
    let mut folder = FolderScan {
        dir: dir.to_path_buf(),
        files: Vec::new(),
        manifest: None,
        errors: Vec::new(),
    };

    let mut entries = fs::read_dir(dir)
        .and_then(|entries| entries.collect::<io::Result<Vec<_>>>())
        .map_err(ScanError::io(dir))?;
    entries.sort_by_key(fs::DirEntry::file_name);

    for entry in entries {
        let path = entry.path();
        let metadata = entry.metadata().map_err(ScanError::io(&path))?;
        if !metadata.is_file() {
            continue;
        }

        if entry.file_name() == MANIFEST_FILE_NAME {
            let Some(text) = read_text(&path)? else {
                continue;
            };
            match Manifest::parse(&text) {
                Ok(manifest) => folder.manifest = Some(manifest),
                Err(e) => folder.errors.push(SyntaxError::new(
                    path,
                    1,
                    SyntaxErrorKind::MalformedManifest(e.to_string()),
                )),
            }
            continue;
        }

        let Some(extension) = path.extension().and_then(OsStr::to_str) else {
            continue;
        };
        if !config.is_extension_allowed(extension) {
            continue;
        }
        if metadata.len() > config.max_file_size() {
            tracing::debug!(
                "Skipping {} ({} bytes exceeds the size limit)",
                path.display(),
                metadata.len()
            );
            continue;
        }

        if extension.eq_ignore_ascii_case(MARKDOWN_EXTENSION) {
            let Some(text) = read_text(&path)? else {
                continue;
            };
            let parsed = markdown::parse(&path, &text);
            let mut record = FileRecord::new(path, FileKind::Markdown);
            record.package = parsed.package;
            record.sites = parsed.sites;
            record.footnotes = parsed.footnotes;
            folder.errors.extend(parsed.errors);
            folder.files.push(record);
        } else {
            let Some(vcs) = vcs else {
                continue;
            };
            let Some(hash) = vcs.hash(&path) else {
                tracing::debug!("Skipping untracked {}", path.display());
                continue;
            };
            let Some(text) = read_text(&path)? else {
                continue;
            };
            let parsed = source::parse(&path, &text);
            let mut record = FileRecord::new(path, FileKind::Source);
            record.url = vcs.file_url(&record.path);
            record.relative_path = vcs.relative_path(&record.path);
            record.hash = Some(hash);
            record.tags = parsed.tags;
            folder.errors.extend(parsed.errors);
            folder.files.push(record);
        }
    }

    Ok(folder)
}

/// Reads a file as UTF-8, returning `None` for binary content.
fn read_text(path: &Path) -> Result<Option<String>, ScanError> {
    let bytes = fs::read(path).map_err(ScanError::io(path))?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(Some(text)),
        Err(_) => {
            tracing::debug!("Skipping non UTF-8 file {}", path.display());
            Ok(None)
        }
    }
}
