//! Version control queries.
//!
//! The scan needs two things from version control: the content hash of each
//! tracked source file, and the web URL that file can be browsed at. Both are
//! answered by a [`VersionControl`] provider, opened once per scanned root.

use std::{
    collections::HashMap,
    fmt, io,
    path::{Component, Path, PathBuf},
    process::Command,
};

use crate::location::{LocationError, LocationResolver};

/// Answers per-file questions about one repository.
///
/// Implementations are queried concurrently by the scan workers.
pub trait VersionControl: Send + Sync + fmt::Debug {
    /// Returns the content hash of a tracked file, or `None` if the file is not
    /// tracked.
    fn hash(&self, path: &Path) -> Option<String>;

    /// Returns the `/`-separated path of a file relative to the repository
    /// root, or `None` if the file lies outside the repository.
    fn relative_path(&self, path: &Path) -> Option<String>;

    /// The resolver producing file URLs for this repository.
    fn location(&self) -> &LocationResolver;

    /// Returns the web URL of a file inside the repository.
    fn file_url(&self, path: &Path) -> Option<String> {
        self.relative_path(path)
            .map(|relative| self.location().file_url(&relative))
    }
}

/// Errors raised while opening a repository.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// The `git` executable could not be started.
    #[error("failed to run git: {0}")]
    Spawn(#[source] io::Error),

    /// A git command exited unsuccessfully.
    #[error("`git {command}` failed in {}: {stderr}", .cwd.display())]
    Command {
        /// The arguments passed to git.
        command: String,
        /// The working directory.
        cwd: PathBuf,
        /// Captured standard error.
        stderr: String,
    },

    /// The repository has no remote to derive URLs from.
    #[error("repository at {} has no remote", .0.display())]
    NoRemote(PathBuf),

    /// The repository root could not be resolved.
    #[error("cannot resolve repository root {}: {source}", .path.display())]
    Io {
        /// The path that failed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The remote URL could not be turned into a file URL layout.
    #[error(transparent)]
    Location(#[from] LocationError),
}

/// A git working tree, queried through the `git` executable.
///
/// All git commands run once, when the repository is opened; per-file queries
/// are lookups into the index snapshot taken then.
#[derive(Debug)]
pub struct Git {
    toplevel: PathBuf,
    location: LocationResolver,
    hashes: HashMap<String, String>,
}

impl Git {
    /// Opens the repository containing `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not inside a git working tree, the
    /// repository has no usable remote, or the remote URL is not understood.
    pub fn open(root: &Path) -> Result<Self, VcsError> {
        let toplevel = run_git(root, &["rev-parse", "--show-toplevel"])?;
        let toplevel = PathBuf::from(toplevel.trim());
        let toplevel = toplevel.canonicalize().map_err(|source| VcsError::Io {
            path: toplevel.clone(),
            source,
        })?;

        let remote = remote_url(&toplevel)?;
        let revision = revision(&toplevel)?;
        let location = LocationResolver::new(&remote, &revision)?;
        tracing::debug!(
            "Opened {} repository at {} ({})",
            location.family(),
            toplevel.display(),
            location.repo_root_folder_url()
        );

        let hashes = parse_ls_files(&run_git(&toplevel, &["ls-files", "-s", "-z"])?);

        Ok(Self {
            toplevel,
            location,
            hashes,
        })
    }

    /// The root of the working tree.
    #[must_use]
    pub fn toplevel(&self) -> &Path {
        &self.toplevel
    }
}

impl VersionControl for Git {
    fn hash(&self, path: &Path) -> Option<String> {
        let relative = self.relative_path(path)?;
        self.hashes.get(&relative).cloned()
    }

    fn relative_path(&self, path: &Path) -> Option<String> {
        relative_to(&self.toplevel, path)
    }

    fn location(&self) -> &LocationResolver {
        &self.location
    }
}

/// A provider backed by a fixed table of files and hashes.
///
/// Useful when hashes are known up front, and for exercising the pipeline
/// without a git checkout.
#[derive(Debug, Clone)]
pub struct StaticVcs {
    root: PathBuf,
    location: LocationResolver,
    hashes: HashMap<String, String>,
}

impl StaticVcs {
    /// Creates an empty provider for the repository rooted at `root`.
    #[must_use]
    pub fn new(root: PathBuf, location: LocationResolver) -> Self {
        Self {
            root,
            location,
            hashes: HashMap::new(),
        }
    }

    /// Marks a file, given relative to the root, as tracked with `hash`.
    #[must_use]
    pub fn with_file(mut self, relative_path: &str, hash: &str) -> Self {
        self.hashes
            .insert(relative_path.to_string(), hash.to_string());
        self
    }
}

impl VersionControl for StaticVcs {
    fn hash(&self, path: &Path) -> Option<String> {
        let relative = self.relative_path(path)?;
        self.hashes.get(&relative).cloned()
    }

    fn relative_path(&self, path: &Path) -> Option<String> {
        relative_to(&self.root, path)
    }

    fn location(&self) -> &LocationResolver {
        &self.location
    }
}

fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments = relative
        .components()
        .map(|component| match component {
            Component::Normal(segment) => segment.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(segments.join("/"))
}

fn run_git(cwd: &Path, args: &[&str]) -> Result<String, VcsError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(VcsError::Spawn)?;

    if !output.status.success() {
        return Err(VcsError::Command {
            command: args.join(" "),
            cwd: cwd.to_path_buf(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn remote_url(toplevel: &Path) -> Result<String, VcsError> {
    if let Ok(url) = run_git(toplevel, &["remote", "get-url", "origin"]) {
        return Ok(url.trim().to_string());
    }
    let remotes = run_git(toplevel, &["remote"])?;
    let first = remotes
        .lines()
        .map(str::trim)
        .find(|remote| !remote.is_empty())
        .ok_or_else(|| VcsError::NoRemote(toplevel.to_path_buf()))?;
    Ok(run_git(toplevel, &["remote", "get-url", first])?
        .trim()
        .to_string())
}

/// The commit `HEAD` points at. File URLs are pinned to it.
fn revision(toplevel: &Path) -> Result<String, VcsError> {
    Ok(run_git(toplevel, &["rev-parse", "HEAD"])?.trim().to_string())
}

/// Parses `git ls-files -s -z` output: `<mode> <object> <stage>\t<path>\0`.
fn parse_ls_files(output: &str) -> HashMap<String, String> {
    output
        .split('\0')
        .filter_map(|entry| {
            let (meta, path) = entry.split_once('\t')?;
            let hash = meta.split(' ').nth(1)?;
            Some((path.to_string(), hash.to_string()))
        })
        .collect()
}
