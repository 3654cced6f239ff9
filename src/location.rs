//! Stable web URLs for files in hosted repositories.
//!
//! A [`LocationResolver`] is built once per repository from its remote URL and
//! revision, and then maps repository-relative paths to file URLs. The shape of
//! the URL depends on the hosting provider, which is guessed from the remote's
//! host name.

use std::fmt;

use url::Url;

/// A family of hosting providers sharing one file URL layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostFamily {
    /// `<repo>/blob/<revision>/<path>`; also used for unknown hosts.
    GitHub,
    /// `<repo>/-/blob/<revision>/<path>`
    GitLab,
    /// `<repo>/src/<revision>/<path>`
    Bitbucket,
    /// `<repo>/src/commit/<revision>/<path>`
    Gitea,
}

impl HostFamily {
    /// Picks the family for a host name.
    #[must_use]
    pub fn from_host(host: &str) -> Self {
        let host = host.to_ascii_lowercase();
        if host.contains("gitlab") {
            Self::GitLab
        } else if host.contains("bitbucket") {
            Self::Bitbucket
        } else if host.contains("gitea") || host.contains("codeberg") {
            Self::Gitea
        } else {
            Self::GitHub
        }
    }

    const fn prefix(self) -> &'static [&'static str] {
        match self {
            Self::GitHub => &["blob"],
            Self::GitLab => &["-", "blob"],
            Self::Bitbucket => &["src"],
            Self::Gitea => &["src", "commit"],
        }
    }
}

impl fmt::Display for HostFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GitHub => "github",
            Self::GitLab => "gitlab",
            Self::Bitbucket => "bitbucket",
            Self::Gitea => "gitea",
        };
        f.write_str(name)
    }
}

/// Errors raised while interpreting a remote URL.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LocationError {
    /// The remote URL is neither an http(s)/ssh URL nor an scp-like address.
    #[error("unsupported remote URL '{0}'")]
    Unsupported(String),

    /// The remote URL has no repository path.
    #[error("remote URL '{0}' does not name a repository")]
    MissingRepository(String),

    /// The revision is empty.
    #[error("empty revision for remote '{0}'")]
    EmptyRevision(String),
}

/// Turns repository-relative paths into stable file URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationResolver {
    family: HostFamily,
    root_folder: Url,
}

impl LocationResolver {
    /// Creates a resolver for the repository behind `remote` at `revision`.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote URL cannot be understood or the revision
    /// is empty.
    pub fn new(remote: &str, revision: &str) -> Result<Self, LocationError> {
        let mut root_folder = normalize_remote(remote)?;
        let family = HostFamily::from_host(root_folder.host_str().unwrap_or_default());

        let revision = revision.trim();
        if revision.is_empty() {
            return Err(LocationError::EmptyRevision(remote.to_string()));
        }

        root_folder
            .path_segments_mut()
            .map_err(|()| LocationError::Unsupported(remote.to_string()))?
            .pop_if_empty()
            .extend(family.prefix())
            .extend(revision.split('/'));

        Ok(Self {
            family,
            root_folder,
        })
    }

    /// The hosting provider family the URL layout was chosen for.
    #[must_use]
    pub const fn family(&self) -> HostFamily {
        self.family
    }

    /// The URL of the repository root at the resolver's revision.
    #[must_use]
    pub fn repo_root_folder_url(&self) -> &str {
        self.root_folder.as_str()
    }

    /// The URL of a file, given its `/`-separated repository-relative path.
    ///
    /// Parentheses are percent-encoded as well, so the URL can be the target
    /// of a markdown link.
    #[must_use]
    pub fn file_url(&self, relative_path: &str) -> String {
        let mut url = self.root_folder.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend(relative_path.split('/').filter(|s| !s.is_empty()));
        }
        let path = url.path().replace('(', "%28").replace(')', "%29");
        url.set_path(&path);
        url.into()
    }
}

/// The URL of one line within a file URL.
#[must_use]
pub fn line_url(file_url: &str, line: usize) -> String {
    format!("{file_url}#L{line}")
}

/// Rewrites any supported remote form into `https://host/owner/repo`.
fn normalize_remote(remote: &str) -> Result<Url, LocationError> {
    let trimmed = remote.trim();
    let unsupported = || LocationError::Unsupported(remote.to_string());

    let (host, port, path) = if trimmed.contains("://") {
        let parsed = Url::parse(trimmed).map_err(|_| unsupported())?;
        let keep_port = matches!(parsed.scheme(), "http" | "https");
        if !matches!(parsed.scheme(), "http" | "https" | "ssh" | "git" | "git+ssh") {
            return Err(unsupported());
        }
        let host = parsed.host_str().ok_or_else(unsupported)?.to_string();
        let port = if keep_port { parsed.port() } else { None };
        (host, port, parsed.path().to_string())
    } else {
        // scp-like: [user@]host:owner/repo.git
        let (authority, path) = trimmed.split_once(':').ok_or_else(unsupported)?;
        let host = authority.rsplit('@').next().unwrap_or(authority);
        if host.is_empty() || host.contains('/') {
            return Err(unsupported());
        }
        (host.to_string(), None, path.to_string())
    };

    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    if path.is_empty() {
        return Err(LocationError::MissingRepository(remote.to_string()));
    }

    let mut url = Url::parse(&format!("https://{host}")).map_err(|_| unsupported())?;
    url.set_port(port).map_err(|()| unsupported())?;
    url.path_segments_mut()
        .map_err(|()| unsupported())?
        .clear()
        .extend(path.split('/').filter(|s| !s.is_empty()));
    Ok(url)
}
