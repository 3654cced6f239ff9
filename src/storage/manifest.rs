//! Per-directory hash manifests.
//!
//! Every directory of requirement documents that cites tracked source files
//! keeps a `reqmdfiles.json` mapping each cited file URL to the content hash it
//! had when the footnotes were generated.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// The manifest file name.
pub const MANIFEST_FILE_NAME: &str = "reqmdfiles.json";

/// A mapping from file URL to content hash, ordered by URL.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(BTreeMap<String, String>);

impl Manifest {
    /// Creates an empty manifest.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Parses a manifest from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a JSON object of strings.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Reads the manifest at `path`, returning `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Option<Self>, ManifestError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ManifestError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(&text)
            .map(Some)
            .map_err(|source| ManifestError::Json {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Writes the manifest, or removes the file if the manifest is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or removed.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let result = if self.is_empty() {
            match fs::remove_file(path) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            }
        } else {
            fs::write(path, self.to_json())
        };
        result.map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Serializes the manifest as indented JSON with a trailing newline.
    #[must_use]
    pub fn to_json(&self) -> String {
        let mut json =
            serde_json::to_string_pretty(&self.0).expect("a map of strings always serializes");
        json.push('\n');
        json
    }

    /// Returns the hash recorded for a URL.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<&str> {
        self.0.get(url).map(String::as_str)
    }

    /// Records the hash of a URL, replacing any previous one.
    pub fn insert(&mut self, url: String, hash: String) {
        self.0.insert(url, hash);
    }

    /// Forgets a URL.
    pub fn remove(&mut self, url: &str) {
        self.0.remove(url);
    }

    /// Returns `true` if no URL is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over URLs and hashes in URL order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(url, hash)| (url.as_str(), hash.as_str()))
    }
}

impl FromIterator<(String, String)> for Manifest {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Errors that can occur when reading or writing a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The manifest could not be read, written or removed.
    #[error("manifest {}: {source}", .path.display())]
    Io {
        /// The manifest path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The manifest is not valid JSON.
    #[error("manifest {}: {source}", .path.display())]
    Json {
        /// The manifest path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },
}
