use std::{num::NonZeroUsize, path::Path};

use serde::{Deserialize, Serialize};

/// The file name of the optional configuration file in the markdown root.
pub const CONFIG_FILE_NAME: &str = ".reqmd.toml";

/// Extensions scanned when neither the configuration file nor the command line
/// names any.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "md", "go", "rs", "py", "js", "ts", "jsx", "tsx", "java", "kt", "c", "h", "cpp", "hpp", "cc",
    "cs", "swift", "rb", "php", "scala", "sh", "sql", "vue",
];

/// Configuration for tracing runs.
///
/// This struct holds the settings that control which files the scan visits and
/// how much parallelism it uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// File extensions (without the leading dot) that are scanned.
    ///
    /// Matching is case-insensitive.
    extensions: Vec<String>,

    /// Files larger than this many bytes are skipped.
    max_file_size: u64,

    /// The number of scan workers.
    ///
    /// If this is `None`, the available parallelism is used.
    workers: Option<NonZeroUsize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            max_file_size: default_max_file_size(),
            workers: None,
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Loads `.reqmd.toml` from the given directory, falling back to the
    /// defaults if it is absent or invalid.
    #[must_use]
    pub fn load_or_default(root: &Path) -> Self {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("{e}, using defaults");
            Self::default()
        })
    }

    /// Returns the allowed extensions.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Replaces the allowed extensions.
    ///
    /// Leading dots are stripped and extensions are normalized to lowercase.
    pub fn set_extensions<I, S>(&mut self, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
    }

    /// Checks if an extension is in the allow-list.
    #[must_use]
    pub fn is_extension_allowed(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }

    /// Returns the size ceiling, in bytes.
    #[must_use]
    pub const fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Returns the number of scan workers.
    #[must_use]
    pub fn workers(&self) -> NonZeroUsize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
        })
    }

    /// Sets the number of scan workers.
    pub const fn set_workers(&mut self, workers: NonZeroUsize) {
        self.workers = Some(workers);
    }
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect()
}

const fn default_max_file_size() -> u64 {
    128 * 1024
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_extensions")]
        extensions: Vec<String>,

        #[serde(default = "default_max_file_size")]
        max_file_size: u64,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        workers: Option<NonZeroUsize>,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                extensions,
                max_file_size,
                workers,
            } => {
                let mut config = Self {
                    extensions: Vec::new(),
                    max_file_size,
                    workers,
                };
                config.set_extensions(extensions);
                config
            }
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            extensions: config.extensions,
            max_file_size: config.max_file_size,
            workers: config.workers,
        }
    }
}
