/// Line-oriented text patching.
pub mod lines;
/// Per-directory hash manifests.
pub mod manifest;

pub use lines::{LineEnding, TextFile};
pub use manifest::{MANIFEST_FILE_NAME, Manifest, ManifestError};
