//! Markdown requirement tracing
//!
//! Requirements are declared inline in markdown documents, and source code
//! claims coverage of them with short tags in comments. A trace run scans both,
//! then rewrites the documents so every requirement shows whether it is
//! covered and links to the exact lines that cover it.
//!
//! The run is driven by a [`Tracer`].

pub mod domain;
pub use domain::{Config, RequirementId};

/// Parsers for the document and tag grammars.
pub mod parse;

pub mod location;

pub mod vcs;
pub use vcs::{Git, StaticVcs, VersionControl};

/// Line patching and manifest persistence.
pub mod storage;

pub mod scan;
pub use scan::{ScanResult, ScanRoot};

pub mod analyze;
pub use analyze::Action;

pub mod apply;

pub mod tracer;
pub use tracer::{TraceError, Tracer};
