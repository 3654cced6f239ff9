//! Domain models for requirement tracing.
//!
//! This module contains the identifier grammar shared by both parsers, the
//! in-memory model the scan produces, the error types of the pre-apply phases,
//! and configuration.

/// Identifier grammar shared by the markdown and source parsers.
pub mod identifier;
pub use identifier::{
    Identifier, InvalidIdentifierError, PackageId, RequirementId, RequirementIdError,
    RequirementName,
};

mod model;
pub use model::{
    CoverageFootnote, CoverageTag, Coverer, FileKind, FileRecord, RequirementSite, SiteStatus,
};

mod error;
pub use error::{SemanticError, SemanticErrorKind, SyntaxError, SyntaxErrorKind};

mod config;
pub use config::{CONFIG_FILE_NAME, Config, DEFAULT_EXTENSIONS};
