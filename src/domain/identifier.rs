use std::{fmt, ops::Deref, str::FromStr};

use non_empty_string::NonEmptyString;

/// A validated dot-separated identifier.
///
/// Each segment starts with an ASCII letter or underscore, followed by any
/// number of ASCII letters, digits or underscores. Segments are separated by a
/// single `.`.
///
/// Examples: `server`, `server.api.v2`, `Post.handler`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(NonEmptyString);

impl Identifier {
    /// Creates a new `Identifier` from a string.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidIdentifierError`] if the string is empty, has an empty
    /// segment, or a segment contains characters outside `[A-Za-z0-9_]` or
    /// starts with a digit.
    pub fn new(s: String) -> Result<Self, InvalidIdentifierError> {
        if !is_identifier(&s) {
            return Err(InvalidIdentifierError(s));
        }
        let non_empty = NonEmptyString::new(s).map_err(InvalidIdentifierError)?;
        Ok(Self(non_empty))
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Checks a string against the identifier grammar without allocating.
#[must_use]
pub fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_segment)
}

fn is_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl TryFrom<String> for Identifier {
    type Error = InvalidIdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = InvalidIdentifierError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl FromStr for Identifier {
    type Err = InvalidIdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for Identifier {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a string is not a valid dot-separated identifier.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid identifier '{0}': expected dot-separated segments of [A-Za-z_][A-Za-z0-9_]*")]
pub struct InvalidIdentifierError(String);

/// The package a markdown document declares in its header.
pub type PackageId = Identifier;

/// The name of a requirement, unique within its package.
pub type RequirementName = Identifier;

/// A globally unique requirement identifier.
///
/// Format: `{PACKAGE}/{NAME}`, for example `server.api.v2/Post.handler`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequirementId {
    package: PackageId,
    name: RequirementName,
}

impl RequirementId {
    /// Creates a requirement identifier from pre-validated parts.
    #[must_use]
    pub const fn new(package: PackageId, name: RequirementName) -> Self {
        Self { package, name }
    }

    /// Returns the package component.
    #[must_use]
    pub const fn package(&self) -> &PackageId {
        &self.package
    }

    /// Returns the requirement name component.
    #[must_use]
    pub const fn name(&self) -> &RequirementName {
        &self.name
    }
}

impl fmt::Display for RequirementId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.name)
    }
}

/// Errors that can occur when parsing a [`RequirementId`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RequirementIdError {
    /// The string has no `/` separating package and name.
    #[error("Invalid requirement ID '{0}': expected PACKAGE/NAME")]
    Syntax(String),

    /// The package or name is not a valid identifier.
    #[error(transparent)]
    Identifier(#[from] InvalidIdentifierError),
}

impl FromStr for RequirementId {
    type Err = RequirementIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (package, name) = s
            .split_once('/')
            .ok_or_else(|| RequirementIdError::Syntax(s.to_string()))?;
        Ok(Self::new(package.parse()?, name.parse()?))
    }
}

impl TryFrom<&str> for RequirementId {
    type Error = RequirementIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}
