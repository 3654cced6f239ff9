/// Requirement document grammar.
pub mod markdown;
/// Coverage tag grammar.
pub mod source;

pub use markdown::ParsedMarkdown;
pub use source::ParsedSource;
