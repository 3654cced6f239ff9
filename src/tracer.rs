//! The trace pipeline: scan, analyze, apply.
//!
//! A [`Tracer`] moves through its stages by value, so a stage can only be
//! reached once the previous one has succeeded:
//!
//! ```text
//! Tracer<Idle> --scan--> Tracer<Scanned> --analyze--> Tracer<Analyzed> --apply--> Tracer<Applied>
//! ```
//!
//! A dry run stops at [`Tracer<Analyzed>`] and reports its actions.

use std::fmt;

use nonempty::NonEmpty;

use crate::{
    analyze::{Action, analyze},
    apply::{ApplyError, apply},
    domain::{Config, FileRecord, SemanticError, SyntaxError},
    scan::{ScanError, ScanResult, ScanRoot, scan},
};

/// Nothing has been read yet.
#[derive(Debug)]
pub struct Idle;

/// Every root has been scanned without syntax errors.
#[derive(Debug)]
pub struct Scanned {
    result: ScanResult,
}

/// The actions needed to bring the documents up to date are known.
#[derive(Debug)]
pub struct Analyzed {
    actions: Vec<Action>,
}

/// The actions have been written to disk.
#[derive(Debug)]
pub struct Applied {
    actions: usize,
    files: usize,
}

/// Traces requirements from markdown documents to the source code covering
/// them.
#[derive(Debug)]
pub struct Tracer<S> {
    config: Config,
    roots: Vec<ScanRoot>,
    state: S,
}

impl<S> Tracer<S> {
    /// The configuration of this run.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The roots scanned by this run.
    #[must_use]
    pub fn roots(&self) -> &[ScanRoot] {
        &self.roots
    }

    fn advance<T>(self, state: T) -> Tracer<T> {
        Tracer {
            config: self.config,
            roots: self.roots,
            state,
        }
    }
}

impl Tracer<Idle> {
    /// Prepares a run over the given roots.
    #[must_use]
    pub const fn new(config: Config, roots: Vec<ScanRoot>) -> Self {
        Self {
            config,
            roots,
            state: Idle,
        }
    }

    /// Reads and parses every file below the roots.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors, and with [`TraceError::Syntax`] if any file is
    /// malformed.
    pub fn scan(self) -> Result<Tracer<Scanned>, TraceError> {
        let mut result = scan(&self.roots, &self.config)?;
        if let Some(errors) = NonEmpty::from_vec(std::mem::take(&mut result.errors)) {
            return Err(TraceError::Syntax(errors));
        }
        Ok(self.advance(Scanned { result }))
    }
}

impl Tracer<Scanned> {
    /// The parsed files, sorted by path.
    #[must_use]
    pub fn files(&self) -> &[FileRecord] {
        &self.state.result.files
    }

    /// Checks the requirement graph and plans the edits.
    ///
    /// # Errors
    ///
    /// Fails with [`TraceError::Semantic`] on duplicate requirements or
    /// documents lacking a package.
    pub fn analyze(self) -> Result<Tracer<Analyzed>, TraceError> {
        let analysis = analyze(&self.state.result);
        if let Some(errors) = NonEmpty::from_vec(analysis.errors) {
            return Err(TraceError::Semantic(errors));
        }
        Ok(self.advance(Analyzed {
            actions: analysis.actions,
        }))
    }
}

impl Tracer<Analyzed> {
    /// The planned edits, in application order.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.state.actions
    }

    /// Writes the planned edits.
    ///
    /// # Errors
    ///
    /// Fails if a file cannot be read or written, or has changed since it was
    /// scanned.
    pub fn apply(self) -> Result<Tracer<Applied>, TraceError> {
        let files = apply(&self.state.actions)?;
        let actions = self.state.actions.len();
        tracing::info!("Applied {actions} actions to {files} files");
        Ok(self.advance(Applied { actions, files }))
    }
}

impl Tracer<Applied> {
    /// The number of actions applied.
    #[must_use]
    pub const fn actions_applied(&self) -> usize {
        self.state.actions
    }

    /// The number of files written or removed.
    #[must_use]
    pub const fn files_written(&self) -> usize {
        self.state.files
    }
}

/// Errors that end a run.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// A root or file could not be read.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Some files are malformed. Nothing was written.
    #[error("{}", Summary("syntax", .0))]
    Syntax(NonEmpty<SyntaxError>),

    /// The requirements are inconsistent. Nothing was written.
    #[error("{}", Summary("semantic", .0))]
    Semantic(NonEmpty<SemanticError>),

    /// The edits could not be written.
    #[error(transparent)]
    Apply(#[from] ApplyError),
}

struct Summary<'a, E>(&'static str, &'a NonEmpty<E>);

impl<E: fmt::Display> fmt::Display for Summary<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_DISPLAY: usize = 5;

        let Self(kind, errors) = self;
        let total = errors.len();
        write!(f, "found {total} {kind} error(s)")?;
        for error in errors.iter().take(MAX_DISPLAY) {
            write!(f, "\n  {error}")?;
        }
        if total > MAX_DISPLAY {
            write!(f, "\n  ... (and {} more)", total - MAX_DISPLAY)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        path::{Path, PathBuf},
        sync::Arc,
    };

    use tempfile::TempDir;

    use super::*;
    use crate::{
        domain::{SemanticErrorKind, SyntaxErrorKind},
        location::LocationResolver,
        storage::MANIFEST_FILE_NAME,
        vcs::StaticVcs,
    };

    struct Fixture {
        _tmp: TempDir,
        docs: PathBuf,
        src: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let root = tmp.path().canonicalize().unwrap();
            let docs = root.join("docs");
            let src = root.join("src");
            fs::create_dir_all(&docs).unwrap();
            fs::create_dir_all(&src).unwrap();
            Self {
                _tmp: tmp,
                docs,
                src,
            }
        }

        fn write(dir: &Path, name: &str, text: &str) {
            fs::write(dir.join(name), text).unwrap();
        }

        fn read(dir: &Path, name: &str) -> String {
            fs::read_to_string(dir.join(name)).unwrap()
        }

        fn tracer(&self, tracked: &[(&str, &str)]) -> Tracer<Idle> {
            let location =
                LocationResolver::new("https://github.com/acme/app.git", "main").unwrap();
            let vcs = tracked
                .iter()
                .fold(StaticVcs::new(self.src.clone(), location), |vcs, (file, hash)| {
                    vcs.with_file(file, hash)
                });
            Tracer::new(
                Config::default(),
                vec![
                    ScanRoot::untracked(self.docs.clone()),
                    ScanRoot::new(self.src.clone(), Arc::new(vcs)),
                ],
            )
        }

        fn run(&self, tracked: &[(&str, &str)]) -> Result<usize, TraceError> {
            let applied = self.tracer(tracked).scan()?.analyze()?.apply()?;
            Ok(applied.actions_applied())
        }
    }

    const HEADER: &str = "```\nreqmd.package: shop\n```\n";

    #[test]
    fn covers_requirements_and_is_idempotent() {
        let fixture = Fixture::new();
        Fixture::write(
            &fixture.docs,
            "cart.md",
            &format!("{HEADER}\n# Cart\n\nUsers can add items `~Cart.add~`.\n"),
        );
        Fixture::write(&fixture.src, "cart.go", "package cart\n\n// [~shop/Cart.add~impl]\n");

        assert_eq!(fixture.run(&[("cart.go", "abc")]).unwrap(), 3);

        assert_eq!(
            Fixture::read(&fixture.docs, "cart.md"),
            format!(
                "{HEADER}\n# Cart\n\nUsers can add items `~Cart.add~`covered[^~Cart.add~]✅.\n\n\
                 [^~Cart.add~]: `[~shop/Cart.add~impl]` \
                 [cart.go:3:impl](https://github.com/acme/app/blob/main/cart.go#L3)\n"
            )
        );
        assert_eq!(
            Fixture::read(&fixture.docs, MANIFEST_FILE_NAME),
            "{\n  \"https://github.com/acme/app/blob/main/cart.go\": \"abc\"\n}\n"
        );

        let again = fixture.tracer(&[("cart.go", "abc")]).scan().unwrap().analyze().unwrap();
        assert!(again.actions().is_empty(), "{:?}", again.actions());
    }

    #[test]
    fn implementation_and_test_are_both_listed() {
        let fixture = Fixture::new();
        Fixture::write(&fixture.docs, "req.md", &format!("{HEADER}`~Pay~`\n"));
        Fixture::write(&fixture.src, "pay.go", "// [~shop/Pay~impl]\n");
        Fixture::write(&fixture.src, "pay_test.go", "\n\n// [~shop/Pay~test]\n");

        fixture
            .run(&[("pay.go", "1"), ("pay_test.go", "2")])
            .unwrap();

        let doc = Fixture::read(&fixture.docs, "req.md");
        assert!(doc.ends_with(
            "[^~Pay~]: `[~shop/Pay~impl]` \
             [pay.go:1:impl](https://github.com/acme/app/blob/main/pay.go#L1), \
             [pay_test.go:3:test](https://github.com/acme/app/blob/main/pay_test.go#L3)\n"
        ));
    }

    #[test]
    fn footnotes_for_file_names_with_brackets_survive_a_rerun() {
        let fixture = Fixture::new();
        Fixture::write(&fixture.docs, "req.md", &format!("{HEADER}`~Pay~`\n"));
        Fixture::write(&fixture.src, "pay(v2)[x].go", "// [~shop/Pay~impl]\n");
        let tracked = [("pay(v2)[x].go", "1")];

        fixture.run(&tracked).unwrap();
        assert!(Fixture::read(&fixture.docs, "req.md").ends_with(
            "[^~Pay~]: `[~shop/Pay~impl]` \
             [pay(v2)\\[x\\].go:1:impl](https://github.com/acme/app/blob/main/pay%28v2%29[x].go#L1)\n"
        ));

        assert_eq!(fixture.run(&tracked).unwrap(), 0);
    }

    #[test]
    fn removing_the_last_tag_regresses_coverage() {
        let fixture = Fixture::new();
        Fixture::write(&fixture.docs, "req.md", &format!("{HEADER}`~Pay~`\n"));
        Fixture::write(&fixture.src, "pay.go", "// [~shop/Pay~impl]\n");
        fixture.run(&[("pay.go", "1")]).unwrap();

        Fixture::write(&fixture.src, "pay.go", "// gone\n");
        fixture.run(&[("pay.go", "2")]).unwrap();

        assert_eq!(
            Fixture::read(&fixture.docs, "req.md"),
            format!("{HEADER}`~Pay~`uncvrd[^~Pay~]❓\n\n[^~Pay~]: `[~shop/Pay~impl]`\n")
        );
        assert!(!fixture.docs.join(MANIFEST_FILE_NAME).exists());

        // Uncovered sites without tags are stable.
        assert_eq!(fixture.run(&[("pay.go", "2")]).unwrap(), 0);
    }

    #[test]
    fn duplicate_requirements_stop_the_run() {
        let fixture = Fixture::new();
        let text = format!("{HEADER}`~Pay~`\n");
        Fixture::write(&fixture.docs, "a.md", &text);
        Fixture::write(&fixture.docs, "b.md", &text);
        Fixture::write(&fixture.src, "pay.go", "// [~shop/Pay~impl]\n");

        let Err(TraceError::Semantic(errors)) = fixture.run(&[("pay.go", "1")]) else {
            panic!("expected a semantic error");
        };
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors.head.kind,
            SemanticErrorKind::DuplicateRequirement { .. }
        ));
        assert_eq!(Fixture::read(&fixture.docs, "a.md"), text);
        assert_eq!(Fixture::read(&fixture.docs, "b.md"), text);
    }

    #[test]
    fn missing_package_stops_the_run() {
        let fixture = Fixture::new();
        Fixture::write(&fixture.docs, "a.md", "# Title\n\n`~Pay~`\n");

        let Err(TraceError::Semantic(errors)) = fixture.run(&[]) else {
            panic!("expected a semantic error");
        };
        assert_eq!(errors.head.line, 3);
        assert_eq!(errors.head.kind, SemanticErrorKind::MissingPackage);
    }

    #[test]
    fn syntax_errors_stop_the_run_before_analysis() {
        let fixture = Fixture::new();
        let text = format!("{HEADER}`~Pay~`covered[^~Pay~]❓\n");
        Fixture::write(&fixture.docs, "a.md", &text);

        let Err(TraceError::Syntax(errors)) = fixture.run(&[]) else {
            panic!("expected a syntax error");
        };
        assert!(matches!(
            errors.head.kind,
            SyntaxErrorKind::StatusMismatch { .. }
        ));
        assert_eq!(Fixture::read(&fixture.docs, "a.md"), text);
    }

    #[test]
    fn error_summary_is_truncated() {
        let errors: Vec<_> = (1..=7)
            .map(|line| {
                SyntaxError::new(
                    PathBuf::from("a.md"),
                    line,
                    SyntaxErrorKind::InvalidPackage("1x".to_string()),
                )
            })
            .collect();
        let error = TraceError::Syntax(NonEmpty::from_vec(errors).unwrap());

        let message = error.to_string();
        assert!(message.starts_with("found 7 syntax error(s)\n  a.md:1: "));
        assert!(message.ends_with("... (and 2 more)"));
    }
}
