use std::{num::NonZeroUsize, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use reqmd::{Config, Git, ScanRoot, Tracer, VersionControl};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
pub struct Trace {
    /// File extensions to scan, comma separated (default: common source
    /// languages and markdown)
    #[arg(short, long, value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// Print the planned changes without writing them
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Number of scan workers (default: available parallelism)
    #[arg(short = 'j', long)]
    pub workers: Option<NonZeroUsize>,

    /// Directory containing the requirement documents
    pub markdown_root: PathBuf,

    /// Directories containing source code, each inside a git checkout
    #[arg(required = true)]
    pub source_roots: Vec<PathBuf>,
}

impl Trace {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self) -> anyhow::Result<()> {
        let config = self.config();
        let roots = self.roots()?;

        let tracer = Tracer::new(config, roots).scan()?.analyze()?;

        if tracer.actions().is_empty() {
            println!("{}", "Requirements are up to date.".success());
            return Ok(());
        }

        if self.dry_run {
            let mut current = None;
            for action in tracer.actions() {
                if current != Some(action.path()) {
                    current = Some(action.path());
                    println!("{}", action.path().display().to_string().warning());
                }
                println!("  {}", action.to_string().info());
            }
            let summary = format!("{} changes pending (dry run)", tracer.actions().len());
            println!("{}", summary.warning());
            return Ok(());
        }

        let applied = tracer.apply()?;
        let summary = format!(
            "Applied {} changes to {} files.",
            applied.actions_applied(),
            applied.files_written()
        );
        println!("{}", summary.success());
        Ok(())
    }

    fn config(&self) -> Config {
        let mut config = Config::load_or_default(&self.markdown_root);
        if let Some(extensions) = &self.extensions {
            config.set_extensions(extensions);
        }
        if let Some(workers) = self.workers {
            config.set_workers(workers);
        }
        config
    }

    fn roots(&self) -> anyhow::Result<Vec<ScanRoot>> {
        let mut roots = Vec::with_capacity(self.source_roots.len() + 1);

        // Documents need no version control unless they sit next to tagged code.
        let markdown_root = match Git::open(&self.markdown_root) {
            Ok(git) => ScanRoot::new(self.markdown_root.clone(), Arc::new(git)),
            Err(e) => {
                tracing::debug!(
                    "No repository for {}: {e}",
                    self.markdown_root.display()
                );
                ScanRoot::untracked(self.markdown_root.clone())
            }
        };
        roots.push(markdown_root);

        for path in &self.source_roots {
            let git = Git::open(path)
                .with_context(|| format!("cannot trace {} without git", path.display()))?;
            tracing::info!(
                "{} is tracked at {}",
                path.display(),
                git.location().repo_root_folder_url()
            );
            roots.push(ScanRoot::new(path.clone(), Arc::new(git)));
        }
        Ok(roots)
    }
}
