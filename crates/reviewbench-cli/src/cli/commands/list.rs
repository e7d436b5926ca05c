use super::super::args::ListArgs;
use crate::exit_codes::SUCCESS;
use anyhow::Context;
use reviewbench_core::config::{DEFAULT_CONFIG_FILE, DEFAULT_EXAMPLES_DIR};
use reviewbench_core::{DirectorySource, EvalConfig, TestCaseSource};
use std::path::PathBuf;

/// `--examples`, else the config's corpus, else `./examples`. An explicit
/// `--config` must load; the default one is only read if it exists.
fn corpus_dir(args: &ListArgs) -> anyhow::Result<PathBuf> {
    if let Some(dir) = &args.examples {
        return Ok(dir.clone());
    }
    let config = match &args.config {
        Some(path) => Some(path.clone()),
        None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()),
    };
    match config {
        Some(path) => {
            let cfg = EvalConfig::load(&path)
                .with_context(|| format!("failed to load config {}", path.display()))?;
            Ok(cfg.examples_dir())
        }
        None => Ok(PathBuf::from(DEFAULT_EXAMPLES_DIR)),
    }
}

pub(crate) fn run(args: ListArgs) -> anyhow::Result<i32> {
    let examples = corpus_dir(&args)?;
    let source = DirectorySource::new(&examples);
    let names = source
        .list_names()
        .with_context(|| format!("failed to list test cases in {}", examples.display()))?;
    for name in &names {
        println!("{name}");
    }
    tracing::debug!(count = names.len(), "listed test cases");
    Ok(SUCCESS)
}
