use super::super::args::RunArgs;
use crate::exit_codes::{NO_RESULTS, SUCCESS};
use anyhow::Context;
use chrono::Utc;
use reviewbench_core::report::artifacts::timestamped_dir;
use reviewbench_core::report::console::{default_progress_sink, print_summary};
use reviewbench_core::report::ArtifactWriter;
use reviewbench_core::{DirectorySource, EvalConfig, Runner, Selection, TestCaseSource};
use std::sync::Arc;

/// Command-line flags win over the config file and its environment overrides.
fn apply_overrides(cfg: &mut EvalConfig, args: &RunArgs) -> anyhow::Result<()> {
    if let Some(dir) = &args.examples {
        cfg.examples_dir = Some(dir.clone());
    }
    if let Some(out) = &args.out {
        cfg.output_dir = Some(out.clone());
    }
    if let Some(n) = args.repetitions {
        cfg.repetitions = n;
    }
    if let Some(n) = args.parallel {
        cfg.parallel = usize::try_from(n).context("--parallel is too large")?;
    }
    cfg.validate()?;
    Ok(())
}

fn selection(args: &RunArgs) -> anyhow::Result<Selection> {
    let mut selection = if args.cases.is_empty() {
        Selection::all()
    } else {
        Selection::names(args.cases.iter().cloned())
    };
    if let Some(limit) = args.limit {
        selection = selection.with_limit(usize::try_from(limit).context("--limit is too large")?);
    }
    Ok(selection)
}

pub(crate) async fn run(args: RunArgs) -> anyhow::Result<i32> {
    let mut cfg = EvalConfig::load(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    apply_overrides(&mut cfg, &args)?;

    let runner = Runner::from_config(&cfg).context("failed to set up model clients")?;

    let examples = cfg.examples_dir();
    let source: Arc<dyn TestCaseSource> = Arc::new(DirectorySource::new(&examples));
    let selection = selection(&args)?;
    let total = selection
        .resolve(source.as_ref())
        .with_context(|| format!("failed to list test cases in {}", examples.display()))?
        .len();

    let out_dir = timestamped_dir(&cfg.output_root(), Utc::now());
    let mut runner = runner.with_artifacts(ArtifactWriter::new(&out_dir));
    if let Some(sink) = default_progress_sink(total) {
        runner = runner.with_progress(sink);
    }

    eprintln!(
        "Evaluating {total} test case(s) from {} ({} repetition(s), parallel {})",
        examples.display(),
        cfg.repetitions,
        cfg.parallel
    );
    let report = runner.run(source, &selection).await?;

    print_summary(&report);
    eprintln!("Results written to {}", out_dir.display());

    if report.has_results() {
        Ok(SUCCESS)
    } else {
        eprintln!("No test case produced a scored result.");
        Ok(NO_RESULTS)
    }
}
