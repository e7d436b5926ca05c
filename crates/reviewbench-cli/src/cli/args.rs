use clap::{Args, Parser, Subcommand};
use reviewbench_core::config::DEFAULT_CONFIG_FILE;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "reviewbench",
    version,
    about = "Measure LLM code-review quality against curated ground truth"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Review and score test cases, then write results and a summary
    Run(RunArgs),
    /// List the test cases found in the corpus
    List(ListArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Corpus directory; overrides `examples_dir` from the config
    #[arg(long)]
    pub examples: Option<PathBuf>,

    /// Only these test cases (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub cases: Vec<String>,

    /// Only the first N test cases
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub limit: Option<u64>,

    /// Trials per test case
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub repetitions: Option<u32>,

    /// Test cases evaluated concurrently
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub parallel: Option<u64>,

    /// Output root; a timestamped run directory is created under it
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Config whose `examples_dir` is listed; `reviewbench.yaml` is used when present
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Corpus directory; overrides the config
    #[arg(long)]
    pub examples: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_args_parse_overrides() {
        let cli = Cli::try_parse_from([
            "reviewbench",
            "run",
            "--cases",
            "cart,login",
            "-l",
            "3",
            "--repetitions",
            "2",
            "--parallel",
            "4",
        ])
        .unwrap();
        let Command::Run(args) = cli.cmd else {
            panic!("expected run");
        };
        assert_eq!(args.cases, vec!["cart", "login"]);
        assert_eq!(args.limit, Some(3));
        assert_eq!(args.repetitions, Some(2));
        assert_eq!(args.parallel, Some(4));
        assert_eq!(args.config, PathBuf::from("reviewbench.yaml"));
    }

    #[test]
    fn zero_repetitions_rejected_at_parse_time() {
        assert!(Cli::try_parse_from(["reviewbench", "run", "--repetitions", "0"]).is_err());
        assert!(Cli::try_parse_from(["reviewbench", "run", "--limit", "0"]).is_err());
    }
}
