use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
pub mod exit_codes;

use cli::args::Cli;
use cli::commands::dispatch;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fatal: {e:#}");
            exit_codes::CONFIG_ERROR
        }
    };
    std::process::exit(code);
}
