use std::process::ExitCode;

use check_http::{CheckReport, Verdict};
use check_http::cli::{CheckHttpArgs, parse_failure_report};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

fn exit_with(verdict: Verdict, message: &str) -> ExitCode {
    finish(&CheckReport::new(verdict, message))
}

fn finish(report: &CheckReport) -> ExitCode {
    let _ = report.write_to(&mut std::io::stdout().lock());
    ExitCode::from(report.verdict().code())
}

fn main() -> ExitCode {
    let args = match CheckHttpArgs::try_parse() {
        Ok(args) => args,
        Err(error) => return finish(&parse_failure_report(&error)),
    };
    init_logging(args.verbose);

    let config = match args.into_config() {
        Ok(config) => config,
        Err(error) => return exit_with(error.verdict(), &error.to_string()),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            return exit_with(
                Verdict::Unknown,
                &format!("failed to start async runtime: {error}"),
            );
        }
    };

    let report = runtime.block_on(check_http::check(&config));
    finish(&report)
}
