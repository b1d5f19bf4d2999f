//! Metatrace CLI - debugger for compile-time template metaprograms
//!
//! Usage: metatrace <command> --trace <FILE|-> [arguments]

mod backtrace_cmd;
mod cli;
mod evaluate_cmd;
mod forwardtrace_cmd;
mod status_cmd;

use anyhow::Result;
use metatrace::error_codes;
use metatrace::output::{output_json, ErrorResponse, OutputFormat};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use cli::{parse_args, print_usage, Command};

/// Log to stderr; METATRACE_LOG takes precedence over --verbose
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("METATRACE_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn report_error(e: &anyhow::Error, output_format: OutputFormat) {
    let (category, code) = error_codes::classify(e);
    if output_format.is_json() {
        let response = ErrorResponse {
            error: category.to_string(),
            code: code.to_string(),
            message: format!("{:#}", e),
        };
        if output_json(&response, output_format).is_ok() {
            return;
        }
    }
    eprintln!("Error [{}]: {:#}", code, e);
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Evaluate { options } => evaluate_cmd::run_evaluate(options),
        Command::ForwardTrace {
            options,
            max_depth,
            steps,
        } => forwardtrace_cmd::run_forwardtrace(options, max_depth, steps),
        Command::Backtrace { options, steps } => backtrace_cmd::run_backtrace(options, steps),
        Command::Status { options } => status_cmd::run_status(options),
        Command::Help => {
            print_usage();
            Ok(())
        }
        Command::Version => {
            println!("{}", metatrace::version::version());
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    // Parse global --output flag so argument errors honor it too
    let output_format = args
        .iter()
        .position(|x| x == "--output")
        .and_then(|i| args.get(i + 1))
        .and_then(|fmt| OutputFormat::from_str(fmt))
        .unwrap_or(OutputFormat::Human);

    let command = match parse_args() {
        Ok(command) => command,
        Err(e) => {
            report_error(&e, output_format);
            if !output_format.is_json() {
                eprintln!();
                print_usage();
            }
            return ExitCode::from(1);
        }
    };

    init_logging(command.verbose());

    match run(command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e, output_format);
            ExitCode::from(1)
        }
    }
}
