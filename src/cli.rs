//! CLI argument parsing for Metatrace
//!
//! Defines the Command enum and parse_args() function for all CLI commands.

use anyhow::{anyhow, Result};
use metatrace::{Mode, OutputFormat, SessionConfig};
use std::path::PathBuf;

pub fn print_usage() {
    eprintln!("Metatrace - Debugger for compile-time template metaprograms");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  metatrace <command> --trace <FILE|-> [arguments]");
    eprintln!("  metatrace --help");
    eprintln!();
    eprintln!("  metatrace evaluate --trace <FILE>");
    eprintln!("  metatrace forwardtrace --trace <FILE> [--max-depth <N>] [--steps <N>]");
    eprintln!("  metatrace backtrace --trace <FILE> [--steps <N>]");
    eprintln!("  metatrace status --trace <FILE>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  evaluate      Replay a trace and print the evaluation result");
    eprintln!("  forwardtrace  Print the call tree below the current frame");
    eprintln!("  backtrace     Print the frames from the current frame to the root");
    eprintln!("  status        Show metaprogram statistics");
    eprintln!();
    eprintln!("Global arguments:");
    eprintln!("  --trace <FILE>      JSON-lines trace to replay, - for stdin");
    eprintln!("  --mode <MODE>       full or minimized (default: minimized)");
    eprintln!("  --preprocessor      Show macro, include and directive frames");
    eprintln!("  --capacity <N>      Maximum number of frames recorded");
    eprintln!("  --output <FORMAT>   Output format: human (default), json (compact), or pretty (formatted)");
    eprintln!("  --verbose           Debug logging to stderr (METATRACE_LOG overrides)");
    eprintln!("  -V, --version       Print version");
    eprintln!("  -h, --help          Print this help");
    eprintln!();
    eprintln!("Forwardtrace arguments:");
    eprintln!("  --max-depth <N>     Do not expand frames deeper than N");
    eprintln!("  --steps <N>         Step N frames before tracing");
    eprintln!();
    eprintln!("Backtrace arguments:");
    eprintln!("  --steps <N>         Step N frames before printing the backtrace");
}

/// Options shared by every command
#[derive(Debug, Clone, PartialEq)]
pub struct TraceOptions {
    pub trace: PathBuf,
    pub config: SessionConfig,
    pub output_format: OutputFormat,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Evaluate {
        options: TraceOptions,
    },
    ForwardTrace {
        options: TraceOptions,
        max_depth: Option<usize>,
        steps: usize,
    },
    Backtrace {
        options: TraceOptions,
        steps: usize,
    },
    Status {
        options: TraceOptions,
    },
    Help,
    Version,
}

impl Command {
    pub fn verbose(&self) -> bool {
        match self {
            Command::Evaluate { options }
            | Command::ForwardTrace { options, .. }
            | Command::Backtrace { options, .. }
            | Command::Status { options } => options.verbose,
            Command::Help | Command::Version => false,
        }
    }
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} requires an argument", flag))
}

fn number(args: &[String], i: usize, flag: &str) -> Result<usize> {
    let raw = value(args, i, flag)?;
    raw.parse()
        .map_err(|_| anyhow!("{} expects a non-negative integer, got '{}'", flag, raw))
}

/// Parse `args`, where `args[0]` is the program name
pub fn parse_args_from(args: &[String]) -> Result<Command> {
    if args.len() < 2 {
        return Err(anyhow!("Missing command"));
    }

    let command = args[1].as_str();
    match command {
        "--version" | "-V" => return Ok(Command::Version),
        "--help" | "-h" => return Ok(Command::Help),
        "evaluate" | "forwardtrace" | "backtrace" | "status" => {}
        other => return Err(anyhow!("Unknown command: {}", other)),
    }

    let mut trace: Option<PathBuf> = None;
    let mut config = SessionConfig::default();
    let mut output_format = OutputFormat::Human;
    let mut verbose = false;
    let mut max_depth: Option<usize> = None;
    let mut steps: usize = 0;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--trace" => {
                trace = Some(PathBuf::from(value(args, i, "--trace")?));
                i += 2;
            }
            "--mode" => {
                let raw = value(args, i, "--mode")?;
                config.mode = Mode::from_str(raw)
                    .ok_or_else(|| anyhow!("Invalid mode '{}': expected full or minimized", raw))?;
                i += 2;
            }
            "--preprocessor" => {
                config.preprocessor_mode = true;
                i += 1;
            }
            "--capacity" => {
                config.trace_capacity = Some(number(args, i, "--capacity")?);
                i += 2;
            }
            "--output" => {
                let raw = value(args, i, "--output")?;
                output_format = OutputFormat::from_str(raw)
                    .ok_or_else(|| anyhow!("Invalid output format: {}", raw))?;
                i += 2;
            }
            "--verbose" | "-v" => {
                verbose = true;
                i += 1;
            }
            "--max-depth" if command == "forwardtrace" => {
                max_depth = Some(number(args, i, "--max-depth")?);
                i += 2;
            }
            "--steps" if command == "forwardtrace" || command == "backtrace" => {
                steps = number(args, i, "--steps")?;
                i += 2;
            }
            other => {
                return Err(anyhow!("Unknown argument for {}: {}", command, other));
            }
        }
    }

    let trace = trace.ok_or_else(|| anyhow!("--trace is required"))?;
    let options = TraceOptions {
        trace,
        config,
        output_format,
        verbose,
    };

    Ok(match command {
        "evaluate" => Command::Evaluate { options },
        "forwardtrace" => Command::ForwardTrace {
            options,
            max_depth,
            steps,
        },
        "backtrace" => Command::Backtrace { options, steps },
        _ => Command::Status { options },
    })
}

pub fn parse_args() -> Result<Command> {
    let args: Vec<String> = std::env::args().collect();
    parse_args_from(&args)
}
