//! Trace Info Dumper CLI
//!
//! Dumps per-process statistics of an ETL trace to a JSON or XML file.

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use env_logger::Env;
use std::path::PathBuf;

use trace_info_dumper::commands::{execute_dump, validate_args, DumpArgs};
use trace_info_dumper::utils::error::ValidationError;

/// Trace Info Dumper - per-process statistics of an ETL trace
#[derive(Parser, Debug)]
#[command(name = "trace-info-dumper")]
#[command(version, about, long_about = None)]
struct Cli {
    /// ETL file to read
    input: PathBuf,

    /// Output file, .json or .xml
    output: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(_) => {
            println!("{}", Cli::command().render_usage());
            fail(&ValidationError::InvalidArguments.into());
        }
    };

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let args = DumpArgs {
        input: cli.input,
        output: cli.output,
    };

    if let Err(e) = validate_args(&args) {
        fail(&e.into());
    }

    if let Err(e) = execute_dump(&args) {
        fail(&e);
    }
}

/// Report `err` on stdout and exit with -1
///
/// **Private** - the only failure path of the CLI
fn fail(err: &anyhow::Error) -> ! {
    println!("ERROR: {}!", render_error(err));
    std::process::exit(-1);
}

/// Join the error chain with ": ", skipping causes a message already ends with
fn render_error(err: &anyhow::Error) -> String {
    let mut rendered = String::new();

    for cause in err.chain() {
        let message = cause.to_string();
        if rendered.ends_with(&message) {
            continue;
        }
        if !rendered.is_empty() {
            rendered.push_str(": ");
        }
        rendered.push_str(&message);
    }

    rendered
}
