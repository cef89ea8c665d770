//! CLI entrypoint for the `nsfilelock` test-assist tool.
//!
//! The binary delegates to [`nsfilelock::cli::run`], which parses arguments,
//! initialises telemetry, and performs one lock cycle.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    nsfilelock::cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
