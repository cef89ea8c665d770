//! Holder process for `nsfilelock`.
//!
//! Joins the mount namespace named by `--namespace`, takes an exclusive
//! advisory lock on the target file, prints `locked`, and keeps the lock
//! until it is terminated. With `--nonblocking` a lock held elsewhere is
//! reported as `busy` on stderr instead of waited for. Any failure is printed as a single line on stderr
//! and the process exits with status 1. Nothing else is ever written to
//! either stream, since the launching side treats the first line it sees as
//! the answer.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use nsfilelock::{HoldRequest, hold};

/// Command-line interface for `nsfilelock-holder`.
#[derive(Parser, Debug)]
#[command(name = "nsfilelock-holder")]
struct Args {
    /// Mount namespace handle to enter, for example `/proc/1/ns/mnt`.
    #[arg(long, value_name = "PATH")]
    namespace: PathBuf,
    /// Give up at once if the lock is held elsewhere.
    #[arg(long)]
    nonblocking: bool,
    /// File to lock inside the namespace.
    #[arg(value_name = "TARGET")]
    target: PathBuf,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error) => {
            let rendered = error.render().to_string();
            let line = rendered.lines().next().unwrap_or("invalid arguments");
            return report(line);
        }
    };
    let request = HoldRequest::new(args.namespace, args.target).nonblocking(args.nonblocking);
    let Err(error) = hold(&request, &mut io::stdout().lock());
    report(&error.to_string())
}

fn report(message: &str) -> ExitCode {
    // Nothing else can be reported once stderr itself is gone.
    drop(writeln!(io::stderr().lock(), "{message}"));
    ExitCode::FAILURE
}
