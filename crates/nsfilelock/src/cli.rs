//! Command-line entry point of the `nsfilelock` test-assist tool.
//!
//! The tool takes one lock cycle on a file in a target namespace and reports
//! the outcome, which makes it handy for checking from a shell that a lock
//! is free, or for exercising the holder binary on a new host.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use crate::lock::NsFileLock;
use crate::options::DEFAULT_TIMEOUT;
use crate::telemetry::{self, DEFAULT_LOG_FILTER, LogFormat};
use crate::{LockOptions, SUCCESS_RESPONSE};

/// Command-line interface for `nsfilelock`.
#[derive(Parser, Debug)]
#[command(
    name = "nsfilelock",
    about = "Takes an advisory lock on a file inside another mount namespace"
)]
pub(crate) struct Cli {
    /// File to lock, as seen from inside the namespace.
    #[arg(value_name = "FILE")]
    pub(crate) file: PathBuf,
    /// Namespace directory such as `/proc/<pid>/ns`; defaults to `/proc/1/ns`.
    #[arg(value_name = "NAMESPACE")]
    pub(crate) namespace: Option<PathBuf>,
    /// Seconds to wait for the lock before giving up.
    #[arg(long, env = "NSFILELOCK_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub(crate) timeout_secs: u64,
    /// Tracing filter expression for diagnostics on stderr.
    #[arg(long, env = "NSFILELOCK_LOG_FILTER", default_value = DEFAULT_LOG_FILTER)]
    pub(crate) log_filter: String,
    /// Diagnostic output format (`json` or `compact`).
    #[arg(long, env = "NSFILELOCK_LOG_FORMAT", default_value_t = LogFormat::Compact)]
    pub(crate) log_format: LogFormat,
}

/// Parses `args`, runs one lock cycle, and reports the result.
///
/// Prints `locked` on `stdout` and releases the lock again when it was
/// acquired; otherwise prints `failed to lock <file> in <namespace>: <error>`
/// on `stderr` and exits with status 1.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => return report_usage(&error, stdout, stderr),
    };
    execute(&cli, stdout, stderr).unwrap_or(ExitCode::FAILURE)
}

fn execute<W: Write, E: Write>(cli: &Cli, stdout: &mut W, stderr: &mut E) -> io::Result<ExitCode> {
    if let Err(error) = telemetry::initialise(&cli.log_filter, cli.log_format) {
        writeln!(stderr, "{error}")?;
        return Ok(ExitCode::FAILURE);
    }

    let namespace = cli.namespace.clone().unwrap_or_default();
    let options = LockOptions::new().timeout(Duration::from_secs(cli.timeout_secs));
    let mut lock = NsFileLock::with_options(namespace, &cli.file, options);
    if let Err(error) = lock.lock() {
        writeln!(
            stderr,
            "failed to lock {} in {}: {error}",
            cli.file.display(),
            lock.namespace().dir().display()
        )?;
        return Ok(ExitCode::FAILURE);
    }

    writeln!(stdout, "{SUCCESS_RESPONSE}")?;
    stdout.flush()?;
    if let Err(error) = lock.unlock() {
        writeln!(stderr, "{error}")?;
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn report_usage<W: Write, E: Write>(
    error: &clap::Error,
    stdout: &mut W,
    stderr: &mut E,
) -> ExitCode {
    let rendered = error.render();
    let written = if error.use_stderr() {
        write!(stderr, "{rendered}")
    } else {
        write!(stdout, "{rendered}")
    };
    if written.is_err() {
        return ExitCode::FAILURE;
    }
    u8::try_from(error.exit_code()).map_or(ExitCode::FAILURE, ExitCode::from)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn args(values: &[&str]) -> Vec<OsString> {
        values.iter().map(OsString::from).collect()
    }

    #[test]
    fn parses_defaults() {
        let cli = Cli::try_parse_from(args(&["nsfilelock", "/tmp/lock"])).expect("parse");
        assert_eq!(cli.file, PathBuf::from("/tmp/lock"));
        assert_eq!(cli.namespace, None);
        assert_eq!(cli.log_format, LogFormat::Compact);
    }

    #[rstest]
    #[case(&["nsfilelock", "/tmp/lock", "/proc/42/ns"], Some("/proc/42/ns"), None)]
    #[case(&["nsfilelock", "--timeout-secs", "3", "/tmp/lock"], None, Some(3))]
    fn parses_namespace_and_timeout(
        #[case] argv: &[&str],
        #[case] namespace: Option<&str>,
        #[case] timeout: Option<u64>,
    ) {
        let cli = Cli::try_parse_from(args(argv)).expect("parse");
        assert_eq!(cli.namespace, namespace.map(PathBuf::from));
        if let Some(secs) = timeout {
            assert_eq!(cli.timeout_secs, secs);
        }
    }

    #[test]
    fn parses_json_log_format() {
        let cli = Cli::try_parse_from(args(&["nsfilelock", "--log-format", "json", "/tmp/lock"]))
            .expect("parse");
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn missing_file_is_a_usage_error() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = run(args(&["nsfilelock"]), &mut stdout, &mut stderr);

        assert_eq!(code, ExitCode::from(2));
        assert!(stdout.is_empty());
        assert!(String::from_utf8_lossy(&stderr).contains("<FILE>"));
    }

    #[test]
    fn invalid_namespace_is_reported_with_context() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = run(
            args(&["nsfilelock", "/tmp/nsfilelock-cli.lock", "/invalidns/"]),
            &mut stdout,
            &mut stderr,
        );

        assert_eq!(code, ExitCode::FAILURE);
        assert!(stdout.is_empty());
        let message = String::from_utf8_lossy(&stderr);
        assert!(
            message.starts_with("failed to lock /tmp/nsfilelock-cli.lock in /invalidns/: "),
            "unexpected message: {message}"
        );
        assert!(message.contains("invalid namespace handle"));
    }
}
