mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{LogFormat, LogLevel, LoggingContext};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "tslumd", version, about = "TSL UMD v5 tally sender, listener and decoder")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Also append log lines to this file.
    #[arg(long, value_name = "PATH", env = "TSLUMD_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    let logging = match LoggingContext::init(cli.log_format, cli.log_level, cli.log_file.as_deref())
    {
        Ok(logging) => logging,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    };
    if let Some(path) = logging.log_file() {
        tracing::debug!(path = %path.display(), "appending logs to file");
    }

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    let code = match result {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(code = err.code, "{err}");
            eprintln!("error: {err}");
            logging.report_recent();
            err.code
        }
    };
    logging.finish();
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "tslumd",
            "send",
            "10.211.55.3",
            "--port",
            "5729",
            "--text",
            "CAM 55",
        ])
        .expect("send args should parse");

        assert!(matches!(cli.command, Command::Send(_)));
    }

    #[test]
    fn send_requires_text() {
        let err = Cli::try_parse_from(["tslumd", "send", "10.0.0.1"])
            .expect_err("missing --text should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_unknown_transport() {
        let err = Cli::try_parse_from(["tslumd", "listen", "--transport", "sctp"])
            .expect_err("unknown transport should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn strict_decode_requires_framed() {
        let err = Cli::try_parse_from(["tslumd", "decode", "--strict"])
            .expect_err("--strict without --framed should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tslumd",
            "decode",
            "--framed",
            "--format",
            "json",
            "--log-file",
            "/tmp/tslumd.log",
        ])
        .expect("global flags should parse after subcommand");

        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/tslumd.log")));
    }
}
