use clap::{Args, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use tslumd_packet::Tally;
use tslumd_transport::{TransportKind, DEFAULT_PORT};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a display message to a TSL device.
    Send(SendArgs),
    /// Listen for TSL packets and print them.
    Listen(ListenArgs),
    /// Decode a captured packet or framed stream.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args),
        Command::Listen(args) => listen::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum TallyArg {
    Off,
    Red,
    Green,
    Amber,
}

impl From<TallyArg> for Tally {
    fn from(arg: TallyArg) -> Self {
        match arg {
            TallyArg::Off => Tally::Off,
            TallyArg::Red => Tally::Red,
            TallyArg::Green => Tally::Green,
            TallyArg::Amber => Tally::Amber,
        }
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Display host name or address.
    pub host: String,
    /// Display port.
    #[arg(long, short = 'p', env = "TSLUMD_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Transport: tcp (framed) or udp.
    #[arg(long, short = 't', env = "TSLUMD_TRANSPORT", default_value = "tcp")]
    pub transport: TransportKind,
    /// Screen number in the packet header.
    #[arg(long, default_value = "0")]
    pub screen: u16,
    /// Display index within the screen.
    #[arg(long, short = 'i', default_value = "0")]
    pub index: u16,
    /// Text shown on the display.
    #[arg(long)]
    pub text: String,
    /// Left-hand tally.
    #[arg(long, value_enum, default_value = "off")]
    pub left: TallyArg,
    /// Text tally.
    #[arg(long, value_enum, default_value = "off")]
    pub text_tally: TallyArg,
    /// Right-hand tally.
    #[arg(long, value_enum, default_value = "off")]
    pub right: TallyArg,
    /// Brightness, 0 (off) to 3 (full).
    #[arg(long, default_value = "3", value_parser = clap::value_parser!(u8).range(0..=3))]
    pub brightness: u8,
    /// Number of times to send. 0 repeats until interrupted.
    #[arg(long, default_value = "1")]
    pub repeat: u64,
    /// Delay between repeated sends (e.g. 2s, 500ms).
    #[arg(long, default_value = "1s")]
    pub interval: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Port to listen on.
    #[arg(long, short = 'p', env = "TSLUMD_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Transport: tcp (framed) or udp.
    #[arg(long, short = 't', env = "TSLUMD_TRANSPORT", default_value = "tcp")]
    pub transport: TransportKind,
    /// Local address to bind.
    #[arg(long, env = "TSLUMD_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,
    /// Exit after printing N packets.
    #[arg(long)]
    pub count: Option<usize>,
    /// Close TCP connections silent for this long (e.g. 30s).
    #[arg(long)]
    pub idle_timeout: Option<String>,
    /// Reject bare 0xFE bytes inside frames instead of passing them through.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture file. Reads stdin when omitted or "-".
    pub file: Option<PathBuf>,
    /// Input is a DLE/STX framed stream rather than one raw packet.
    #[arg(long)]
    pub framed: bool,
    /// Reject bare 0xFE bytes inside frames.
    #[arg(long, requires = "framed")]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("failed to start runtime: {err}")))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else if let Some(num) = input.strip_suffix('m') {
        (num, "m")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value.saturating_mul(60))),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
