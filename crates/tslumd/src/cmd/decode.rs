use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tracing::warn;
use tslumd_frame::{FrameConfig, FrameReader};

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, packet_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_error, print_packet, Origin, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let (label, input) = open_input(args.file.as_deref())?;
    let origin = Origin {
        source: &label,
        transport: None,
    };

    if !args.framed {
        return decode_raw(input, &origin, format);
    }

    let config = FrameConfig {
        strict: args.strict,
        ..FrameConfig::default()
    };
    decode_framed(FrameReader::with_config(input, config), &origin, format)
}

fn open_input(file: Option<&Path>) -> CliResult<(String, Box<dyn Read>)> {
    match file {
        Some(path) if path != Path::new("-") => {
            let handle = File::open(path)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
            Ok((path.display().to_string(), Box::new(handle)))
        }
        _ => Ok(("stdin".to_string(), Box::new(io::stdin()))),
    }
}

fn decode_raw(
    mut input: Box<dyn Read>,
    origin: &Origin<'_>,
    format: OutputFormat,
) -> CliResult<i32> {
    let mut bytes = Vec::new();
    input
        .read_to_end(&mut bytes)
        .map_err(|err| io_error(&format!("failed reading {}", origin.source), err))?;

    let packet =
        tslumd_packet::decode(&bytes).map_err(|err| packet_error("decode failed", err))?;
    print_packet(&packet, origin, format);
    Ok(SUCCESS)
}

/// Print every packet in a framed capture. Undecodable frames are reported
/// and skipped; a framing error ends the run.
fn decode_framed<R: Read>(
    reader: FrameReader<R>,
    origin: &Origin<'_>,
    format: OutputFormat,
) -> CliResult<i32> {
    let mut failed = 0usize;
    for payload in reader {
        let payload = payload.map_err(|err| frame_error("decode failed", err))?;
        match tslumd_packet::decode(&payload) {
            Ok(packet) => print_packet(&packet, origin, format),
            Err(err) => {
                warn!(source = origin.source, error = %err, "frame did not decode");
                print_error(&err.to_string(), payload.len(), origin, format);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        Ok(DATA_INVALID)
    } else {
        Ok(SUCCESS)
    }
}
