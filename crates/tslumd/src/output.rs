use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use tslumd_packet::{DisplayMessage, Packet, TextEncoding};
use tslumd_session::Delivery;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Where a printed packet came from.
pub struct Origin<'a> {
    pub source: &'a str,
    pub transport: Option<&'a str>,
}

#[derive(Serialize)]
struct PacketOutput<'a> {
    source: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    transport: Option<&'a str>,
    version: u8,
    flags: u8,
    screen: u16,
    encoding: &'static str,
    messages: Vec<MessageOutput>,
    timestamp: String,
}

#[derive(Serialize)]
struct MessageOutput {
    index: u16,
    control: u16,
    left: &'static str,
    text_tally: &'static str,
    right: &'static str,
    brightness: u8,
    text: String,
}

#[derive(Serialize)]
struct ErrorOutput<'a> {
    source: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    transport: Option<&'a str>,
    payload_size: usize,
    error: String,
    timestamp: String,
}

impl From<&DisplayMessage> for MessageOutput {
    fn from(message: &DisplayMessage) -> Self {
        Self {
            index: message.index,
            control: message.control,
            left: message.left_tally().as_str(),
            text_tally: message.text_tally().as_str(),
            right: message.right_tally().as_str(),
            brightness: message.brightness(),
            text: message.text_lossy().into_owned(),
        }
    }
}

pub fn print_delivery(delivery: &Delivery, format: OutputFormat) {
    let source = delivery.source.to_string();
    let origin = Origin {
        source: &source,
        transport: Some(delivery.transport.as_str()),
    };

    match &delivery.packet {
        Ok(packet) => print_packet(packet, &origin, format),
        Err(err) => print_error(&err.to_string(), delivery.payload.len(), &origin, format),
    }
}

pub fn print_packet(packet: &Packet, origin: &Origin<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PacketOutput {
                source: origin.source,
                transport: origin.transport,
                version: packet.version,
                flags: packet.flags,
                screen: packet.screen,
                encoding: encoding_name(packet.text_encoding()),
                messages: packet.messages.iter().map(MessageOutput::from).collect(),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "SCREEN", "INDEX", "LEFT", "TEXT", "RIGHT", "BRIGHT", "DISPLAY", "SOURCE",
                ]);
            for message in &packet.messages {
                table.add_row(vec![
                    packet.screen.to_string(),
                    message.index.to_string(),
                    message.left_tally().to_string(),
                    message.text_tally().to_string(),
                    message.right_tally().to_string(),
                    message.brightness().to_string(),
                    message.text_lossy().into_owned(),
                    origin.source.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if packet.messages.is_empty() {
                println!("screen={} (no messages) from={}", packet.screen, origin.source);
            }
            for message in &packet.messages {
                println!(
                    "screen={} index={} left={} text={} right={} brightness={} {:?} from={}",
                    packet.screen,
                    message.index,
                    message.left_tally(),
                    message.text_tally(),
                    message.right_tally(),
                    message.brightness(),
                    message.text_lossy(),
                    origin.source
                );
            }
        }
    }
}

pub fn print_error(error: &str, payload_size: usize, origin: &Origin<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ErrorOutput {
                source: origin.source,
                transport: origin.transport,
                payload_size,
                error: error.to_string(),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SOURCE", "SIZE", "ERROR"])
                .add_row(vec![
                    origin.source.to_string(),
                    payload_size.to_string(),
                    error.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "error from={} size={}: {}",
                origin.source, payload_size, error
            );
        }
    }
}

fn encoding_name(encoding: TextEncoding) -> &'static str {
    match encoding {
        TextEncoding::Ascii => "ascii",
        TextEncoding::Utf16 => "utf16le",
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
