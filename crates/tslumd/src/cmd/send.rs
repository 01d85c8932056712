use std::time::Duration;

use tracing::info;
use tslumd_packet::{DisplayMessage, Packet};
use tslumd_session::Sender;
use tslumd_transport::Endpoint;

use crate::cmd::{parse_duration, runtime, SendArgs};
use crate::exit::{packet_error, session_error, CliResult, SUCCESS};

pub fn run(args: SendArgs) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let packet = build_packet(&args);
    // Fail on oversized text before touching the network.
    tslumd_packet::encode(&packet).map_err(|err| packet_error("invalid message", err))?;

    let endpoint = Endpoint::new(args.transport, args.host.clone(), args.port);
    runtime()?.block_on(send_loop(&endpoint, &packet, args.repeat, interval))
}

fn build_packet(args: &SendArgs) -> Packet {
    Packet::new(args.screen).with_message(
        DisplayMessage::new(args.index, args.text.clone())
            .with_tallies(args.left.into(), args.text_tally.into(), args.right.into())
            .with_brightness(args.brightness),
    )
}

async fn send_loop(
    endpoint: &Endpoint,
    packet: &Packet,
    repeat: u64,
    interval: Duration,
) -> CliResult<i32> {
    let mut sender = Sender::connect(endpoint)
        .await
        .map_err(|err| session_error("connect failed", err))?;

    let mut sent = 0u64;
    loop {
        sender
            .send_packet(packet)
            .await
            .map_err(|err| session_error("send failed", err))?;
        sent += 1;

        if repeat != 0 && sent >= repeat {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    sender
        .close()
        .await
        .map_err(|err| session_error("close failed", err))?;
    info!(%endpoint, packets = sent, "send complete");
    Ok(SUCCESS)
}
