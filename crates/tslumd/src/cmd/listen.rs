use std::net::SocketAddr;

use tracing::info;
use tslumd_frame::FrameConfig;
use tslumd_session::{Receiver, ReceiverConfig};

use crate::cmd::{parse_duration, runtime, ListenArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_delivery, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let config = receiver_config(&args)?;
    runtime()?.block_on(listen(config, args.count, format))
}

fn receiver_config(args: &ListenArgs) -> CliResult<ReceiverConfig> {
    let mut config = ReceiverConfig::new(args.transport, args.port)
        .with_bind(SocketAddr::new(args.bind, args.port))
        .with_frame_config(FrameConfig {
            strict: args.strict,
            ..FrameConfig::default()
        });
    if let Some(idle) = &args.idle_timeout {
        config = config.with_idle_timeout(parse_duration(idle)?);
    }
    Ok(config)
}

async fn listen(
    config: ReceiverConfig,
    count: Option<usize>,
    format: OutputFormat,
) -> CliResult<i32> {
    let (receiver, mut deliveries) = Receiver::channel(config)
        .await
        .map_err(|err| session_error("listen failed", err))?;
    info!(
        transport = %receiver.transport(),
        local_addr = %receiver.local_addr(),
        "listening"
    );

    let mut printed = 0usize;
    loop {
        let delivery = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            delivery = deliveries.recv() => match delivery {
                Some(delivery) => delivery,
                None => break,
            },
        };

        print_delivery(&delivery, format);
        printed = printed.saturating_add(1);

        if let Some(count) = count {
            if printed >= count {
                break;
            }
        }
    }

    receiver.shutdown().await;
    Ok(SUCCESS)
}
