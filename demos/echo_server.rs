// ABOUTME: Example echo server built on the framed socket API
// ABOUTME: Accepts connections and echoes every inbound frame back to its peer

use argh::FromArgs;
use fsock::{Event, Socket};
use std::error::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Echo server: every frame a peer sends comes straight back.
#[derive(FromArgs)]
struct CliArgs {
    /// address to listen on (default: tcp://127.0.0.1:7458)
    #[argh(option, short = 'l')]
    listen: Option<String>,

    /// whether or not to enable debug logging
    #[argh(switch, short = 'd')]
    debugging: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = argh::from_env();

    let level = if cli_args.debugging {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let listen = cli_args
        .listen
        .unwrap_or_else(|| "tcp://127.0.0.1:7458".to_owned());

    let mut listener = Socket::bind(&listen).await?;
    tracing::info!(%listen, "listening");

    while let Some(event) = listener.recv().await {
        let Event::NewConnection(mut conn) = event else {
            continue;
        };
        tracing::info!(peer = ?conn.peer_addr(), "peer connected");

        tokio::spawn(async move {
            while let Some(event) = conn.recv().await {
                match event {
                    Event::Frame(frame) => {
                        tracing::info!(len = frame.len(), "echoing frame");
                        if conn.send(frame).is_err() {
                            break;
                        }
                    }
                    Event::Closed => {
                        tracing::info!(peer = ?conn.peer_addr(), "peer disconnected");
                        break;
                    }
                    Event::NewConnection(_) => unreachable!(),
                }
            }
        });
    }

    Ok(())
}
