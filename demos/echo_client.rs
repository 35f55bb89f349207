// ABOUTME: Example client for the echo server demo
// ABOUTME: Sends a message a number of times and waits for the echoes

use argh::FromArgs;
use fsock::{Event, Socket};
use std::error::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Echo client: send a message and print what comes back.
#[derive(FromArgs)]
struct CliArgs {
    /// address to connect to (default: tcp://127.0.0.1:7458)
    #[argh(option, short = 'c')]
    connect: Option<String>,

    /// the message to send
    #[argh(option, short = 'm')]
    message: String,

    /// how many copies of the message to send (default: 1)
    #[argh(option, short = 'n')]
    count: Option<usize>,

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

    let connect = cli_args
        .connect
        .unwrap_or_else(|| "tcp://127.0.0.1:7458".to_owned());
    let count = cli_args.count.unwrap_or(1);

    let mut socket = Socket::connect(&connect).await?;
    tracing::info!(%connect, "connected");

    for _ in 0..count {
        socket.send_bytes(cli_args.message.as_bytes())?;
    }

    let mut received = 0;
    while received < count {
        match socket.recv().await {
            Some(Event::Frame(frame)) => {
                received += 1;
                println!("{}", String::from_utf8_lossy(frame.payload()));
            }
            Some(Event::Closed) | None => {
                tracing::warn!("connection closed before all echoes arrived");
                break;
            }
            Some(Event::NewConnection(_)) => unreachable!(),
        }
    }

    socket.close();
    Ok(())
}
