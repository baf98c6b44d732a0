//! Command-line S7 client

use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use s7::client::*;
use s7::*;

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("{0}")]
    Url(#[from] UrlError),
    #[error("{0}")]
    Address(#[from] AddressError),
    #[error("{0}")]
    DataType(#[from] UnknownDataType),
    #[error("expected ADDRESS:TYPE but got '{0}'")]
    BadItem(String),
    #[error("{0}")]
    Connect(#[from] ConnectError),
    #[error("{0}")]
    Read(#[from] ReadError),
    #[error("{0}")]
    Request(#[from] RequestError),
    #[error("the result was never delivered")]
    Dropped,
}

#[derive(Parser)]
#[command(name = "s7-client")]
#[command(about = "A command line program for reading S7 PLC memory using the s7 crate")]
#[command(version = "0.1.0")]
struct Cli {
    #[arg(long, default_value = "s7://127.0.0.1/0/2", help = "PLC url: s7://host/rack/slot")]
    url: String,

    #[arg(long, default_value_t = DEFAULT_PORT, help = "TCP port of the PLC")]
    port: u16,

    #[arg(short = 't', long, default_value_t = 1000, help = "Response timeout in milliseconds")]
    timeout_ms: u64,

    #[arg(short = 'p', long, help = "Optional polling period in milliseconds")]
    period_ms: Option<u64>,

    #[arg(long = "async", help = "Receive results through a completion callback instead of a blocking wait")]
    use_async: bool,

    #[arg(long, default_value = "item-values", help = "Application decode level")]
    app_level: AppDecodeLevel,

    #[arg(long, default_value = "nothing", help = "Frame decode level")]
    frame_level: FrameDecodeLevel,

    #[arg(long, default_value = "nothing", help = "Physical layer decode level")]
    phys_level: PhysDecodeLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(name = "read", about = "read one or more items")]
    Read(ReadArgs),
}

#[derive(Args)]
struct ReadArgs {
    #[arg(required = true, help = "items as ADDRESS:TYPE, e.g. DATA_BLOCKS/1/4:INT")]
    items: Vec<String>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    if let Err(ref e) = run().await {
        println!("error: {e}");
    }

    Ok(())
}

async fn run() -> Result<(), Error> {
    let cli = Cli::parse();

    let config = ConnectionConfig::default()
        .with_port(cli.port)
        .with_response_timeout(Duration::from_millis(cli.timeout_ms))
        .with_decode_level(DecodeLevel::new(
            cli.app_level,
            cli.frame_level,
            cli.phys_level,
        ));

    let connection = Connection::from_url(&cli.url, config)?;
    connection.connect().await?;

    let result = match cli.period_ms {
        None => run_command(&cli.command, &connection, cli.use_async).await,
        Some(period_ms) => {
            let period = Duration::from_millis(period_ms);
            loop {
                if let Err(err) = run_command(&cli.command, &connection, cli.use_async).await {
                    break Err(err);
                }
                tokio::time::sleep(period).await
            }
        }
    };

    connection.disconnect().await;
    result
}

async fn run_command(command: &Command, connection: &Connection, use_async: bool) -> Result<(), Error> {
    match command {
        Command::Read(args) => {
            let mut request = ReadRequest::new();
            for item in &args.items {
                let (address, data_type) = parse_item(item)?;
                request.push(address, data_type);
            }

            let read = connection.read(request)?;
            let response = if use_async {
                let (tx, rx) = tokio::sync::oneshot::channel();
                read.on_complete(move |result| {
                    let _ = tx.send(result);
                });
                rx.await.map_err(|_| Error::Dropped)??
            } else {
                tokio::task::spawn_blocking(move || read.wait())
                    .await
                    .map_err(|_| Error::Dropped)??
            };

            for (address, result) in response.iter() {
                match result {
                    Ok(value) => println!("{address} : {value}"),
                    Err(err) => println!("{address} : {err}"),
                }
            }
        }
    }
    Ok(())
}

fn parse_item(item: &str) -> Result<(AddressDescriptor, DataType), Error> {
    let (address, data_type) = item
        .rsplit_once(':')
        .ok_or_else(|| Error::BadItem(item.to_string()))?;
    Ok((resolve(address)?, data_type.parse()?))
}
