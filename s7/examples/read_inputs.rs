use std::error::Error;
use std::time::Duration;

use s7::client::*;
use s7::*;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let config = ConnectionConfig::default()
        .with_response_timeout(Duration::from_secs(1))
        .with_decode_level(AppDecodeLevel::ItemValues.into());

    let connection = Connection::from_url("s7://127.0.0.1/0/2", config)?;
    connection.connect().await?;

    let start = connection.parse_address("INPUTS/0/0")?;
    let status = connection.parse_address("INPUTS/1")?;
    let speed = connection.parse_address("DATA_BLOCKS/10/4")?;

    let request = ReadRequest::new()
        .add::<bool>(start)
        .add::<u8>(status)
        .add::<f32>(speed);

    // await the result
    let response = connection.read(request.clone())?.response().await?;
    println!("start: {:?}", response.get::<bool>(&start));
    println!("status: {:?}", response.get::<u8>(&status));
    println!("speed: {:?}", response.get::<f32>(&speed));

    // block a thread until the result is available
    let read = connection.read(request.clone())?;
    let response = tokio::task::spawn_blocking(move || read.wait()).await??;
    for (address, result) in response.iter() {
        println!("{address} : {result:?}");
    }

    // or receive it in a callback
    let (tx, rx) = tokio::sync::oneshot::channel();
    connection.read(request)?.on_complete(move |result| {
        let _ = tx.send(result.map(|response| response.len()));
    });
    println!("items read by callback: {:?}", rx.await?);

    connection.disconnect().await;
    Ok(())
}
