use futures::StreamExt;
use micro_req::{Client, Error};
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let url = std::env::args().nth(1).unwrap_or_else(|| "http://127.0.0.1:8080/events".to_owned());

    let client = Client::builder().connect_timeout(Duration::from_secs(3)).build().expect("client should be built");
    let response = client.get(&url).with_stream_headers().send().await;
    if let Some(e) = response.error() {
        error!(url = %url, cause = %e, "failed to open event stream");
        return Err(e.clone());
    }
    info!(url = %url, status = ?response.status(), "event stream opened");

    let mut events = response.into_event_stream()?.into_stream().boxed();
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => info!(name = %event.name, id = ?event.id, data = %event.data, "event received"),
            Err(e) => {
                warn!(cause = %e, "event stream failed");
                break;
            }
        }
    }

    info!("event stream ended");
    Ok(())
}
