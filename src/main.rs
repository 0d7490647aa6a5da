use clap::Parser;
use rendezvous::config::Config;
use rendezvous::signaling::{CoordinatorHandle, SignalingServer};
use rendezvous::{ChannelHub, Coordinator, JsonFileRoomStore, MemoryRoomStore, RandomUserIds};
use tracing::info;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rendezvous=info".into()),
        )
        .init();

    let config = Config::parse();
    let hub = ChannelHub::new();
    let ids = Box::new(RandomUserIds::new(config.user_id_len));

    let handle = match &config.state_file {
        Some(path) => {
            info!("Persisting rooms to {}", path.display());
            let store = JsonFileRoomStore::new(path);
            CoordinatorHandle::spawn(Coordinator::new(store, hub.clone(), ids), config.queue_depth)
        }
        None => {
            let store = MemoryRoomStore::new();
            CoordinatorHandle::spawn(Coordinator::new(store, hub.clone(), ids), config.queue_depth)
        }
    };

    let server =
        SignalingServer::bind(&config.bind_addr(), handle, hub, config.liveness()).await?;

    println!("   Rendezvous signaling server");
    println!("   Binding to {}", server.local_addr()?);
    println!("   Press Ctrl+C to stop\n");

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}
