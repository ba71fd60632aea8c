use clap::Parser;
use echo_toy::server::Server;

/// TCP echo server: echoes every byte received back to its sender.
#[derive(Parser, Debug)]
struct Cli {
    /// port to listen on (all interfaces)
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let addr = ([0, 0, 0, 0], cli.port).into();

    let (server, shutdown) = Server::bind(addr).await?;
    tracing::info!("listening on {}", server.local_addr()?);

    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!("could not listen for termination signal: {err:?}");
            return;
        }
        tracing::info!("termination signal received, shutting down");
        shutdown.shutdown();
    });

    server.run().await?;
    Ok(())
}
