use clap::Parser;
use log::info;
use server::catalog::{standard_definitions, SamplerConfig, TokenCatalog};
use server::game::GameRoom;
use server::network::Server;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let catalog = TokenCatalog::new(standard_definitions(), SamplerConfig::default())?;
    info!(
        "Token catalog loaded with {} definitions",
        catalog.definition_count()
    );

    let room = GameRoom::new(catalog);

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, room).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
