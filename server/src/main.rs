use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;

/// Main-method of the application.
/// Parses command-line arguments, binds the listener and serves until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "5006")]
        port: u16,
        /// Maximum number of connected players
        #[clap(short, long, default_value = "64")]
        max_players: usize,
        /// Moves after which a game is declared drawn
        #[clap(long, default_value = "200")]
        move_limit: usize,
        /// Seed for color assignment, for reproducible sessions
        #[clap(long)]
        seed: Option<u64>,
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ServerConfig {
        max_players: args.max_players,
        move_limit: args.move_limit,
        seed: args.seed,
    };

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::bind(&address, config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
