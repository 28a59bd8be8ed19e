use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};

use gonerank_stats::{
    config::AppConfig,
    graphql::GraphqlClient,
    match_filter::CompetitionFilter,
    metrics::MetricsCollector,
    player_stats::{load_player_stats, PlayerStatsRequest},
    types::Who,
    web::{self, AppState},
};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the JSON API
    Serve {
        /// Port to listen on, overrides SERVER_PORT
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print a player's season summary
    PlayerStats {
        /// Player id
        #[arg(long)]
        player: String,

        /// Season id, defaults to the latest season the player played
        #[arg(short, long)]
        season: Option<String>,

        /// Competition id or "all"
        #[arg(short, long, default_value = "all")]
        competition: String,

        /// Only count the ratings of this user
        #[arg(long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();

    let metrics = MetricsCollector::new();
    let client = Arc::new(GraphqlClient::new(&config.graphql, metrics.clone())?);

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            let state = AppState::new(client.clone(), client.clone(), client, metrics);

            let (shutdown_tx, shutdown_rx) = oneshot::channel();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for ctrl-c: {}", e);
                }
                info!("Shutting down");
                let _ = shutdown_tx.send(());
            });

            web::serve(state, config.server.addr(), shutdown_rx).await?;
        }
        Commands::PlayerStats {
            player,
            season,
            competition,
            user,
        } => {
            let request = PlayerStatsRequest {
                player_id: player,
                season_id: season,
                competition: CompetitionFilter::parse(Some(&competition)),
                who: if user.is_some() { Who::User } else { Who::Community },
                viewer_id: user,
            };
            let view = load_player_stats(client.as_ref(), &request).await?;
            println!("{}", view.summary());
        }
    }

    Ok(())
}
