use std::path::PathBuf;

use clap::Parser;
use quizforge::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Multiplayer quiz server.
#[derive(Parser, Debug)]
#[command(name = "quiz-server", about = "Multiplayer quiz server")]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of `<pack_id>.json` quiz packages.
    #[arg(long, default_value = "demos/quiz-server/packs")]
    packs: PathBuf,

    /// Overrides `bind_addr` from the configuration.
    #[arg(long)]
    bind: Option<String>,
}

fn load_config(cli: &Cli) -> Result<ServerConfig, QuizforgeError> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::read(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = &cli.bind {
        config.bind_addr = bind.clone();
    }
    if let Ok(secret) = std::env::var("QUIZ_JWT_SECRET") {
        config.jwt_secret = secret;
    }
    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let packs = MemoryPackLibrary::load_dir(&cli.packs)?;
    tracing::info!(count = packs.len(), dir = %cli.packs.display(), "loaded quiz packs");

    let auth = JwtAuthenticator::new(config.jwt_secret.as_bytes())?;
    let server = QuizforgeServerBuilder::new()
        .config(config)
        .build(auth, packs)
        .await?;

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("interrupt received, shutting down");
        })
        .await?;
    Ok(())
}
