use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use talad_core::TaladConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use talad_server::http::{self, HttpState};
use talad_server::subsystems::{notify::Notifier, publish};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "talad.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config
    let config = match TaladConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Connect to DB
    let pool = match talad_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match talad_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        match tokio::fs::metadata(&config.articles.dir).await {
            Ok(meta) if meta.is_dir() => println!("✅ Articles directory: {}", config.articles.dir),
            _ => println!("ℹ️ Articles directory missing (created on first publish): {}", config.articles.dir),
        }

        println!("✅ Talad health check passed");
        return Ok(());
    }

    // Shutdown signal
    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    // Article store: one instance owns the cache and the update lock
    let store = Arc::new(talad_core::ArticleStore::new(
        config.articles.dir.as_str(),
        Duration::from_secs(config.articles.cache_ttl_seconds),
    ));

    // Narrative backend
    let narrator: Arc<dyn talad_core::ai::NarrativeBackend> =
        match publish::create_narrator_from_config(&config) {
            Ok(backend) => Arc::from(backend),
            Err(e) => {
                tracing::warn!("Narrative backend unavailable, using phrase fallback: {}", e);
                Arc::new(talad_core::DisabledNarrativeClient)
            }
        };
    tracing::info!(backend = narrator.name(), "Narrative backend ready");

    // Messaging bot forwarder
    let notifier = Arc::new(Notifier::from_config(&config.notify)?);
    if notifier.is_enabled() {
        tracing::info!("Notification forwarding enabled");
    }

    let state = Arc::new(HttpState {
        pool,
        store,
        narrator,
        notifier,
    });

    http::start_http_server(state, &config.http, tx.subscribe()).await?;

    Ok(())
}
