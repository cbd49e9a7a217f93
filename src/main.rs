use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roadmap_api::cache::{KvStore, RedisKv};
use roadmap_api::oauth::TokenManager;
use roadmap_api::{app, cli, config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "roadmap_api=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => run_server(cfg, port).await,
        Some(cli::Commands::AuthUrl) => {
            let kv = connect_kv(&cfg).await?;
            let tokens = TokenManager::new(&cfg, kv)?;
            let url = tokens.start_authorization().await?;
            println!("{}", url);
            Ok(())
        }
        None => run_server(cfg, None).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn connect_kv(cfg: &config::Config) -> anyhow::Result<Arc<RedisKv>> {
    tracing::info!("Connecting to Redis...");
    let redis_client = redis::Client::open(cfg.redis_url.as_str())?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client).await?;
    Ok(Arc::new(RedisKv::new(redis_conn)))
}

async fn run_server(cfg: config::Config, port_override: Option<u16>) -> anyhow::Result<()> {
    let port = port_override.unwrap_or(cfg.port);
    let kv = connect_kv(&cfg).await?;

    // Periodic sweep of the local cache tier; Redis handles its own TTLs.
    let sweep = kv.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            let evicted = sweep.evict_expired();
            if evicted > 0 {
                tracing::debug!(evicted, "swept expired local cache entries");
            }
        }
    });

    if cfg.google_client_id.is_none() || cfg.google_client_secret.is_none() {
        tracing::warn!(
            "GOOGLE_CLIENT_ID / GOOGLE_CLIENT_SECRET not set — \
             feature and vote writes will fail until they are configured"
        );
    }

    let state = Arc::new(AppState::new(kv as Arc<dyn KvStore>, cfg));
    let router = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("roadmap API listening on {}", addr);
    axum::serve(listener, router).await?;

    Ok(())
}
