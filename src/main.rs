//! fetchcore - Adaptive URL fetch service command line interface.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[cfg(feature = "headless")]
use fetchcore::advanced::AdvancedOrchestrator;
use fetchcore::api::{self, AppState};
use fetchcore::config::{AppConfig, ConfigHandle, Paths};
use fetchcore::engines::BrowserPoolHandle;
use fetchcore::escalation::Scheduler;
use fetchcore::logging;
use fetchcore::profile_store::ProfileStore;
use fetchcore::proxy::{ProxyConfig, ProxyPool, ProxyProtocol};

/// fetchcore - Adaptive URL fetch service
#[derive(Parser)]
#[command(name = "fetchcore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server (default when no subcommand is given)
    Serve {
        /// Port to bind the fetch API on
        #[arg(long, default_value_t = 8787)]
        port: u16,
    },

    /// List persisted per-domain anti-bot profiles
    Profiles,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve { port: default_port() }) {
        Commands::Serve { port } => serve(port).await,
        Commands::Profiles => list_profiles().await,
    }
}

fn default_port() -> u16 {
    std::env::var("CRAWLER_API_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8787)
}

async fn serve(port: u16) -> Result<()> {
    let paths = Arc::new(Paths::from_env());
    let (logs, _log_guard) = logging::init(&paths.logs_dir);

    let config_handle = ConfigHandle::load(&paths);
    let config = config_handle.current();

    let proxy_pool = Arc::new(build_proxy_pool(&config));
    let profile_store = Arc::new(ProfileStore::open(&paths.db_path())?);
    let scheduler = Arc::new(Scheduler::new(Arc::clone(&profile_store)));

    let browser_pool = build_browser_pool(&config);

    #[cfg(feature = "headless")]
    let advanced = browser_pool
        .clone()
        .map(|pool| Arc::new(AdvancedOrchestrator::new(pool)));

    let state = AppState {
        scheduler,
        #[cfg(feature = "headless")]
        advanced,
        config: config_handle,
        paths: Arc::clone(&paths),
        proxy_pool,
        browser_pool,
        profile_store,
        logs,
        started_at: Instant::now(),
    };

    let router = api::router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "fetchcore listening");
    axum::serve(listener, router).await?;
    Ok(())
}

async fn list_profiles() -> Result<()> {
    let paths = Paths::from_env();
    let store = ProfileStore::open(&paths.db_path())?;
    let profiles = store.all()?;

    if profiles.is_empty() {
        println!("No persisted domain profiles.");
        return Ok(());
    }

    for profile in profiles {
        println!(
            "{:<32} engine={:<14} proxy={:<5} delay_ms={:<6} hits={}",
            profile.domain, profile.engine, profile.use_proxy, profile.render_delay_ms, profile.hit_count
        );
    }
    Ok(())
}

#[cfg(feature = "headless")]
fn build_browser_pool(config: &AppConfig) -> Option<BrowserPoolHandle> {
    config
        .browserless_url
        .as_ref()
        .map(|endpoint| Arc::new(fetchcore::browser_pool::BrowserPool::new(endpoint.clone(), config.max_tabs)))
}

#[cfg(not(feature = "headless"))]
fn build_browser_pool(_config: &AppConfig) -> Option<BrowserPoolHandle> {
    None
}

fn build_proxy_pool(config: &AppConfig) -> ProxyPool {
    let Some(proxy_url) = &config.proxy_url else {
        return ProxyPool::new();
    };

    match parse_proxy_url(proxy_url) {
        Ok(proxy_config) => ProxyPool::with_proxies(vec![proxy_config]),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unparseable PROXY_URL");
            ProxyPool::new()
        }
    }
}

fn parse_proxy_url(url: &str) -> Result<ProxyConfig> {
    let url = url::Url::parse(url)?;

    let protocol = match url.scheme() {
        "http" => ProxyProtocol::Http,
        "https" => ProxyProtocol::Https,
        "socks5" => ProxyProtocol::Socks5,
        scheme => anyhow::bail!("Unsupported proxy protocol: {}", scheme),
    };

    let host = url
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("Missing proxy host"))?;
    let port = url.port().unwrap_or(match protocol {
        ProxyProtocol::Http | ProxyProtocol::Https => 8080,
        ProxyProtocol::Socks5 => 1080,
    });

    let mut config = ProxyConfig::new(host, port).with_protocol(protocol);

    if let Some(password) = url.password() {
        config = config.with_auth(url.username(), password);
    }

    Ok(config)
}
