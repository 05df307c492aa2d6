mod api;
mod catalog;
mod gateway;
#[cfg(test)]
mod testing;

use catalog::Catalog;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokobot_channels::{TelegramRelay, WhatsAppClient};
use tokobot_core::{
    config::{self, Config},
    shellexpand,
    traits::{AutomationClient, NotificationRelay, Provider, SessionStore},
};
use tokobot_pairing::PairingMachine;
use tokobot_providers::GeminiProvider;
use tokobot_store::{MemorySessionStore, SqliteSessionStore, TimedStore};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Capacity of the inbound message channel.
const INBOX_BUFFER: usize = 256;

#[derive(Parser)]
#[command(
    name = "tokobot",
    version,
    about = "WhatsApp shop assistant with QR pairing relay"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml", env = "TOKOBOT_CONFIG")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot and its HTTP API.
    Serve {
        /// Keep the session in memory only; it is lost on exit.
        #[arg(long)]
        ephemeral: bool,
        /// Do not print pairing QRs on the terminal.
        #[arg(long)]
        quiet: bool,
    },
    /// Show configuration and saved-session health.
    Status,
    /// Answer one message the way the bot would.
    Ask {
        /// The message to answer.
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config::Loaded {
        config: cfg,
        notices,
    } = config::load(&cli.config)?;
    let _guard = init_logging(&cfg)?;
    for notice in &notices {
        tracing::info!("{notice}");
    }

    match cli.command {
        Commands::Serve { ephemeral, quiet } => serve(cfg, ephemeral, quiet).await?,
        Commands::Status => status(&cli.config, &cfg).await,
        Commands::Ask { message } => {
            if message.is_empty() {
                anyhow::bail!("no message provided. Usage: tokobot ask <message>");
            }
            let provider = GeminiProvider::from_config(&cfg.gemini);
            let catalog = Catalog::load_or_empty(Path::new(&shellexpand(&cfg.bot.catalog_path)));
            let reply = gateway::reply_for(&message.join(" "), &catalog, &provider).await;
            println!("{reply}");
        }
    }

    Ok(())
}

/// Console output plus a daily rolling file under `{data_dir}/logs`.
fn init_logging(cfg: &Config) -> anyhow::Result<WorkerGuard> {
    let log_dir = PathBuf::from(shellexpand(&cfg.bot.data_dir)).join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "tokobot.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.bot.log_level.as_str()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()?;
    Ok(guard)
}

async fn open_store(cfg: &Config, ephemeral: bool) -> anyhow::Result<Arc<dyn SessionStore>> {
    let timeout = cfg.session.timeout();
    if ephemeral {
        tracing::warn!("ephemeral mode: the session will not survive a restart");
        return Ok(Arc::new(TimedStore::new(MemorySessionStore::new(), timeout)));
    }
    let store = SqliteSessionStore::connect(&cfg.session.store_url)
        .await
        .map_err(|e| anyhow::anyhow!("cannot open session store: {e}"))?;
    Ok(Arc::new(TimedStore::new(store, timeout)))
}

async fn serve(cfg: Config, ephemeral: bool, quiet: bool) -> anyhow::Result<()> {
    let store = open_store(&cfg, ephemeral).await?;

    let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_BUFFER);
    let mut whatsapp = WhatsAppClient::new(cfg.whatsapp.clone(), inbox_tx);
    if quiet {
        whatsapp = whatsapp.quiet();
    }
    let client: Arc<dyn AutomationClient> = Arc::new(whatsapp);

    let machine = Arc::new(PairingMachine::new(
        cfg.bot.client_identity.clone(),
        client.clone(),
        store.clone(),
    ));
    let provider: Arc<dyn Provider> = Arc::new(GeminiProvider::from_config(&cfg.gemini));
    let relay: Arc<dyn NotificationRelay> = Arc::new(TelegramRelay::new(cfg.telegram.clone()));
    let catalog = Catalog::load_or_empty(Path::new(&shellexpand(&cfg.bot.catalog_path)));

    let gw = gateway::Gateway::new(machine, client, store, provider, relay, catalog, cfg);
    gw.run(inbox_rx).await
}

async fn status(config_path: &str, cfg: &Config) {
    println!("{}: Status Check\n", cfg.bot.name);
    println!("Config: {config_path}");
    println!("Client identity: {}", cfg.bot.client_identity);
    println!("API: http://{}:{}", cfg.api.host, cfg.api.port);
    println!();

    match SqliteSessionStore::connect(&cfg.session.store_url).await {
        Ok(store) => {
            match store.last_saved(&cfg.bot.client_identity).await {
                Ok(Some(at)) => println!("  session store: saved session from {at}"),
                Ok(None) => println!("  session store: reachable, no saved session"),
                Err(e) => println!("  session store: {e}"),
            }
            store.close().await;
        }
        Err(e) => println!("  session store: {e}"),
    }

    let provider = GeminiProvider::from_config(&cfg.gemini);
    println!(
        "  gemini ({}): {}",
        provider.model(),
        if provider.is_available().await {
            "available"
        } else {
            "unavailable"
        }
    );

    let relay = TelegramRelay::new(cfg.telegram.clone());
    println!(
        "  telegram relay: {}",
        if relay.is_configured() {
            "configured"
        } else {
            "not configured (set TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID)"
        }
    );

    let catalog = Catalog::load_or_empty(Path::new(&shellexpand(&cfg.bot.catalog_path)));
    if catalog.is_empty() {
        println!("  catalog: empty ({})", cfg.bot.catalog_path);
    } else {
        println!("  catalog: {} products", catalog.len());
    }
}
