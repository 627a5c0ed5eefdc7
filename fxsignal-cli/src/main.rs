//! fxsignal CLI: one-shot evaluations, the bot server, config management.
//!
//! Commands:
//! - `signal`: run one evaluation and print the decision
//! - `price`: print the live price
//! - `serve`: run the Telegram bot with scheduler and keep-alive server
//! - `config show`: print the effective config and its fingerprint
//! - `config init`: write a default config file

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use fxsignal_bot::access::AccessStore;
use fxsignal_bot::command::Dispatcher;
use fxsignal_bot::health::spawn_health_server;
use fxsignal_bot::render;
use fxsignal_bot::scheduler::Scheduler;
use fxsignal_bot::shutdown::spawn_signal_listener;
use fxsignal_bot::transport::{run_polling, Messenger, TelegramClient};
use fxsignal_bot::workers::DispatchPool;
use fxsignal_core::data::{CsvProvider, MarketDataProvider, TwelveDataProvider};
use fxsignal_core::{fetch_price, generate_signal, Direction, SignalConfig};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "fxsignal.toml";
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(
    name = "fxsignal",
    about = "Multi-timeframe forex signal engine and Telegram bot"
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Read candles from `<dir>/<interval>.csv` instead of the live API.
    #[arg(long)]
    csv_dir: Option<PathBuf>,

    /// Live price override for CSV data. Defaults to the fastest interval's last close.
    #[arg(long, requires = "csv_dir")]
    price: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one evaluation and print the decision.
    Signal {
        #[command(flatten)]
        source: SourceArgs,

        /// Print the decision as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the live price for the configured symbol.
    Price {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Run the Telegram bot, scheduler and keep-alive server.
    Serve {
        #[command(flatten)]
        source: SourceArgs,

        /// Do not start the automated signal scheduler.
        #[arg(long, default_value_t = false)]
        no_scheduler: bool,

        /// Do not start the keep-alive HTTP server.
        #[arg(long, default_value_t = false)]
        no_health: bool,
    },
    /// Config management commands.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective config and its fingerprint.
    Show,
    /// Write the default config as TOML.
    Init {
        /// Output path.
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Config {
            action: ConfigAction::Init { path, force },
        } => run_config_init(&path, force),
        command => {
            let config = load_config(cli.config.as_deref())?;
            match command {
                Commands::Signal { source, json } => run_signal(&config, &source, json),
                Commands::Price { source } => run_price(&config, &source),
                Commands::Serve {
                    source,
                    no_scheduler,
                    no_health,
                } => run_serve(config, &source, no_scheduler, no_health),
                Commands::Config { .. } => run_config_show(&config),
            }
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> Result<SignalConfig> {
    let config = match path {
        Some(path) => SignalConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SignalConfig::default(),
    };
    info!(
        symbol = %config.symbol,
        fast = %config.fast_interval,
        slow = %config.slow_interval,
        fingerprint = %config.fingerprint()?,
        "configuration loaded"
    );
    Ok(config)
}

fn build_provider(config: &SignalConfig, source: &SourceArgs) -> Result<Arc<dyn MarketDataProvider>> {
    match &source.csv_dir {
        Some(dir) => {
            let mut provider = CsvProvider::open(dir)
                .with_context(|| format!("opening CSV data in {}", dir.display()))?;
            if let Some(price) = source.price {
                provider = provider.with_price(price);
            }
            info!(dir = %dir.display(), "using CSV market data");
            Ok(Arc::new(provider))
        }
        None => {
            let provider = TwelveDataProvider::from_config(&config.provider)?;
            info!(base_url = %config.provider.base_url, "using Twelve Data market data");
            Ok(Arc::new(provider))
        }
    }
}

fn run_signal(config: &SignalConfig, source: &SourceArgs, json: bool) -> Result<()> {
    let provider = build_provider(config, source)?;
    let decision = generate_signal(provider.as_ref(), config);
    info!(direction = %decision.direction, entry = decision.entry_price, "evaluation complete");

    if json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        println!(
            "{}",
            render::decision_card(&decision, &config.symbol, config.risk.risk_reward, Utc::now())
        );
    }

    if decision.direction == Direction::Error {
        std::process::exit(1);
    }
    Ok(())
}

fn run_price(config: &SignalConfig, source: &SourceArgs) -> Result<()> {
    let provider = build_provider(config, source)?;
    let price = fetch_price(provider.as_ref(), &config.symbol)
        .with_context(|| format!("fetching price for {}", config.symbol))?;
    println!("{} {price:.5}", config.symbol);
    Ok(())
}

fn run_serve(
    config: SignalConfig,
    source: &SourceArgs,
    no_scheduler: bool,
    no_health: bool,
) -> Result<()> {
    let provider = build_provider(&config, source)?;
    let client = Arc::new(TelegramClient::from_config(&config.bot)?);
    let config = Arc::new(config);
    let store = Arc::new(Mutex::new(AccessStore::from_config(&config.bot)));
    let messenger: Arc<dyn Messenger> = client.clone();

    let health = if config.health.enabled && !no_health {
        let handle = spawn_health_server(config.health.port)
            .with_context(|| format!("starting keep-alive server on port {}", config.health.port))?;
        info!(addr = %handle.local_addr(), "keep-alive server started");
        Some(handle)
    } else {
        None
    };

    let scheduler = if config.scheduler.enabled && !no_scheduler {
        let scheduler = Scheduler::new(
            provider.clone(),
            config.clone(),
            store.clone(),
            messenger.clone(),
        );
        Some(scheduler.spawn().context("starting scheduler thread")?)
    } else {
        info!("scheduler disabled");
        None
    };

    let stop = Arc::new(AtomicBool::new(false));
    spawn_signal_listener(stop.clone()).context("starting signal listener")?;

    let dispatcher = Arc::new(Dispatcher::new(
        store,
        provider,
        config.clone(),
        messenger.clone(),
    ));
    let pool = DispatchPool::spawn(config.bot.dispatch_workers, dispatcher, messenger)
        .context("starting dispatch workers")?;
    info!(symbol = %config.symbol, "bot running, Ctrl-C to stop");
    run_polling(client.as_ref(), &pool, &stop, POLL_ERROR_BACKOFF);

    let panicked = pool.shutdown();
    if panicked > 0 {
        warn!(panicked, "dispatch workers panicked");
    }

    if let Some(handle) = scheduler {
        handle.stop();
        if handle.join().is_err() {
            warn!("scheduler thread panicked");
        }
    }
    if let Some(handle) = health {
        if handle.stop().is_err() {
            warn!("keep-alive thread panicked");
        }
    }
    info!("bot stopped");
    Ok(())
}

fn run_config_show(config: &SignalConfig) -> Result<()> {
    println!("# fingerprint: {}", config.fingerprint()?);
    print!("{}", config.to_toml()?);
    Ok(())
}

fn run_config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let text = SignalConfig::default().to_toml()?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_signal_with_csv_source() {
        let cli = Cli::try_parse_from([
            "fxsignal", "--config", "bot.toml", "signal", "--csv-dir", "data", "--price", "1.27",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some(Path::new("bot.toml")));
        match cli.command {
            Commands::Signal { source, json } => {
                assert!(json);
                assert_eq!(source.csv_dir.as_deref(), Some(Path::new("data")));
                assert_eq!(source.price, Some(1.27));
            }
            _ => panic!("expected signal"),
        }
    }

    #[test]
    fn price_override_requires_csv_dir() {
        assert!(Cli::try_parse_from(["fxsignal", "price", "--price", "1.2"]).is_err());
    }

    #[test]
    fn config_init_defaults_path() {
        let cli = Cli::try_parse_from(["fxsignal", "config", "init"]).unwrap();
        match cli.command {
            Commands::Config {
                action: ConfigAction::Init { path, force },
            } => {
                assert_eq!(path, PathBuf::from(DEFAULT_CONFIG_PATH));
                assert!(!force);
            }
            _ => panic!("expected config init"),
        }
    }
}
