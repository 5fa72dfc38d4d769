//! Binary entry point: load configuration, wire up the engine's
//! collaborators, and run until a shutdown signal arrives.

use std::sync::Arc;

use clap::Parser as _;
use signaltrader::cli::{Cli, Commands};
use signaltrader::config::Config;
use signaltrader::engine::{Engine, EngineDeps};
use signaltrader::error::Result;
use signaltrader::notify::{NoopNotifier, Notifier};
use signaltrader::parser::{BfpParser, BpsParser, CcsParser, FwpParser, Registry, ResultsParser};
use signaltrader::state::InMemoryStore;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

#[cfg(feature = "binance")]
use signaltrader::exchange::binance::{BinanceClient, BinanceConfig, BinanceSocketManager};
#[cfg(feature = "telegram")]
use signaltrader::notify::telegram::{TelegramConfig, TelegramNotifier};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;

    match &cli.command {
        Commands::Check => {
            println!("configuration is valid: {} channel(s) registered", config.channels.len());
            Ok(())
        }
        Commands::Run(args) => {
            if let Some(level) = &cli.log_level {
                std::env::set_var("RUST_LOG", level);
            }
            if args.json_logs {
                config.logging.format = signaltrader::config::LogFormat::Json;
            }
            config.init_logging();

            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .expect("failed to start async runtime")
                .block_on(run(config, args.dry_run))
        }
    }
}

async fn run(config: Config, dry_run: bool) -> Result<()> {
    let registry = build_registry(&config);

    #[cfg(feature = "binance")]
    let (exchange, sockets) = {
        let api_key = config.exchange.api_key.clone().unwrap_or_default();
        let api_secret = config.exchange.api_secret.clone().unwrap_or_default();
        let binance_config = if config.exchange.testnet {
            BinanceConfig::testnet(api_key, api_secret)
        } else {
            BinanceConfig::mainnet(api_key, api_secret)
        };
        (
            Arc::new(BinanceClient::new(binance_config.clone())) as Arc<dyn signaltrader::exchange::ExchangeClient>,
            Arc::new(BinanceSocketManager::new(binance_config)) as Arc<dyn signaltrader::exchange::SocketManager>,
        )
    };

    #[cfg(not(feature = "binance"))]
    compile_error!("the binary requires the \"binance\" feature");

    let notifier = build_notifier(&config);

    if dry_run {
        info!("dry-run enabled: orders will be built but never sent to the exchange");
    }

    let deps = EngineDeps {
        exchange,
        sockets,
        store: Arc::new(InMemoryStore::new()),
        notifier,
        registry,
        risk: config.risk.clone(),
        timing: config.timing.clone(),
        dry_run,
    };

    let engine = Engine::new(deps).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine_task = {
        let engine = Arc::clone(&engine);
        tokio::spawn(engine.run(shutdown_rx))
    };

    wait_for_shutdown_signal().await;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    let _ = engine_task.await;

    Ok(())
}

fn build_registry(config: &Config) -> Registry {
    use signaltrader::config::ParserKind;

    let mut registry = Registry::new();
    for channel in &config.channels {
        let parser: Box<dyn signaltrader::parser::Parser> = match channel.parser {
            ParserKind::Results => Box::new(ResultsParser::new(&channel.tag, channel.default_leverage)),
            ParserKind::Bfp => Box::new(BfpParser::new(&channel.tag, channel.default_leverage)),
            ParserKind::Bps => Box::new(BpsParser::new(&channel.tag, channel.default_leverage)),
            ParserKind::Ccs => Box::new(CcsParser::new(&channel.tag, channel.default_leverage)),
            ParserKind::Fwp => Box::new(FwpParser::new(&channel.tag, channel.default_leverage)),
        };
        registry.register(channel.chat_id, parser);
    }
    registry
}

fn build_notifier(config: &Config) -> Arc<dyn Notifier> {
    #[cfg(feature = "telegram")]
    if config.telegram.enabled {
        if let (Some(bot_token), Some(chat_id)) =
            (config.telegram.bot_token.clone(), config.telegram.chat_id)
        {
            return Arc::new(TelegramNotifier::new(TelegramConfig { bot_token, chat_id }));
        }
    }
    let _ = config;
    Arc::new(NoopNotifier)
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
