use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};

use common::config::DashboardConfig;
use common::logger;
use common::models::{BufferPolicy, Market, TradeKind, TradeParams};
use dashboard::{SignalSyncController, ViewState};
use signal_api::{AnalysisRequest, ChatRequest, SignalApi, SignalClient, SignalRequest};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Terminal dashboard for the trading-signal service",
    long_about = None
)]
struct Cli {
    /// Base URL of the signal service
    #[arg(long, env = "SIGNAL_API_URL", global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll a symbol and redraw whenever the state changes, until Ctrl-C
    Watch {
        symbol: String,
        /// Guessed from the symbol when omitted
        #[arg(long, value_enum)]
        market: Option<MarketArg>,
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Show the full chart of each response instead of a rolling window
        #[arg(long, default_value_t = false)]
        snapshot: bool,
    },
    /// Fetch one signal and print it with its whole chart
    Signal {
        symbol: String,
        #[arg(long, value_enum)]
        market: Option<MarketArg>,
        /// Keep only the newest candle, as `watch` does
        #[arg(long, default_value_t = false)]
        rolling: bool,
    },
    /// Quick lookup through POST /signal
    Quick {
        symbol: String,
        #[arg(long)]
        market_type: Option<String>,
        /// Candle interval, e.g. 1h or 4h
        #[arg(long)]
        timeframe: Option<String>,
    },
    /// Human-readable analysis of a pair through POST /analyze
    Analyze {
        pair: String,
        #[arg(long)]
        timeframe: Option<String>,
    },
    /// Place a manual trade, then print the portfolio
    Trade {
        #[arg(value_enum)]
        side: Side,
        symbol: String,
        #[arg(long, value_enum)]
        market: Option<MarketArg>,
        #[arg(long, default_value = "0.001")]
        amount: String,
        #[arg(long, default_value = "2")]
        tp: String,
        #[arg(long, default_value = "1")]
        sl: String,
    },
    Portfolio,
    Journal,
    /// Ask the assistant a question
    Ask {
        #[arg(required = true)]
        message: Vec<String>,
        #[arg(long)]
        model: Option<String>,
        /// Include the latest snapshot of this pair in the prompt
        #[arg(long)]
        pair: Option<String>,
        #[arg(long, requires = "pair")]
        timeframe: Option<String>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum MarketArg {
    Stocks,
    Crypto,
    Forex,
    Trade,
}

impl From<MarketArg> for Market {
    fn from(arg: MarketArg) -> Self {
        match arg {
            MarketArg::Stocks => Market::Stocks,
            MarketArg::Crypto => Market::Crypto,
            MarketArg::Forex => Market::Forex,
            MarketArg::Trade => Market::Trade,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Side {
    Buy,
    Sell,
}

impl From<Side> for TradeKind {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => TradeKind::Buy,
            Side::Sell => TradeKind::Sell,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::setup_logger();
    let cli = Cli::parse();

    let mut config = DashboardConfig::from_env().context("Invalid dashboard configuration")?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    debug!("Signal service at {}", config.api_url);

    let client = SignalClient::from_config(&config)?;

    match cli.command {
        Command::Watch {
            symbol,
            market,
            interval_ms,
            snapshot,
        } => {
            let period = interval_ms
                .map(Duration::from_millis)
                .unwrap_or(config.poll_interval);
            let controller = controller_for(client, policy(&config, snapshot));
            controller.set_query_input(market.map(Market::from), &symbol)?;
            watch(controller, period).await
        }
        Command::Signal {
            symbol,
            market,
            rolling,
        } => {
            let policy = if rolling {
                config.buffer_policy
            } else {
                BufferPolicy::Snapshot
            };
            let controller = controller_for(client, policy);
            controller.set_query_input(market.map(Market::from), &symbol)?;
            let outcome = controller.fetch_once().await;
            print!("{}", ViewState::derive(&controller.snapshot()).render_text());
            controller.dispose();
            outcome?;
            Ok(())
        }
        Command::Quick {
            symbol,
            market_type,
            timeframe,
        } => {
            let request = SignalRequest::new(symbol, market_type).with_timeframe(timeframe);
            let quick = client.post_signal(&request).await?;
            println!(
                "{}: {}",
                quick.symbol,
                quick
                    .action
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
            for (label, value) in [
                ("Last price", quick.last_price),
                ("Take profit", quick.take_profit),
                ("Stop loss", quick.stop_loss),
                ("Confidence", quick.confidence),
            ] {
                if let Some(v) = value {
                    println!("  {:<12} {}", label, v);
                }
            }
            for (name, value) in &quick.indicators {
                println!("  {:<12} {:.2}", name, value);
            }
            if let Some(ts) = quick.timestamp {
                println!("  at {}", ts);
            }
            Ok(())
        }
        Command::Trade {
            side,
            symbol,
            market,
            amount,
            tp,
            sl,
        } => {
            let params = TradeParams::parse(&amount, &tp, &sl)?;
            let controller = controller_for(client, config.buffer_policy);
            controller.set_query_input(market.map(Market::from), &symbol)?;
            controller.set_trade_params(params)?;
            controller.execute_action(side.into())?.await?;
            print!("{}", ViewState::derive(&controller.snapshot()).render_text());
            controller.dispose();
            Ok(())
        }
        Command::Analyze { pair, timeframe } => {
            let analysis = client
                .analyze(&AnalysisRequest::new(pair, timeframe))
                .await?;
            println!("{}\n{}", analysis.pair, analysis.analysis);
            Ok(())
        }
        Command::Portfolio => {
            let snapshot = client.portfolio().await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Command::Journal => {
            let entries = client.journal().await?;
            if entries.is_empty() {
                println!("Journal is empty.");
            }
            for entry in entries {
                let cell = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |x| x.to_string());
                println!(
                    "{:<24} {:<10} {:<6} price {:<10} tp {:<10} sl {:<10} conf {}",
                    entry.timestamp.as_deref().unwrap_or("-"),
                    entry.symbol.as_deref().unwrap_or("-"),
                    entry.signal.as_deref().unwrap_or("-"),
                    cell(entry.last_price),
                    cell(entry.tp),
                    cell(entry.sl),
                    cell(entry.confidence),
                );
            }
            Ok(())
        }
        Command::Ask {
            message,
            model,
            pair,
            timeframe,
        } => {
            let mut request = ChatRequest::new(message.join(" "), model);
            if let Some(pair) = pair {
                request = request.with_pair(pair, timeframe);
            }
            let reply = client.ask(&request).await?;
            println!("{}", reply.response);
            Ok(())
        }
    }
}

fn controller_for(client: SignalClient, policy: BufferPolicy) -> SignalSyncController {
    SignalSyncController::new(Arc::new(client), policy)
}

fn policy(config: &DashboardConfig, snapshot: bool) -> BufferPolicy {
    if snapshot {
        BufferPolicy::Snapshot
    } else {
        config.buffer_policy
    }
}

async fn watch(controller: SignalSyncController, period: Duration) -> anyhow::Result<()> {
    let mut rx = controller.subscribe();
    controller.start_polling(period)?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut last = String::new();

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = ViewState::derive(&rx.borrow_and_update());
                let text = view.render_text();
                if text != last {
                    println!("{}", text);
                    last = text;
                }
                // A notice is shown once, then cleared.
                if view.notice.is_some() {
                    controller.dismiss_notice();
                }
            }
            _ = &mut shutdown => {
                info!("Ctrl-C received, stopping dashboard");
                break;
            }
        }
    }

    controller.dispose();
    Ok(())
}
