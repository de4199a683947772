use anyhow::Result;
use clap::{Parser, Subcommand};
use ipnet::IpNet;
use rust_decimal::Decimal;
use sigbridge_core::{
    BridgeConfig, Side, Signal, DEFAULT_REPLAY_CACHE_CAPACITY, DEFAULT_REPLAY_WINDOW,
};
use sigbridge_queue::{write_signal, SignalFormat};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "sigbridge")]
#[command(about = "Signal bridge between a file-based signal queue and an MT5 Expert Advisor")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Directory holding pending signal files
    #[arg(long, env = "SIGNAL_QUEUE_DIR", default_value = "signals", global = true)]
    queue_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bridge HTTP server
    Serve {
        /// Bind address
        #[arg(short, long, default_value = "0.0.0.0:8443")]
        bind: String,

        /// Shared token checked in both auth modes
        #[arg(long, env = "BRIDGE_TOKEN", default_value = "")]
        token: String,

        /// Secret for HMAC request signatures
        #[arg(long, env = "BRIDGE_HMAC_SECRET", default_value = "")]
        hmac_secret: String,

        /// Append-only feedback log (defaults to <queue_dir>/feedback.jsonl)
        #[arg(long, env = "FEEDBACK_LOG")]
        feedback_log: Option<PathBuf>,

        /// CIDR ranges allowed to authenticate with the token alone
        #[arg(long, value_delimiter = ',')]
        token_only_nets: Vec<IpNet>,

        /// Accepted clock drift / replay window in seconds
        #[arg(long, default_value = "300")]
        replay_window_secs: u64,

        /// Maximum remembered auth timestamps before eviction
        #[arg(long, default_value_t = DEFAULT_REPLAY_CACHE_CAPACITY)]
        replay_cache_capacity: usize,
    },

    /// Write a signal file into the queue directory
    Emit {
        /// Instrument symbol (e.g. "EURUSD")
        #[arg(short, long)]
        symbol: String,

        /// BUY or SELL
        #[arg(long)]
        side: Side,

        /// Lot size
        #[arg(short, long)]
        volume: Decimal,

        /// Limit price; omit for a market order
        #[arg(long)]
        price: Option<Decimal>,

        /// Stop loss distance in points
        #[arg(long)]
        sl_pts: Option<u32>,

        /// Take profit distance in points
        #[arg(long)]
        tp_pts: Option<u32>,

        /// On-disk encoding
        #[arg(long, default_value = "json")]
        format: SignalFormat,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Serve {
            bind,
            token,
            hmac_secret,
            feedback_log,
            token_only_nets,
            replay_window_secs,
            replay_cache_capacity,
        } => {
            let config = BridgeConfig {
                token,
                hmac_secret,
                feedback_log: feedback_log
                    .unwrap_or_else(|| cli.queue_dir.join("feedback.jsonl")),
                queue_dir: cli.queue_dir,
                token_only_networks: if token_only_nets.is_empty() {
                    BridgeConfig::default_token_only_networks()
                } else {
                    token_only_nets
                },
                replay_window: if replay_window_secs == 0 {
                    DEFAULT_REPLAY_WINDOW
                } else {
                    Duration::from_secs(replay_window_secs)
                },
                replay_cache_capacity,
            };

            config.warn_on_missing_credentials();
            tracing::info!(
                queue_dir = %config.queue_dir.display(),
                feedback_log = %config.feedback_log.display(),
                trusted_networks = ?config.token_only_networks,
                "starting signal bridge"
            );
            sigbridge_api::start_server(config, &bind).await?;
        }
        Commands::Emit {
            symbol,
            side,
            volume,
            price,
            sl_pts,
            tp_pts,
            format,
        } => {
            let mut signal = Signal::market(&symbol, side, volume);
            signal.price = price;
            signal.sl_pts = sl_pts;
            signal.tp_pts = tp_pts;
            signal.validate().map_err(|e| anyhow::anyhow!("{}", e))?;

            let path = write_signal(&signal, &cli.queue_dir, format)?;
            println!("Wrote {} ({})", path.display(), signal.id);
        }
    }

    Ok(())
}
