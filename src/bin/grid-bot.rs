// Lighter Grid Bot - command line front-end
// Single entry point for setting up, previewing and running a grid

use clap::{Parser, Subcommand};
use tracing::{error, info, Level};

use lighter_grid_bot::{FileConfigStore, TradingError, TradingResult};

// Load command modules from cli directory
#[path = "../cli/config_commands.rs"]
mod config_commands;
#[path = "../cli/trade_commands.rs"]
mod trade_commands;

#[derive(Parser)]
#[command(name = "grid-bot")]
#[command(version)]
#[command(about = "Grid order keeper for the Lighter venue", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Run pre-flight validation against the configuration
    Check,

    /// Set the grid parameters in the configuration file
    Setup {
        /// Trading pair (e.g., BTC/USDT)
        #[arg(long)]
        symbol: String,

        /// Lowest grid price
        #[arg(long)]
        lower: String,

        /// Highest grid price
        #[arg(long)]
        upper: String,

        /// Number of grid intervals
        #[arg(long)]
        grids: u32,

        /// Order value per grid level
        #[arg(long)]
        notional: String,

        #[arg(long, default_value = "1")]
        leverage: u32,
    },

    /// Show the ladder that would be placed
    Preview {
        /// Reference price to use instead of the venue ticker
        #[arg(long)]
        price: Option<String>,
    },

    /// Place the grid and keep it alive until Ctrl-C
    Run,

    /// List open orders for the configured symbol
    Orders,

    /// Cancel every open order for the configured symbol
    CancelAll,

    /// Cancel a single order
    Cancel {
        /// Venue order id
        order_id: String,
    },

    /// Show the account balance
    Balance,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging first (before config load so we can see config errors)
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    info!("🚀 Lighter Grid Bot v{}", env!("CARGO_PKG_VERSION"));
    info!("📁 Config: {}", cli.config);

    let store = FileConfigStore::new(&cli.config);

    let result = match cli.command {
        // Init doesn't require config (it creates it)
        Commands::Init { force } => config_commands::init_config(&store, force),
        Commands::Check => config_commands::check_config(&store),
        Commands::Setup {
            symbol,
            lower,
            upper,
            grids,
            notional,
            leverage,
        } => config_commands::setup_grid(&store, &symbol, &lower, &upper, grids, &notional, leverage),
        Commands::Preview { price } => config_commands::preview_grid(&store, price.as_deref()).await,
        Commands::Run => trade_commands::run_grid(&store).await,
        Commands::Orders => trade_commands::list_orders(&store).await,
        Commands::CancelAll => trade_commands::cancel_all(&store).await,
        Commands::Cancel { order_id } => trade_commands::cancel_order(&store, &order_id).await,
        Commands::Balance => trade_commands::show_balance(&store).await,
    };

    if let Err(e) = result {
        exit_with(e);
    }
}

/// Log an error with helpful context and exit
fn exit_with(e: TradingError) -> ! {
    if e.is_config_error() {
        error!("❌ Configuration Error");
    } else {
        error!("❌ {} error", e.category());
    }
    for line in e.user_message().lines() {
        error!("{}", line);
    }
    std::process::exit(1);
}

/// Fail with the `grid-bot init` hint when the config file is missing or broken
fn require_config(store: &FileConfigStore) -> TradingResult<()> {
    store.load_or_error()?;
    Ok(())
}
