use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "rtv")]
#[command(about = "Repo-token vault strategy tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Parse the strategy config and report unused keys
    ConfigCheck {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,

        /// Fail instead of warning when a key is unused
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Present value of a face amount at a discount rate
    Pv {
        /// Face amount in base units (e.g. 1000000 for 1 USDC)
        #[arg(long)]
        face: String,

        /// Base asset decimals
        #[arg(long, default_value_t = 6)]
        decimals: u8,

        /// Maturity, unix seconds
        #[arg(long)]
        maturity: u64,

        /// Annual simple rate as a decimal (e.g. 0.05)
        #[arg(long)]
        rate: String,

        /// Valuation time, unix seconds (default: now)
        #[arg(long)]
        now: Option<u64>,
    },

    /// Evaluate the strategy against a JSON world snapshot
    #[cfg(feature = "testkit")]
    Simulate {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// World snapshot JSON
        #[arg(long)]
        world: String,

        /// Instrument to simulate buying
        #[arg(long)]
        instrument: Option<String>,

        /// Native instrument units
        #[arg(long, default_value = "0")]
        amount: String,

        /// Execute the purchase from this seller after simulating
        #[arg(long)]
        seller: Option<String>,
    },
}

fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::ConfigHash { paths } => commands::config_hash(&paths),
        Commands::ConfigCheck { paths, strict } => commands::config_check(&paths, strict),
        Commands::Pv {
            face,
            decimals,
            maturity,
            rate,
            now,
        } => commands::pv(&face, decimals, maturity, &rate, now),
        #[cfg(feature = "testkit")]
        Commands::Simulate {
            config_paths,
            world,
            instrument,
            amount,
            seller,
        } => commands::simulate::run(
            &config_paths,
            &world,
            instrument.as_deref(),
            &amount,
            seller.as_deref(),
        ),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
