use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod device;

#[derive(Parser)]
#[command(name = "notiplan-cli", version, about = "notiplan CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Per-group in-app consent
    Consent {
        #[command(subcommand)]
        action: commands::consent::ConsentAction,
    },
    /// Simulated OS notification permission
    System {
        #[command(subcommand)]
        action: commands::system::SystemAction,
    },
    /// Schedule notifications for a group
    Schedule(commands::schedule::ScheduleArgs),
    /// Pending notification queue
    Pending {
        #[command(subcommand)]
        action: commands::pending::PendingAction,
    },
    /// Present due notifications
    Deliver(commands::deliver::DeliverArgs),
    /// Refuse a group and purge its pending notifications
    Disable {
        /// Group identifier
        group: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("NOTIPLAN_LOG").unwrap_or_else(|_| {
        let config = notiplan_core::Config::load_or_default();
        EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|_| EnvFilter::new("warn"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Config { action } => commands::config::run(action),
        Commands::Consent { action } => commands::consent::run(action).await,
        Commands::System { action } => commands::system::run(action).await,
        Commands::Schedule(args) => commands::schedule::run(args).await,
        Commands::Pending { action } => commands::pending::run(action).await,
        Commands::Deliver(args) => commands::deliver::run(args),
        Commands::Disable { group } => commands::disable::run(group).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
