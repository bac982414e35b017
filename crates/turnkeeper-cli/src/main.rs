mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, moderator::ModeratorSubcommand, order::OrderSubcommand,
    player::PlayerSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "turnkeeper",
    about = "Turn pipeline for play-by-email space games: gate, resolve, advance",
    version,
    propagate_version = true
)]
struct Cli {
    /// Game root (default: auto-detect from .turnkeeper/)
    #[arg(long, global = true, env = "TURNKEEPER_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new game from a universe file
    Init {
        /// YAML file describing systems, bodies, bases, players and ships
        #[arg(long)]
        universe: PathBuf,

        /// Game identifier (mixed into every random roll)
        #[arg(long)]
        game_id: String,
    },

    /// Show the current turn and pipeline status
    Status,

    /// Stop the turn from resolving until released
    Hold {
        #[arg(long, default_value = "manual hold")]
        reason: String,
    },

    /// Reopen a held turn, or recover a turn left PROCESSING by a crash
    Release {
        #[arg(long, default_value = "manual release")]
        reason: String,
    },

    /// Resolve the current turn
    Resolve {
        /// Resolve regardless of status; unanswered moderator requests get the sentinel
        #[arg(long)]
        force: bool,
    },

    /// Snapshot the completed turn and open the next one
    Advance,

    /// Submit a ship's orders for the current turn (replaces earlier submissions)
    Submit {
        #[arg(long)]
        ship: u64,

        /// YAML or JSON list of {command, params}
        #[arg(long)]
        file: PathBuf,
    },

    /// Inspect and edit pending orders
    Order {
        #[command(subcommand)]
        subcommand: OrderSubcommand,
    },

    /// Moderator requests
    Moderator {
        #[command(subcommand)]
        subcommand: ModeratorSubcommand,
    },

    /// Player accounts
    Player {
        #[command(subcommand)]
        subcommand: PlayerSubcommand,
    },

    /// Show a turn report
    Report {
        /// Turn as year.week (default: current turn)
        #[arg(long)]
        turn: Option<String>,
    },

    /// Game configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { universe, game_id } => {
            cmd::init::run(&root, &universe, &game_id, cli.json)
        }
        Commands::Status => cmd::status::run(&root, cli.json),
        Commands::Hold { reason } => cmd::pipeline::hold(&root, &reason, cli.json),
        Commands::Release { reason } => cmd::pipeline::release(&root, &reason, cli.json),
        Commands::Resolve { force } => cmd::resolve::run(&root, force, cli.json),
        Commands::Advance => cmd::advance::run(&root, cli.json),
        Commands::Submit { ship, file } => cmd::submit::run(&root, ship, &file, cli.json),
        Commands::Order { subcommand } => cmd::order::run(&root, subcommand, cli.json),
        Commands::Moderator { subcommand } => cmd::moderator::run(&root, subcommand, cli.json),
        Commands::Player { subcommand } => cmd::player::run(&root, subcommand, cli.json),
        Commands::Report { turn } => cmd::report::run(&root, turn.as_deref(), cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
