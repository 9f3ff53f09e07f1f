//! Engram board command-line interface.
//!
//! # Responsibility
//! - Resolve configuration from flags, falling back to `ENGRAM_*` variables.
//! - Select the local or SQLite ledger and run one board operation.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use engram_core::db::open_db;
use engram_core::{
    core_version, init_logging, BackendKind, BoardConfig, BoardService, DeviceIdSource, Engram,
    EngramId, EngramPatch, EngramRepository, FileStore, LocalEngramRepository, NewEngram,
    SqliteEngramRepository, StoredDeviceId, VoteDirection,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "engram")]
#[command(about = "Anonymous bulletin board with up/down voting", long_about = None)]
#[command(version)]
struct Cli {
    /// Storage backend hosting the vote ledger
    #[arg(
        short,
        long,
        env = "ENGRAM_BACKEND",
        value_enum,
        ignore_case = true,
        default_value_t = BackendArg::Local
    )]
    backend: BackendArg,

    /// SQLite database file used by the sqlite backend
    #[arg(long, env = "ENGRAM_DB_PATH")]
    db: Option<PathBuf>,

    /// Key-value store directory (engrams for local, device id for both)
    #[arg(long, env = "ENGRAM_STORE_DIR")]
    store: Option<PathBuf>,

    /// Absolute directory for rolling log files; logging is off when unset
    #[arg(long, env = "ENGRAM_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[arg(long, env = "ENGRAM_LOG_LEVEL")]
    log_level: Option<String>,

    /// Print engrams as JSON.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List engrams, newest first
    List {
        /// Only show one cluster ("all" shows every cluster)
        #[arg(short, long)]
        cluster: Option<String>,
    },
    /// Show one engram
    Show { id: EngramId },
    /// Post a new engram
    Add {
        title: String,
        content: String,
        #[arg(short, long)]
        cluster: Option<String>,
    },
    /// Edit title, content or cluster of an engram
    Edit {
        id: EngramId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        cluster: Option<String>,
    },
    /// Delete an engram and its votes
    Delete { id: EngramId },
    /// Vote an engram up or down; repeating a vote retracts it
    Vote { id: EngramId, direction: DirectionArg },
    /// Print this environment's device identifier
    Device,
    /// Print the core library version
    Version,
}

impl Cli {
    /// Fills unset settings from [`BoardConfig::default`].
    fn board_config(&self) -> BoardConfig {
        let defaults = BoardConfig::default();
        BoardConfig {
            backend: self.backend.into(),
            db_path: self.db.clone().unwrap_or(defaults.db_path),
            store_dir: self.store.clone().unwrap_or(defaults.store_dir),
            log_level: self.log_level.clone().unwrap_or(defaults.log_level),
            log_dir: self.log_dir.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Local,
    #[value(alias = "remote")]
    Sqlite,
}

impl From<BackendArg> for BackendKind {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Local => BackendKind::Local,
            BackendArg::Sqlite => BackendKind::Sqlite,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DirectionArg {
    Up,
    Down,
}

impl From<DirectionArg> for VoteDirection {
    fn from(value: DirectionArg) -> Self {
        match value {
            DirectionArg::Up => VoteDirection::Up,
            DirectionArg::Down => VoteDirection::Down,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.board_config();

    if let Some(log_dir) = config.log_dir.as_deref() {
        init_logging(&config.log_level, log_dir).context("logging init failed")?;
    }

    if let Commands::Version = cli.command {
        println!("engram_core {}", core_version());
        return Ok(());
    }

    let store = FileStore::open(&config.store_dir)
        .with_context(|| format!("cannot open store `{}`", config.store_dir.display()))?;
    let device = StoredDeviceId::new(&store);

    if let Commands::Device = cli.command {
        println!("{}", device.device_id());
        return Ok(());
    }

    match config.backend {
        BackendKind::Local => {
            let repo = LocalEngramRepository::new(&store, &device);
            run(BoardService::new(repo), &cli.command, cli.json)
        }
        BackendKind::Sqlite => {
            let mut conn = open_db(&config.db_path)
                .with_context(|| format!("cannot open database `{}`", config.db_path.display()))?;
            let repo = SqliteEngramRepository::try_new(&mut conn, &device)?;
            run(BoardService::new(repo), &cli.command, cli.json)
        }
    }
}

fn run<R: EngramRepository>(
    mut service: BoardService<R>,
    command: &Commands,
    json: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::List { cluster } => {
            let engrams = service.get_engrams(cluster.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&engrams)?);
            } else if engrams.is_empty() {
                println!("No engrams.");
            } else {
                engrams.iter().for_each(print_engram);
            }
        }
        Commands::Show { id } => match service.get_engram(*id)? {
            Some(engram) => output(&engram, json)?,
            None => anyhow::bail!("engram not found: {id}"),
        },
        Commands::Add {
            title,
            content,
            cluster,
        } => {
            let new_engram = NewEngram {
                title: title.clone(),
                content: content.clone(),
                cluster: cluster.clone(),
            };
            output(&service.add_engram(&new_engram)?, json)?;
        }
        Commands::Edit {
            id,
            title,
            content,
            cluster,
        } => {
            let patch = EngramPatch {
                title: title.clone(),
                content: content.clone(),
                cluster: cluster.clone(),
            };
            output(&service.update_engram(*id, &patch)?, json)?;
        }
        Commands::Delete { id } => {
            service.delete_engram(*id)?;
            println!("Deleted engram {id}.");
        }
        Commands::Vote { id, direction } => {
            output(&service.vote_engram(*id, (*direction).into())?, json)?;
        }
        Commands::Device | Commands::Version => {}
    }
    Ok(())
}

fn output(engram: &Engram, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(engram)?);
    } else {
        print_engram(engram);
    }
    Ok(())
}

fn print_engram(engram: &Engram) {
    let vote = engram.user_vote.map_or("-", VoteDirection::as_str);
    println!(
        "#{} [{}] {}  +{} -{}  your vote: {}",
        engram.id, engram.cluster, engram.title, engram.upvotes, engram.downvotes, vote
    );
    println!("    {}", engram.content);
}
