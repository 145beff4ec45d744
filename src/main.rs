use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use txhistory::cli::{
    handle_apply_command, handle_decode_command, handle_history_command, handle_show_command,
};
use txhistory::config::{paths::TxHistoryPaths, settings::Settings};
use txhistory::logging::{init_logging, LogLevel};
use txhistory::models::SchemaFile;
use txhistory::storage::save_json_atomic;

#[derive(Parser)]
#[command(
    name = "txhistory",
    version,
    about = "Transaction history capture for unit-of-work persistence",
    long_about = "txhistory records one audit row per saved unit of work: every added, \
                  deleted and modified entity, with foreign keys resolved to readable \
                  labels, written in the same transaction as the changes."
)]
struct Cli {
    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory, default settings and an empty schema file
    Init,

    /// Show current configuration and paths
    Config,

    /// Apply a change request file as one audited transaction
    Apply {
        /// Path to a JSON or YAML change request
        file: PathBuf,
        /// Changing user recorded in the audit row
        #[arg(short, long, env = "TXHISTORY_USER")]
        user: Option<String>,
    },

    /// List audit rows, oldest first
    #[command(alias = "log")]
    History {
        /// Only show the most recent N rows
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show one audit row with its decoded entries
    Show {
        /// Row ID (full UUID or short form such as txh-1a2b3c4d)
        id: String,
    },

    /// Decode a TransactionDetail value
    Decode {
        /// The JSON text stored in the TransactionDetail column
        detail: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = TxHistoryPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;
    init_logging(cli.log_level.unwrap_or(settings.log_level))?;

    match cli.command {
        Some(Commands::Init) => {
            println!("Initializing txhistory at: {}", paths.base_dir().display());
            paths.ensure_directories()?;
            settings.save(&paths)?;
            if !paths.schema_file().exists() {
                save_json_atomic(paths.schema_file(), &SchemaFile::default())?;
            }
            println!("Initialization complete!");
            println!();
            println!("Declare your entity sets in {}", paths.schema_file().display());
            println!("then run 'txhistory apply <change-request.json>'.");
        }
        Some(Commands::Config) => {
            println!("txhistory Configuration");
            println!("=======================");
            println!("Base directory:  {}", paths.base_dir().display());
            println!("Schema file:     {}", paths.schema_file().display());
            println!("Tables file:     {}", paths.tables_file().display());
            println!("Audit table:     {}", paths.history_log().display());
            println!();
            println!("Settings:");
            println!("  Log table:      {}", settings.log_table().qualified_name());
            println!("  Ignored fields: {}", settings.ignored_fields.join(", "));
            println!("  Dedup scope:    {:?}", settings.dedup_scope);
            println!("  Log level:      {}", settings.log_level);
        }
        Some(Commands::Apply { file, user }) => {
            handle_apply_command(&paths, &settings, &file, user)?;
        }
        Some(Commands::History { limit }) => {
            handle_history_command(&paths, limit)?;
        }
        Some(Commands::Show { id }) => {
            handle_show_command(&paths, &id)?;
        }
        Some(Commands::Decode { detail }) => {
            handle_decode_command(&detail)?;
        }
        None => {
            println!("txhistory - transaction audit capture");
            println!();
            println!("Run 'txhistory --help' for usage information.");
        }
    }

    Ok(())
}
