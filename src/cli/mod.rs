use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};
use crate::dates;
use crate::storage;

pub mod commands;

use self::commands::{
    AddArgs, EditArgs, ListArgs, NumberArgs, PathArgs, RemindArgs, ServiceArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "clientbook",
    version,
    about = "Salon client book with WhatsApp reminder tracking"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over CLIENTBOOK_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over CLIENTBOOK_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List customers grouped by visit date (default)
    List(ListArgs),
    /// Register a new customer
    Add(AddArgs),
    /// Show one customer with their reminder history
    Show(NumberArgs),
    /// Edit customer fields
    Edit(EditArgs),
    /// Record a reminder sent to a customer today
    Remind(RemindArgs),
    /// Count customers per reminder category
    Counts,
    /// List customers whose reminder is pending or overdue
    Due,
    /// Delete a customer permanently
    Delete(NumberArgs),
    /// Manage the service catalog
    Service(ServiceArgs),
    /// Export all customers as a JSON blob
    Export(PathArgs),
    /// Import customers from a JSON blob
    Import(PathArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    // Resolve the local offset before anything else can spawn threads.
    let now = dates::now_local();

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;
    let storage = storage::init(&paths, &config.storage)?;

    let command = cli
        .command
        .unwrap_or_else(|| Commands::List(ListArgs::default()));
    let output = match command {
        Commands::List(args) => commands::list_customers(&config, &storage, args, now),
        Commands::Add(args) => commands::add_customer(&config, &storage, args, now),
        Commands::Show(args) => commands::show_customer(&storage, args, now),
        Commands::Edit(args) => commands::edit_customer(&storage, args, now),
        Commands::Remind(args) => commands::remind_customer(&storage, args, now),
        Commands::Counts => commands::category_counts(&storage, now),
        Commands::Due => commands::due_customers(&storage, now),
        Commands::Delete(args) => commands::delete_customer(&storage, args),
        Commands::Service(args) => commands::handle_service_command(&storage, args, now),
        Commands::Export(args) => commands::export_customers(&paths, &storage, args),
        Commands::Import(args) => commands::import_customers(&paths, &storage, args),
    }?;
    print!("{output}");
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
