use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cfgsync::ConfigStore;
use cfgsync::cli::Output;
use cfgsync::cli::commands::get::ValueKind;

#[derive(Parser)]
#[command(name = "cfgsync")]
#[command(
    version,
    about = "Section-aware configuration with remote live reload"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Section whose keys override global keys
    #[arg(long, short, global = true)]
    section: Option<String>,

    /// Settings file (defaults to ./cfgsync.toml when present)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a single value
    Get {
        #[arg(help = "Dotted path, e.g. databases.primary.host")]
        path: String,
        #[arg(long = "as", value_enum, default_value_t = ValueKind::String, help = "Accessor to use")]
        kind: ValueKind,
    },

    /// Print the current document
    Show {
        #[arg(long, help = "Pretty-print JSON")]
        pretty: bool,
    },

    /// Print every change until Ctrl-C
    Watch,

    /// Validate a local document and write it to the remote key
    Push {
        #[arg(help = "JSON document to push")]
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            Output::new().error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = cfgsync::cli::load_settings(cli.settings.as_deref(), cli.section)?;

    let rt = Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Commands::Get { path, kind } => {
                let store = ConfigStore::load(settings).await?;
                let result = cfgsync::cli::commands::get::run(&store, &path, kind);
                store.shutdown().await;
                result?;
            }
            Commands::Show { pretty } => {
                let store = ConfigStore::load(settings).await?;
                let result = cfgsync::cli::commands::show::run(&store, pretty);
                store.shutdown().await;
                result?;
            }
            Commands::Watch => {
                let store = ConfigStore::load(settings).await?;
                cfgsync::cli::commands::watch::run(&store).await?;
            }
            Commands::Push { file } => {
                cfgsync::cli::commands::push::run(&settings, &file).await?;
            }
        }
        Ok::<(), anyhow::Error>(())
    })
}
