use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// serverpack - Install and upgrade modpack servers from declarative manifests
#[derive(Parser)]
#[command(name = "serverpack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log every file decision
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a modpack server, or update an existing one
    Install(InstallArgs),

    /// Check installed files against the recorded checksums
    Verify {
        /// Install directory
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },

    /// Show what an update would change without touching any files
    Plan {
        /// Install directory
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Local modpack manifest to compare against
        #[arg(long)]
        localpack: PathBuf,

        /// Also check unchanged files for local modification
        #[arg(long)]
        integrity: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct InstallArgs {
    /// Install directory
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    /// Install from a local modpack manifest
    #[arg(long, conflicts_with_all = ["pack", "version"], required_unless_present = "pack")]
    pub localpack: Option<PathBuf>,

    /// Pack ID on the modpacks API
    #[arg(long, requires = "version")]
    pub pack: Option<String>,

    /// Version ID of the pack
    #[arg(long, requires = "pack")]
    pub version: Option<String>,

    /// Number of concurrent downloads
    #[arg(long)]
    pub threads: Option<usize>,

    /// Check unchanged files for local modification
    #[arg(long)]
    pub integrity: bool,

    /// Default to overwriting locally modified files that the update changes
    #[arg(long)]
    pub integrity_update: bool,

    /// Use java from the PATH instead of downloading a runtime
    #[arg(long)]
    pub no_java: bool,

    /// Answer every question with its default
    #[arg(long)]
    pub auto: bool,

    /// Do not write start.sh / start.bat
    #[arg(long)]
    pub no_start_script: bool,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., download.threads)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Install(args) => commands::install::run(args, cli.verbose).await,
        Commands::Verify { path } => commands::verify::run(path),
        Commands::Plan {
            path,
            localpack,
            integrity,
        } => commands::plan::run(path, localpack, integrity).await,
        Commands::Config { action } => commands::config::run(&action),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "serverpack", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let code = match e.downcast_ref::<serverpack::Error>() {
            Some(serverpack::Error::DownloadsFailed { failed }) => (*failed).clamp(1, 255) as i32,
            _ => 1,
        };
        std::process::exit(code);
    }
}
