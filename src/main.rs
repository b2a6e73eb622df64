//! CLI entry point for plume

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plume::commands::generate::BuildOptions;
use plume::commands::new::NewOptions;
use plume::server::ServeOptions;
use plume::Site;

#[derive(Parser)]
#[command(name = "plume")]
#[command(version)]
#[command(about = "A small static blog toolkit for Markdown posts with TOML front matter", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new site
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        folder: PathBuf,
    },

    /// Create a new document
    New {
        /// Title of the new document
        title: String,

        /// File name, defaults to the slugified title
        #[arg(short, long)]
        slug: Option<String>,

        /// Author, defaults to the site author
        #[arg(short, long)]
        author: Option<String>,

        /// Mark the document as a draft
        #[arg(long)]
        draft: bool,
    },

    /// Check front matter and links of every document
    Check {
        /// Include drafts
        #[arg(long)]
        drafts: bool,
    },

    /// List documents, newest first
    List {
        /// Include drafts
        #[arg(long)]
        drafts: bool,
    },

    /// Build static files
    #[command(alias = "b")]
    Build {
        /// Include drafts
        #[arg(long)]
        drafts: bool,

        /// Ignore the cache and rebuild everything
        #[arg(short, long)]
        force: bool,

        /// Watch for file changes
        #[arg(short, long)]
        watch: bool,
    },

    /// Start a local server
    #[command(alias = "s")]
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "1111")]
        port: u16,

        /// IP address to bind to
        #[arg(short, long, default_value = "localhost")]
        ip: String,

        /// Open browser automatically
        #[arg(short, long)]
        open: bool,

        /// Enable static mode (no file watching)
        #[arg(long)]
        r#static: bool,

        /// Include drafts
        #[arg(long)]
        drafts: bool,
    },

    /// Clean the output folder and cache
    Clean,

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        "plume=debug,info"
    } else {
        "plume=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("Cannot determine the current directory")?,
    };

    match cli.command {
        Commands::Init { folder } => {
            let target_dir = if folder.is_absolute() {
                folder
            } else {
                base_dir.join(folder)
            };
            tracing::info!("Initializing site in {:?}", target_dir);
            plume::commands::init::init_site(&target_dir)?;
            println!("Initialized empty site in {:?}", target_dir);
        }

        Commands::New {
            title,
            slug,
            author,
            draft,
        } => {
            let site = Site::new(&base_dir)?;
            let options = NewOptions {
                slug,
                author,
                draft,
            };
            plume::commands::new::run(&site, &title, &options)?;
        }

        Commands::Check { drafts } => {
            let site = Site::new(&base_dir)?;
            plume::commands::check::run(&site, drafts)?;
        }

        Commands::List { drafts } => {
            let site = Site::new(&base_dir)?;
            plume::commands::list::run(&site, drafts)?;
        }

        Commands::Build {
            drafts,
            force,
            watch,
        } => {
            let site = Site::new(&base_dir)?;
            let options = BuildOptions { drafts, force };
            tracing::info!("Building static files...");

            plume::commands::generate::run(&site, &options)?;
            println!("Built successfully!");

            if watch {
                plume::commands::generate::watch(&site, &options).await?;
            }
        }

        Commands::Serve {
            port,
            ip,
            open,
            r#static,
            drafts,
        } => {
            let site = Site::new(&base_dir)?;

            tracing::info!("Building static files...");
            plume::commands::generate::run(&site, &BuildOptions { drafts, force: false })?;

            let options = ServeOptions {
                ip,
                port,
                open,
                watch: !r#static,
                drafts,
            };
            plume::server::start(&site, &options).await?;
        }

        Commands::Clean => {
            let site = Site::new(&base_dir)?;
            tracing::info!("Cleaning output folder...");
            site.clean()?;
            println!("Cleaned successfully!");
        }

        Commands::Version => {
            println!("plume version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
