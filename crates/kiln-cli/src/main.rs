//! kiln CLI tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "kiln build service CLI", long_about = None)]
struct Cli {
    /// API server URL
    #[arg(long, env = "KILN_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered artifact engines
    Engines,
    /// Render an artifact from a catalog file without a server
    Generate {
        /// Catalog file declaring templates and components
        #[arg(long, default_value = "catalog.kdl")]
        catalog: PathBuf,
        /// Engine to render with
        #[arg(long, default_value = "docker")]
        engine: String,
        /// Target component name (repeatable)
        #[arg(long = "component", required = true)]
        components: Vec<String>,
        /// Build spec entry as key=value (repeatable)
        #[arg(long = "spec", value_parser = commands::parse_spec_entry)]
        spec: Vec<(String, String)>,
        /// Write the artifact to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a catalog file
    Validate {
        /// Path to the catalog file
        #[arg(default_value = "catalog.kdl")]
        path: PathBuf,
    },
    /// Manage builds on the server
    Builds {
        #[command(subcommand)]
        command: BuildCommands,
    },
}

#[derive(Subcommand)]
enum BuildCommands {
    /// Request builds of a component branch, one per build OS
    Request {
        component: String,
        branch: String,
    },
    /// List builds of a component branch
    List {
        component: String,
        branch: String,
    },
    /// Show the log lines of a build
    Logs {
        /// Build ID
        id: String,
    },
    /// Delete a build and its logs
    Delete {
        /// Build ID
        id: String,
    },
    /// Return a stuck in-progress build to pending
    Release {
        /// Build ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Engines => commands::engines(),
        Commands::Generate {
            catalog,
            engine,
            components,
            spec,
            output,
        } => {
            commands::generate(&catalog, &engine, &components, spec, output.as_deref())?;
        }
        Commands::Validate { path } => {
            commands::validate(&path)?;
        }
        Commands::Builds { command } => match command {
            BuildCommands::Request { component, branch } => {
                commands::builds::request(&cli.api_url, &component, &branch).await?;
            }
            BuildCommands::List { component, branch } => {
                commands::builds::list(&cli.api_url, &component, &branch).await?;
            }
            BuildCommands::Logs { id } => {
                commands::builds::logs(&cli.api_url, &id).await?;
            }
            BuildCommands::Delete { id } => {
                commands::builds::delete(&cli.api_url, &id).await?;
            }
            BuildCommands::Release { id } => {
                commands::builds::release(&cli.api_url, &id).await?;
            }
        },
    }

    Ok(())
}
