//! composectl - compose file driven container management
//!
//! This is the main CLI entry point for composectl.

use clap::{Parser, Subcommand};
use composectl::compose::{ComposeControl, ComposeParser};
use composectl::engine::{DockerEngine, Engine, EngineConfig, MemoryEngine};
use composectl::error::{ComposeError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// composectl - bring compose services up and down on a container engine
#[derive(Parser)]
#[command(name = "composectl")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "Bring compose services up and down on a container engine", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Engine address (defaults to DOCKER_HOST or the local Docker socket)
    #[arg(short = 'H', long, global = true)]
    host: Option<String>,

    /// Engine API version (defaults to DOCKER_API_VERSION or v1.41)
    #[arg(long, global = true)]
    api_version: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and start containers
    Up {
        /// Compose file
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Project name (defaults to the compose file's directory name)
        #[arg(short, long)]
        project: Option<String>,
        /// Print the engine requests instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// Stop and remove containers
    Down {
        /// Compose file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Print the normalized services
    Config {
        /// Compose file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(if e.is_client_error() { 2 } else { 1 });
    }
}

async fn run(cli: Cli) -> Result<()> {
    let working_dir = std::env::current_dir()?;

    let mut engine_config = EngineConfig::from_env();
    if let Some(host) = &cli.host {
        engine_config = engine_config.host(host);
    }
    if let Some(version) = &cli.api_version {
        engine_config = engine_config.api_version(version);
    }

    match cli.command {
        Commands::Up {
            file,
            project,
            dry_run,
        } => {
            let compose_file = resolve_compose_file(file, &working_dir);
            let project_name =
                project.unwrap_or_else(|| default_project_name(&compose_file, &working_dir));

            if dry_run {
                // External networks only exist on the real engine
                let engine = Arc::new(MemoryEngine::new().lenient_networks());
                ComposeControl::new(engine.clone())
                    .up(&compose_file, &project_name)
                    .await?;

                for container in engine.containers()? {
                    let entry = serde_json::json!({
                        "name": &container.request.name,
                        "create": &container.request,
                    });
                    println!("{}", serde_json::to_string_pretty(&entry)?);
                }
                return Ok(());
            }

            let engine: Arc<dyn Engine> = Arc::new(DockerEngine::new(&engine_config)?);
            ComposeControl::new(engine)
                .up(&compose_file, &project_name)
                .await?;
            println!("Started project {}", project_name);
        }

        Commands::Down { file } => {
            let compose_file = resolve_compose_file(file, &working_dir);

            let engine: Arc<dyn Engine> = Arc::new(DockerEngine::new(&engine_config)?);
            ComposeControl::new(engine).down(&compose_file).await?;
            println!("Containers stopped and removed");
        }

        Commands::Config { file } => {
            let compose_file = resolve_compose_file(file, &working_dir);

            let services = ComposeParser::new().parse_file(&compose_file)?;
            if services.is_empty() {
                return Err(ComposeError::EmptyServiceSet(
                    compose_file.display().to_string(),
                ));
            }

            print!("{}", serde_yaml::to_string(&services)?);
        }
    }

    Ok(())
}

/// Use the given file, or look for a default compose file in `dir`
fn resolve_compose_file(file: Option<PathBuf>, dir: &Path) -> PathBuf {
    file.unwrap_or_else(|| {
        ComposeParser::find_compose_file(dir).unwrap_or_else(|| dir.join("compose.yaml"))
    })
}

/// Name of the directory holding the compose file
fn default_project_name(compose_file: &Path, working_dir: &Path) -> String {
    working_dir
        .join(compose_file)
        .parent()
        .and_then(Path::file_name)
        .and_then(|s| s.to_str())
        .unwrap_or("default")
        .to_string()
}
