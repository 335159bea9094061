use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ons_bridge::storage::{
    DescriptorProvisioner, DirectoryTreeProvider, FileResolver, GameRoot, HostCapabilities,
    ResourceLocator,
};
use ons_bridge::{compute_viewport, init_logging, BridgeConfig};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "ons_probe",
    about = "Headless diagnostics for the ONScripter host bridge"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve an engine path against the configured game root
    Resolve {
        #[arg(long)]
        config: PathBuf,
        path: String,
    },
    /// Last-modified time (ms since epoch) of an engine path, -1 when missing
    Stat {
        #[arg(long)]
        config: PathBuf,
        /// Directory standing in for the document tree of a content:// root
        #[arg(long)]
        tree_dir: Option<PathBuf>,
        path: String,
    },
    /// Aspect-preserving viewport of content inside a container
    Viewport {
        container_width: i32,
        container_height: i32,
        content_width: i32,
        content_height: i32,
    },
    /// Engine init flags derived from a configuration
    Flags {
        #[arg(long)]
        config: PathBuf,
        /// Include the open-only probe flag
        #[arg(long)]
        open_only: bool,
    },
}

#[derive(Serialize)]
struct ResolveReport {
    regime: String,
    segments: Vec<String>,
    locator: String,
}

#[derive(Serialize)]
struct StatReport {
    locator: Option<String>,
    last_modified: i64,
}

#[derive(Serialize)]
struct ViewportReport {
    width: i32,
    height: i32,
}

fn main() -> ExitCode {
    init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Resolve { config, path } => run_resolve(&config, &path),
        Commands::Stat {
            config,
            tree_dir,
            path,
        } => run_stat(&config, tree_dir, &path),
        Commands::Viewport {
            container_width,
            container_height,
            content_width,
            content_height,
        } => {
            let (width, height) =
                compute_viewport(container_width, container_height, content_width, content_height);
            emit(&ViewportReport { width, height })?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Flags { config, open_only } => run_flags(&config, open_only),
    }
}

fn load(config_path: &Path) -> Result<(BridgeConfig, HostCapabilities, GameRoot)> {
    let config = BridgeConfig::load_from_file(config_path)?;
    let caps = HostCapabilities::desktop(std::env::temp_dir().join("ons_probe"));
    let game = GameRoot::parse(&config.game_root, &caps)
        .with_context(|| format!("invalid game root {:?}", config.game_root))?;
    Ok((config, caps, game))
}

fn run_resolve(config_path: &Path, path: &str) -> Result<ExitCode> {
    let (_, _, game) = load(config_path)?;
    let resolver = FileResolver::new(game);
    let locator = resolver
        .try_resolve(path)
        .with_context(|| format!("resolving {:?}", path))?;
    emit(&resolve_report(&locator))?;
    Ok(ExitCode::SUCCESS)
}

fn resolve_report(locator: &ResourceLocator) -> ResolveReport {
    ResolveReport {
        regime: format!("{:?}", locator.regime()),
        segments: locator.segments().to_vec(),
        locator: locator.to_string(),
    }
}

fn run_stat(config_path: &Path, tree_dir: Option<PathBuf>, path: &str) -> Result<ExitCode> {
    let (_, caps, game) = load(config_path)?;
    let tree_dir = match tree_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("reading current directory")?,
    };
    let resolver = FileResolver::new(game);
    let provisioner =
        DescriptorProvisioner::new(Arc::new(DirectoryTreeProvider::new(tree_dir)), caps);

    let report = match resolver.resolve(path) {
        Some(locator) => StatReport {
            last_modified: provisioner.stat(&locator),
            locator: Some(locator.to_string()),
        },
        None => StatReport {
            locator: None,
            last_modified: -1,
        },
    };
    emit(&report)?;
    Ok(ExitCode::SUCCESS)
}

fn run_flags(config_path: &Path, open_only: bool) -> Result<ExitCode> {
    let (config, _, game) = load(config_path)?;
    emit(&config.engine_flags(game.grant.is_tree(), open_only))?;
    Ok(ExitCode::SUCCESS)
}

fn emit<T: Serialize>(report: &T) -> Result<()> {
    println!("{}", serde_json::to_string(report)?);
    Ok(())
}
