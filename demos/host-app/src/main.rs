//! Demo Host
//!
//! A small host application built on graft. It links two entry points:
//!
//! - `host.Greeter`, a host-level entry point any plugin may list;
//! - `demo.Main`, private to the plugin with id `demo`.
//!
//! A matching package can be as small as a zip holding this `metadata.yml`:
//!
//! ```yaml
//! id: demo
//! name: Demo Plugin
//! version: 1.0.0
//! entrypoints: [demo.Main, host.Greeter]
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package host-app                     # run the load pass
//! cargo run --package host-app -- --mode server list
//! cargo run --package host-app -- inspect plugins/demo.zip
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use graft::core::DESCRIPTOR_NAME;
use graft::prelude::*;
use graft::runtime::RuntimeBuilder;

// ============================================================================
// Entry Points
// ============================================================================

/// Greets every plugin that lists it.
#[entry_point("host.Greeter")]
pub struct Greeter {
    metadata: Arc<Metadata>,
}

impl Plugin for Greeter {
    fn on_initialize(&mut self) -> Result<(), BoxError> {
        info!(
            "Hello, {} {}!",
            self.metadata.display_name(),
            self.metadata.display_version()
        );
        Ok(())
    }
}

impl EntryPoint for Greeter {
    fn construct(metadata: Arc<Metadata>) -> Result<Self, BoxError> {
        Ok(Self { metadata })
    }
}

/// Main entry point of the `demo` plugin.
#[entry_point("demo.Main", owner = "demo")]
pub struct DemoMain {
    config_dir: PathBuf,
}

impl Plugin for DemoMain {
    fn on_initialize(&mut self) -> Result<(), BoxError> {
        info!(config_dir = %self.config_dir.display(), "Demo plugin ready");
        Ok(())
    }
}

impl EntryPoint for DemoMain {
    fn construct(metadata: Arc<Metadata>) -> Result<Self, BoxError> {
        Ok(Self {
            config_dir: metadata.ensure_config_folder()?,
        })
    }
}

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser)]
#[command(name = "host-app", about = "Load graft plugins into a demo host")]
struct Cli {
    /// Configuration file (defaults to graft.yaml in the current directory).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `loader.mode`.
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Overrides `loader.plugins_dir`.
    #[arg(long)]
    plugins_dir: Option<PathBuf>,

    /// Overrides `loader.core_package`.
    #[arg(long)]
    core_package: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Client,
    Server,
}

impl From<Mode> for LoadingMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Client => LoadingMode::Client,
            Mode::Server => LoadingMode::Server,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Discover, order and activate plugins.
    Run,
    /// Show the load order without activating anything.
    List,
    /// Print the parsed metadata of a package.
    Inspect {
        package: PathBuf,
        /// Descriptor entry to read.
        #[arg(long, default_value = DESCRIPTOR_NAME)]
        descriptor: String,
    },
}

impl Cli {
    fn runtime(&self) -> Result<GraftRuntime> {
        let mut builder = RuntimeBuilder::new();
        if let Some(config) = &self.config {
            builder = builder.config_file(config);
        }
        if let Some(mode) = self.mode {
            builder = builder.mode(mode.into());
        }
        if let Some(dir) = &self.plugins_dir {
            builder = builder.plugins_dir(dir);
        }
        if let Some(package) = &self.core_package {
            builder = builder.core_package(package);
        }
        builder.build().context("failed to configure the host")
    }
}

fn run(cli: &Cli) -> Result<()> {
    let (manager, summary) = cli.runtime()?.run().context("plugin loading failed")?;

    println!("{summary}");
    for (plugin, entry_point) in manager.entry_points() {
        println!("  {plugin} -> {entry_point}");
    }
    Ok(())
}

fn list(cli: &Cli) -> Result<()> {
    let runtime = cli.runtime()?;
    let plan = runtime.plan().context("failed to resolve plugins")?;

    println!("Load order ({} mode):", runtime.mode());
    for (index, metadata) in plan.iter().enumerate() {
        let origin = match metadata.plugin_file() {
            Some(path) => path.display().to_string(),
            None => "synthesized".to_string(),
        };
        println!(
            "{:>3}. {metadata} [{}] {origin}",
            index + 1,
            metadata.environment()
        );
    }
    Ok(())
}

fn inspect(package: &Path, descriptor: &str) -> Result<()> {
    let Some(metadata) = Metadata::read_package(package, descriptor)
        .with_context(|| format!("failed to read {}", package.display()))?
    else {
        bail!("{} has no plugin descriptor at {descriptor}", package.display());
    };

    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        None | Some(Command::Run) => run(&cli),
        Some(Command::List) => list(&cli),
        Some(Command::Inspect {
            package,
            descriptor,
        }) => inspect(package, descriptor),
    }
}
