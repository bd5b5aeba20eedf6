use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use cairn_config::PipelineDef;
use cairn_engine::{EngineConfig, Project, TargetOutcome};
use cairn_functions::FunctionRegistry;

/// Cairn - an incremental pipeline build engine
#[derive(Parser)]
#[command(name = "cairn")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the result store directory (default: `.cairn` next to the
  /// pipeline file)
  #[arg(long, global = true)]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a staleness-aware build pass
  Build {
    /// Path to the pipeline definition (JSON)
    pipeline_file: PathBuf,

    /// Maximum number of targets executing concurrently
    #[arg(long)]
    workers: Option<usize>,
  },

  /// Print a target's cached result
  Read {
    /// Path to the pipeline definition (JSON)
    pipeline_file: PathBuf,

    /// The target to read
    target: String,
  },

  /// Print the declared targets and dependency edges as JSON
  Manifest {
    /// Path to the pipeline definition (JSON)
    pipeline_file: PathBuf,

    /// Include per-target staleness status
    #[arg(long)]
    status: bool,
  },

  /// Print the dependency graph as Graphviz DOT with status coloring
  Graph {
    /// Path to the pipeline definition (JSON)
    pipeline_file: PathBuf,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
  match cli.command {
    Commands::Build {
      pipeline_file,
      workers,
    } => {
      let project = load_project(&pipeline_file, cli.store, workers).await?;
      run_build(&project).await
    }
    Commands::Read {
      pipeline_file,
      target,
    } => {
      let project = load_project(&pipeline_file, cli.store, None).await?;
      let value = project.read(&target).await?;
      println!("{}", serde_json::to_string_pretty(&value)?);
      Ok(())
    }
    Commands::Manifest {
      pipeline_file,
      status,
    } => {
      let project = load_project(&pipeline_file, cli.store, None).await?;
      if status {
        let entries = project.status_manifest().await;
        println!("{}", serde_json::to_string_pretty(&entries)?);
      } else {
        println!("{}", serde_json::to_string_pretty(&project.manifest())?);
      }
      Ok(())
    }
    Commands::Graph { pipeline_file } => {
      let project = load_project(&pipeline_file, cli.store, None).await?;
      print!("{}", project.graph_dot().await);
      Ok(())
    }
  }
}

/// Read and resolve a pipeline definition, binding it to its store.
async fn load_project(
  pipeline_file: &Path,
  store: Option<PathBuf>,
  workers: Option<usize>,
) -> Result<Project> {
  let content = tokio::fs::read_to_string(pipeline_file)
    .await
    .with_context(|| format!("failed to read pipeline file: {}", pipeline_file.display()))?;

  let def: PipelineDef = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse pipeline file: {}", pipeline_file.display()))?;

  let store_root = store.unwrap_or_else(|| {
    pipeline_file
      .parent()
      .unwrap_or(Path::new("."))
      .join(".cairn")
  });

  let project = Project::resolve(
    &def,
    FunctionRegistry::with_builtins(),
    store_root,
    EngineConfig {
      max_workers: workers,
    },
  )
  .context("failed to resolve pipeline")?;

  Ok(project)
}

async fn run_build(project: &Project) -> Result<()> {
  let report = project.build(CancellationToken::new()).await?;

  for entry in &report.targets {
    match &entry.outcome {
      TargetOutcome::Executed { duration_ms } => {
        println!("{:<12} {} ({} ms)", "built", entry.target, duration_ms);
      }
      TargetOutcome::Skipped => {
        println!("{:<12} {}", "up-to-date", entry.target);
      }
      TargetOutcome::Failed { error } => {
        println!("{:<12} {}: {}", "failed", entry.target, error);
      }
      TargetOutcome::Blocked { upstream } => {
        println!(
          "{:<12} {} (upstream '{}' failed)",
          "blocked", entry.target, upstream
        );
      }
    }
  }

  eprintln!(
    "{} built, {} up to date, {} failed, {} blocked",
    report.executed_count(),
    report.skipped_count(),
    report.failed_count(),
    report.blocked_count()
  );

  if !report.is_success() {
    anyhow::bail!(
      "build finished with {} failed and {} blocked target(s)",
      report.failed_count(),
      report.blocked_count()
    );
  }
  Ok(())
}
