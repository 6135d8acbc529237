//! snaplens - LLM-assisted analysis of system configuration snapshots
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (model server, storage, config, etc.)
//!   2 - Invalid request (bad options or ids)
//!   3 - Snapshot or analysis not found

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use snaplens::cli::{Args, Command};
use snaplens::config::{Config, CONFIG_FILE};
use snaplens::models::{AnalysisOptions, AnalysisRecord};
use snaplens::report::{self, OutputFormat};
use snaplens::{AnalysisService, CompareOptions, PipelineError};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    // Handle init-config early (no logging needed)
    if let Command::InitConfig = args.command {
        return handle_init_config();
    }

    init_logging(&args);

    info!("snaplens v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let code = e
                .downcast_ref::<PipelineError>()
                .map_or(1, PipelineError::exit_code);
            error!("{}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(code);
        }
    }
}

/// Handle init-config: generate a default .snaplens.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the model server, model name and storage directories.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let service = AnalysisService::from_config(&config)
        .context("Failed to initialize the model client")?;

    match args.command {
        Command::Analyze {
            snapshot_id,
            focus,
            sections,
            depth,
        } => {
            let options = AnalysisOptions {
                model: None,
                focus,
                sections,
                depth: Some(depth.unwrap_or(config.analysis.default_depth)),
            };
            analyze(&service, &config, &snapshot_id, &options, args.quiet).await
        }
        Command::List => {
            print_records(&service.list_analyses().await?);
            Ok(())
        }
        Command::Show { id, interactions } => {
            let mut analysis = service.get_analysis(&id).await?;
            if !interactions {
                analysis.llm_interactions = None;
            }
            println!("{}", serde_json::to_string_pretty(&analysis)?);
            Ok(())
        }
        Command::Delete { id } => {
            service.delete_analysis(&id).await?;
            println!("🗑️  Deleted analysis {}", id);
            Ok(())
        }
        Command::Report {
            id,
            format,
            output,
            limit,
        } => {
            let report = service.get_report(&id, limit).await?;
            emit(&report::render_report(&report, format)?, output.as_deref(), format)
        }
        Command::Compare {
            baseline,
            current,
            sections,
            format,
            output,
        } => {
            let comparison = service
                .compare_analyses(&baseline, &current, &CompareOptions { sections })
                .await?;
            emit(
                &report::render_comparison(&comparison, format)?,
                output.as_deref(),
                format,
            )
        }
        Command::Models { refresh } => {
            let models = service.list_models(refresh).await?;
            if models.is_empty() {
                println!("No models reported by {}", config.model.server_url);
            }
            for model in models {
                println!("{}", model);
            }
            Ok(())
        }
        Command::InitConfig => handle_init_config(),
    }
}

async fn analyze(
    service: &AnalysisService,
    config: &Config,
    snapshot_id: &str,
    options: &AnalysisOptions,
    quiet: bool,
) -> Result<()> {
    println!("🔬 Analyzing snapshot: {}", snapshot_id);
    println!("   Model: {}", config.model.name);
    println!("   Server: {}", config.model.server_url);
    println!("   Timeout: {}s per section", config.model.timeout_seconds);

    let spinner = (!quiet).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Waiting for the model...");
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    });

    let result = service.create_analysis(snapshot_id, options).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let created = result?;
    println!(
        "\n✅ Analysis complete: {} sections in {:.1}s",
        created.sections.len(),
        created.duration_ms as f64 / 1000.0
    );
    println!("   Sections: {}", created.sections.join(", "));
    println!("   Run `snaplens report {}` to view the results.", created.id);
    Ok(())
}

fn print_records(records: &[AnalysisRecord]) {
    if records.is_empty() {
        println!("No analyses found.");
        return;
    }

    for record in records {
        let started = record
            .started_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<30} {:<11} {:<20} {:>3} sections  {}",
            record.id,
            record.status.to_string(),
            started,
            record.sections.len(),
            record.model
        );
    }
}

/// Print rendered output or write it to a file.
fn emit(content: &str, output: Option<&Path>, format: OutputFormat) -> Result<()> {
    match output {
        Some(path) => {
            report::write_output(content, path)?;
            let kind = match format {
                OutputFormat::Markdown => "Markdown",
                OutputFormat::Json => "JSON",
            };
            println!("✅ {} written to: {}", kind, path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
