use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use dst_compiler::app::link_check_use_case::LinkCheckUseCase;
use dst_compiler::app::ports::UrlProbePort;
use dst_compiler::config::Config;
use dst_compiler::infra::{FileCollector, FsArtifactStore, ReqwestProbe};
use dst_compiler::logging;
use dst_compiler::pipeline::artifact::PublishedArtifact;
use dst_compiler::pipeline::processing::coverage::CoverageGapAnalyzer;
use dst_compiler::pipeline::processing::quality_gate::batch_checks::prior_integrity;
use dst_compiler::pipeline::processing::quality_gate::{AuditContext, AuditEngine, UrlPolicy};
use dst_compiler::pipeline::processing::window::WindowDates;
use dst_compiler::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "dst_compiler")]
#[command(about = "Compile, audit and publish disaster declaration records")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file (defaults to $DST_CONFIG, then ./dst_compiler.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect, normalize, merge, window, audit and publish
    Run {
        /// Run date (YYYY-MM-DD); defaults to today in UTC
        #[arg(long)]
        today: Option<NaiveDate>,
        /// Override the feed input directory
        #[arg(long)]
        input_dir: Option<PathBuf>,
        /// Override the output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Re-audit an existing artifact without publishing anything
    Audit {
        artifact: PathBuf,
        #[arg(long)]
        today: Option<NaiveDate>,
        /// Probe official URLs as well
        #[arg(long)]
        check_urls: bool,
    },
    /// Report coverage gaps of an existing artifact
    Gaps { artifact: PathBuf },
    /// Compute one eligibility window from raw dates
    Window {
        #[arg(long)]
        declaration_date: NaiveDate,
        #[arg(long)]
        incident_start: NaiveDate,
        /// Omit for an ongoing incident
        #[arg(long)]
        incident_end: Option<NaiveDate>,
        /// Renewal date; repeat for several
        #[arg(long = "renewal")]
        renewals: Vec<NaiveDate>,
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

fn today_or(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Utc::now().date_naive())
}

fn read_artifact(path: &Path) -> anyhow::Result<PublishedArtifact> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let artifact = PublishedArtifact::from_slice(&bytes)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(artifact)
}

fn build_prober(config: &Config) -> anyhow::Result<Option<Arc<dyn UrlProbePort>>> {
    if !config.url_checks.enabled {
        return Ok(None);
    }
    let probe = ReqwestProbe::new(
        &config.url_checks.user_agent,
        Duration::from_secs(config.url_checks.timeout_secs),
    )?;
    Ok(Some(Arc::new(probe)))
}

async fn run_compile(
    mut config: Config,
    today: NaiveDate,
    input_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<ExitCode> {
    if let Some(dir) = input_dir {
        config.paths.input_dir = dir;
    }
    if let Some(dir) = output_dir {
        config.paths.output_dir = dir;
    }

    let collector = Arc::new(FileCollector::new(config.paths.input_dir.clone()));
    let store = Arc::new(FsArtifactStore::new(config.paths.output_dir.clone()));
    let prober = build_prober(&config)?;
    let pipeline = Pipeline::new(config, collector, store, prober)?;

    println!("🚀 Compiling declarations for {}...", today);
    let result = pipeline.run(today).await?;

    println!("\n📊 Run summary:");
    println!("   Records published: {}", result.record_count);
    println!("   Rejected during normalization: {}", result.rejected);
    println!("   Expired and dropped: {}", result.expired_dropped);
    println!("   Excluded by audit: {}", result.excluded);
    println!("   Warnings: {}", result.warnings);
    println!("   Coverage gaps: {}", result.coverage_gaps.len());
    if !result.unavailable_feeds.is_empty() {
        println!("   Unavailable feeds: {}", result.unavailable_feeds.join(", "));
    }

    if result.published {
        println!("\n✅ Artifact published");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("\n❌ Publication withheld; previous artifact left in place");
        for failure in &result.gate_failures {
            println!("   - {}", failure);
        }
        Ok(ExitCode::FAILURE)
    }
}

async fn run_audit(config: &Config, path: &Path, today: NaiveDate, check_urls: bool) -> anyhow::Result<ExitCode> {
    let artifact = read_artifact(path)?;
    let urls = UrlPolicy::from_config(&config.url_checks)?;

    let probes = if check_urls {
        let probe = ReqwestProbe::new(
            &config.url_checks.user_agent,
            Duration::from_secs(config.url_checks.timeout_secs),
        )?;
        LinkCheckUseCase::new(
            Arc::new(probe),
            config.url_checks.max_concurrency,
            Duration::from_secs(config.url_checks.timeout_secs),
        )
        .check_all(&artifact.disasters, &urls)
        .await
    } else {
        HashMap::new()
    };

    // Standalone: no prior artifact to compare counts against
    let ctx = AuditContext {
        today,
        config: &config.audit,
        urls: &urls,
        prior: None,
        probes: &probes,
    };
    let integrity = prior_integrity(Some(&artifact));
    let mut report = AuditEngine::audit(artifact.disasters, &ctx);
    if let Some(warning) = integrity {
        warn!("{}", warning.message);
        report.record_gate(warning);
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.passed {
        info!(checked = report.checked, "Artifact passes audit");
        Ok(ExitCode::SUCCESS)
    } else {
        error!(excluded = report.excluded.len(), "Artifact fails audit");
        Ok(ExitCode::FAILURE)
    }
}

fn run_gaps(config: &Config, path: &Path) -> anyhow::Result<ExitCode> {
    let artifact = read_artifact(path)?;
    let gaps = CoverageGapAnalyzer::new(&config.coverage).analyze(&artifact.disasters);
    println!("{}", serde_json::to_string_pretty(&gaps)?);
    Ok(ExitCode::SUCCESS)
}

fn run_window(dates: WindowDates, today: NaiveDate) -> anyhow::Result<ExitCode> {
    let window = dates.compute(today)?;
    println!("{}", serde_json::to_string_pretty(&window)?);
    Ok(ExitCode::SUCCESS)
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { today, input_dir, output_dir } => {
            logging::init_logging(&config.paths.log_dir);
            run_compile(config, today_or(today), input_dir, output_dir).await
        }
        Commands::Audit { artifact, today, check_urls } => {
            logging::init_logging(&config.paths.log_dir);
            run_audit(&config, &artifact, today_or(today), check_urls).await
        }
        Commands::Gaps { artifact } => run_gaps(&config, &artifact),
        Commands::Window {
            declaration_date,
            incident_start,
            incident_end,
            renewals,
            today,
        } => {
            let dates = WindowDates {
                declaration_date,
                incident_start,
                incident_end,
                latest_renewal: renewals.into_iter().max(),
            };
            run_window(dates, today_or(today))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}
