use std::path::PathBuf;

use clap::Parser;
use tabular_ingest::{
    batch_service::BatchService,
    config::Settings,
    domain::models::{ProcessingStatus, RunReport},
};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "ingest")]
#[command(about = "Identify, extract and store tabular data from uploaded files")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "config.json", help = "Settings file (JSON, or YAML by extension); created with defaults if missing")]
    config: PathBuf,

    #[arg(help = "Local files to ingest in addition to the configured download_urls")]
    files: Vec<String>,
}

fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let settings = Settings::load_or_create(&cli.config)?;
    let _guard = init_tracing(&settings)?;

    info!("Starting tabular ingestion");
    debug!("Settings: {:?}", settings);

    let inputs: Vec<String> = settings
        .download_urls
        .iter()
        .cloned()
        .chain(cli.files)
        .collect();

    let service = BatchService::new(&settings)?;
    let report = service.run(&inputs)?;
    log_report(&report);

    Ok(())
}

fn init_tracing(settings: &Settings) -> Result<Option<WorkerGuard>, BoxError> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("tabular_ingest={}", settings.log_level).parse()?)
        .add_directive(format!("ingest={}", settings.log_level).parse()?);

    let (file_layer, guard) = match &settings.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| format!("log_file {} has no file name", path.display()))?;
            std::fs::create_dir_all(&dir)?;

            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            let layer = fmt::layer().with_writer(writer).with_ansi(false).with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_file(true)
                .with_line_number(true),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

fn log_report(report: &RunReport) {
    info!("==================== Run summary ====================");
    info!("Run {}: {}", report.run_id, report.overall_status);
    info!(
        "Entries: {} total, {} succeeded, {} failed, {} skipped",
        report.summaries.len(),
        report.count(ProcessingStatus::Success),
        report.count(ProcessingStatus::Failed),
        report.count(ProcessingStatus::Skipped)
    );

    for (i, summary) in report.summaries.iter().enumerate() {
        info!("{}. {} [{:?}] {}", i + 1, summary.source_filename, summary.status, summary.message);
        if let Some(details) = &summary.details {
            debug!("   details: {}", details);
        }
    }
    info!(
        "Finished in {} ms",
        (report.finished_at - report.started_at).num_milliseconds()
    );
}
