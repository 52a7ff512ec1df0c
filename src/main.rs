//! Splicer - command line entry point.
//!
//! `splicer <path-or-github-url>` documents (or, in graph mode, analyses)
//! every Java file of a repository and writes the results under the
//! configured output directory.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use splicer::{
    ApproximateCounter, BatchProcessor, GitAcquirer, HttpTransformGateway, PipelineConfig,
    ReportWriter, TiktokenCounter, TokenCounter,
};

const USAGE: &str = "usage: splicer <path-or-github-url>";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("splicer=info"));
    let json = std::env::var("SPLICER_LOG_JSON")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Run aborted");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let target = std::env::args().nth(1).context(USAGE)?;

    let config = PipelineConfig::load(None)?;
    let preset = config.concurrency_preset()?;
    let model = config.model_preset()?;
    let budget = config.token_budget()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        target = %target,
        preset = %preset,
        model = model.name,
        budget,
        mode = ?config.mode,
        "Starting splicer"
    );

    let acquired = GitAcquirer::from_config(&config).acquire(&target).await?;
    let source = Arc::new(acquired.source()?);

    let counter: Arc<dyn TokenCounter> = match TiktokenCounter::for_model(model.model_name) {
        Ok(counter) => Arc::new(counter),
        Err(e) => {
            warn!(error = %e, "Tokenizer unavailable, using approximate counts");
            Arc::new(ApproximateCounter::new())
        }
    };

    if config.api_key.is_none() {
        warn!("No API key configured (OPENAI_API_KEY or SPLICER_API_KEY)");
    }
    let gateway = Arc::new(HttpTransformGateway::from_config(&config)?);
    let processor = BatchProcessor::from_config(&config, counter, gateway)?;

    let mut report = processor.run(source).await?;

    let writer = ReportWriter::for_repository(&config, acquired.name());
    let written = writer
        .write(&mut report)
        .await
        .with_context(|| format!("writing artifacts to {}", writer.output_dir().display()))?;

    println!("{}", report.summary());
    println!("Report written to {}", written.report.display());
    Ok(())
}
