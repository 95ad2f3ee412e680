use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use beatwise_audio::AudioDecoder;
use beatwise_domain::Settings;
use beatwise_estimator::TempoEstimator;
use beatwise_services::{AnalysisScheduler, DecoderSource};

#[derive(Parser, Debug)]
#[command(author, version, about = "Estimate the tempo of audio files", long_about = None)]
struct Cli {
    /// Audio files to analyze
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// YAML or JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Channel of each file fed to the estimator
    #[arg(long, default_value_t = 0)]
    channel: usize,
    /// Overrides the configured number of tracks analyzed at once
    #[arg(long)]
    max_parallel: Option<usize>,
    /// Print peaks and top interval candidates of the first file to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(max_parallel) = cli.max_parallel {
        settings.scheduler.max_parallel_decode = max_parallel;
    }
    settings.validate()?;
    info!(?settings, "loaded settings");

    let estimator = TempoEstimator::new(settings.estimator.clone())?;

    if cli.verbose {
        let path = cli.files[0].clone();
        let channel = cli.channel;
        let engine = estimator.clone();
        let analysis = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
            let buffer = AudioDecoder::open(&path)?.into_channel(channel)?;
            Ok(engine.analyze(&buffer))
        })
        .await
        .context("verbose analysis task failed")??;
        match analysis {
            Ok(analysis) => {
                eprintln!("peaks: {}", analysis.peaks.len());
                for candidate in &analysis.candidates {
                    eprintln!(
                        "interval {:>6} samples  votes {:>5}  ~{} bpm",
                        candidate.interval,
                        candidate.count,
                        candidate.bpm(analysis.sample_rate)
                    );
                }
            }
            Err(err) => eprintln!("verbose analysis: {err}"),
        }
    }

    let scheduler = AnalysisScheduler::new(
        Arc::new(DecoderSource::new(cli.channel)),
        estimator,
        &settings.scheduler,
    );
    let reports = scheduler.analyze_all(cli.files).await;
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
