use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

use beatwise_domain::{Settings, TempoResponse};
use beatwise_estimator::TempoEstimator;
use beatwise_services::{AnalysisScheduler, DecoderSource};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Score tempo estimation settings against labeled tracks"
)]
struct Args {
    /// JSON array of `{ "path": ..., "bpm": ... }` labels; relative paths resolve against its directory
    labels: PathBuf,
    /// YAML or JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 0)]
    channel: usize,
}

#[derive(Debug, Deserialize)]
struct LabeledTrack {
    path: PathBuf,
    bpm: f64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum Verdict {
    Exact,
    WithinOne,
    Octave,
    Miss,
    Failed,
}

fn judge(expected: f64, response: &TempoResponse) -> Verdict {
    let Some(bpm) = response.bpm() else {
        return Verdict::Failed;
    };
    let estimated = bpm as f64;
    if estimated == expected.round() {
        Verdict::Exact
    } else if (estimated - expected).abs() <= 1.0 {
        Verdict::WithinOne
    } else if (estimated * 2.0 - expected).abs() <= 1.0 || (estimated / 2.0 - expected).abs() <= 1.0
    {
        Verdict::Octave
    } else {
        Verdict::Miss
    }
}

#[derive(Debug, Serialize)]
struct TrackOutcome {
    path: PathBuf,
    expected: f64,
    #[serde(flatten)]
    response: TempoResponse,
    verdict: Verdict,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
struct Summary {
    total: usize,
    exact: usize,
    within_one: usize,
    octave: usize,
    miss: usize,
    failed: usize,
}

impl Summary {
    fn record(&mut self, verdict: Verdict) {
        self.total += 1;
        match verdict {
            Verdict::Exact => self.exact += 1,
            Verdict::WithinOne => self.within_one += 1,
            Verdict::Octave => self.octave += 1,
            Verdict::Miss => self.miss += 1,
            Verdict::Failed => self.failed += 1,
        }
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let file = File::open(&args.labels)
        .with_context(|| format!("open labels file {:?}", args.labels))?;
    let labels: Vec<LabeledTrack> = serde_json::from_reader(BufReader::new(file))?;
    info!(count = labels.len(), "loaded labels");

    let base = args.labels.parent().unwrap_or_else(|| Path::new("."));
    let paths: Vec<PathBuf> = labels
        .iter()
        .map(|label| resolve(base, &label.path))
        .collect();

    let estimator = TempoEstimator::new(settings.estimator.clone())?;
    let scheduler = AnalysisScheduler::new(
        Arc::new(DecoderSource::new(args.channel)),
        estimator,
        &settings.scheduler,
    );
    let reports = scheduler.analyze_all(paths).await;

    let mut summary = Summary::default();
    let outcomes: Vec<TrackOutcome> = labels
        .iter()
        .zip(reports)
        .map(|(label, report)| {
            let verdict = judge(label.bpm, &report.response);
            summary.record(verdict);
            TrackOutcome {
                path: report.path,
                expected: label.bpm,
                response: report.response,
                verdict,
            }
        })
        .collect();

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "tracks": outcomes,
            "summary": summary,
        }))?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdicts_cover_octave_errors() {
        let ok = |bpm| TempoResponse::Success { bpm };
        assert_eq!(judge(120.0, &ok(120)), Verdict::Exact);
        assert_eq!(judge(120.4, &ok(121)), Verdict::WithinOne);
        assert_eq!(judge(90.0, &ok(180)), Verdict::Octave);
        assert_eq!(judge(170.0, &ok(85)), Verdict::Octave);
        assert_eq!(judge(128.0, &ok(100)), Verdict::Miss);
        assert_eq!(
            judge(128.0, &TempoResponse::internal("boom")),
            Verdict::Failed
        );
    }

    #[test]
    fn summary_counts_verdicts() {
        let mut summary = Summary::default();
        for verdict in [Verdict::Exact, Verdict::Exact, Verdict::Miss, Verdict::Failed] {
            summary.record(verdict);
        }
        assert_eq!(
            summary,
            Summary {
                total: 4,
                exact: 2,
                within_one: 0,
                octave: 0,
                miss: 1,
                failed: 1,
            }
        );
    }

    #[test]
    fn relative_label_paths_follow_the_labels_file() {
        assert_eq!(
            resolve(Path::new("corpus"), Path::new("a.wav")),
            PathBuf::from("corpus/a.wav")
        );
    }
}
