use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use serde_json::{json, Value};

use skipwatch_lib::config;
use skipwatch_lib::detector::snapshot::{RecordingSink, SnapshotProvider, SnapshotTree};
use skipwatch_lib::journal::Persistence;
use skipwatch_lib::{init_logging, WatchHandle};

/// Replay recorded UI snapshots through the skip detector.
#[derive(Parser, Debug)]
#[command(name = "skipwatch-replay", version, about, long_about = None)]
struct Cli {
    /// JSON-lines trace, one snapshot tree per line
    trace: PathBuf,

    /// Directory holding the counter, log and record files
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Config file (defaults to the per-user config)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the skip label from the config
    #[arg(long)]
    label: Option<String>,

    /// Run a manual check against the last snapshot after the replay
    #[arg(long, action = ArgAction::SetTrue)]
    check: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let mut config = match &cli.config {
        Some(path) => config::load(path),
        None => config::default_path()
            .map(|path| config::load(&path))
            .unwrap_or_default(),
    };
    if let Some(label) = cli.label {
        config.skip_label = label;
    }

    let state_dir = cli
        .state_dir
        .or_else(|| config.resolved_state_dir())
        .context("no state directory available")?;
    let persistence = Persistence::open_dir(&state_dir)
        .with_context(|| format!("failed to open state dir {}", state_dir.display()))?;

    let trees = read_trace(&cli.trace)?;

    let provider = SnapshotProvider::new();
    let sink = RecordingSink::new();
    let handle = WatchHandle::spawn(config, provider.clone(), sink.clone(), persistence)?;
    handle.start()?;

    for tree in &trees {
        provider.show(Arc::clone(tree));
        handle.notify(tree.event());
    }

    let manual = if cli.check {
        let (tx, rx) = mpsc::channel();
        handle.check_now(move |result| {
            let _ = tx.send(result);
        })?;
        let result = rx.recv().context("worker exited before reporting")?;
        Some(match result {
            Ok(outcome) => serde_json::to_value(outcome)?,
            Err(err) => json!({ "error": err.to_string() }),
        })
    } else {
        None
    };

    handle.stop()?;
    handle.shutdown();

    let accepted_total = Persistence::open_dir(&state_dir)?
        .read_counter()
        .context("failed to read accepted counter")?
        .unwrap_or(0);

    let summary = json!({
        "events": trees.len(),
        "accepted_total": accepted_total,
        "activations": sink.activations(),
        "manual_check": manual.unwrap_or(Value::Null),
        "state_dir": state_dir.display().to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn read_trace(path: &Path) -> Result<Vec<Arc<SnapshotTree>>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read trace {}", path.display()))?;
    let mut trees = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let tree: SnapshotTree = serde_json::from_str(line)
            .with_context(|| format!("trace line {} is not a snapshot", idx + 1))?;
        trees.push(Arc::new(tree));
    }
    Ok(trees)
}
