use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lab_metrics::{
    default_artifact_path, load_config, load_report, parse_judge_response, run_aggregation,
    AggregateConfig, AggregateOutcome, JudgeArtifact, MetricsError, SummaryStatistics,
};
use serde_json::{json, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lab", version = "0.3.0", about = "Trial metrics aggregation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join judge metrics with trial results and write a summary report
    Aggregate {
        #[arg(long)]
        metrics_dir: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Keep only trials of this task
        #[arg(long)]
        task_id: Option<String>,
        /// Emit per-trial entries only, without summary statistics
        #[arg(long)]
        include_raw: bool,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Base directory for relative log_file references
        #[arg(long)]
        log_root: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Turn a judge response into a metrics artifact for one log
    Score {
        #[arg(long)]
        log_file: PathBuf,
        /// Judge output file; stdin when omitted
        #[arg(long)]
        response: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Print the statistics of an existing aggregate report
    Summarize {
        #[arg(long)]
        report: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let json_mode = command_json_mode(&cli.command);
    let result = run_command(cli.command);
    match result {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                let code = err
                    .downcast_ref::<MetricsError>()
                    .map(MetricsError::code)
                    .unwrap_or("command_failed");
                emit_json(&json_error(code, err.to_string(), json!({})));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run_command(command: Commands) -> Result<Option<Value>> {
    match command {
        Commands::Aggregate {
            metrics_dir,
            output,
            task_id,
            include_raw,
            config,
            log_root,
            json,
        } => {
            let mut resolved = match config.as_deref() {
                Some(path) => load_config(path)?,
                None => AggregateConfig::default(),
            };
            if let Some(dir) = metrics_dir {
                resolved.metrics_dir = dir;
            }
            if let Some(out) = output {
                resolved.output = out;
            }
            if task_id.is_some() {
                resolved.task_id = task_id;
            }
            if include_raw {
                resolved.include_raw = true;
            }
            if log_root.is_some() {
                resolved.log_root = log_root;
            }
            if resolved.log_root.is_none() {
                resolved.log_root = Some(std::env::current_dir()?);
            }
            tracing::debug!(config = ?resolved, "resolved aggregate config");

            let outcome = run_aggregation(&resolved)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "aggregate",
                    "aggregate": outcome_to_json(&outcome),
                })));
            }
            for skipped in &outcome.skipped {
                eprintln!("skipped: {}", skipped.reason);
            }
            println!("Wrote aggregate metrics to {}", outcome.output.display());
        }
        Commands::Score {
            log_file,
            response,
            output,
            json,
        } => {
            let text = read_response(response.as_deref())?;
            let scores = parse_judge_response(&text)?;
            let artifact = JudgeArtifact::new(&log_file, scores);
            let out_path = output.unwrap_or_else(|| default_artifact_path(&log_file));
            artifact.write(&out_path)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "score",
                    "output": out_path.display().to_string(),
                    "metrics": artifact,
                })));
            }
            println!("{}", serde_json::to_string_pretty(&artifact)?);
        }
        Commands::Summarize { report, json } => {
            let loaded = load_report(&report)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "summarize",
                    "report": report.display().to_string(),
                    "trials": loaded.trials.len(),
                    "summary": loaded.summary,
                })));
            }
            println!("report: {}", report.display());
            println!("trials: {}", loaded.trials.len());
            match (&loaded.summary.overall, &loaded.summary.per_task) {
                (Some(overall), per_task) => {
                    print_stats("overall", overall);
                    if let Some(per_task) = per_task {
                        for (task_id, stats) in per_task.iter() {
                            print_stats(task_id, stats);
                        }
                    }
                }
                (None, _) => println!("summary: none (raw-only report)"),
            }
        }
    }
    Ok(None)
}

fn read_response(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("failed to read judge response {}", p.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read judge response from stdin")?;
            Ok(buf)
        }
    }
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\",\"details\":{{}}}}}}"
        ),
    }
}

fn json_error(code: &str, message: String, details: Value) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Aggregate { json, .. }
        | Commands::Score { json, .. }
        | Commands::Summarize { json, .. } => *json,
    }
}

fn outcome_to_json(outcome: &AggregateOutcome) -> Value {
    json!({
        "output": outcome.output.display().to_string(),
        "trials": outcome.report.trials.len(),
        "filtered_out": outcome.filtered_out,
        "skipped": outcome
            .skipped
            .iter()
            .map(|s| json!({"path": s.path.display().to_string(), "reason": s.reason}))
            .collect::<Vec<_>>(),
        "summary": outcome.report.summary,
    })
}

fn print_stats(label: &str, stats: &SummaryStatistics) {
    println!(
        "{}: count={} pass@1={:.3} ca_mean={:.3} pr_mean={:.3} srs_mean={:.3}",
        label, stats.count, stats.pass_at_1, stats.ca_mean, stats.pr_mean, stats.srs_mean
    );
}
