use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use yolox_pose::head::{self, BatchRecord, HeadConfig, IoError, PredictionRecord};
use yolox_pose::pipeline::{self, PipelineError};

/// Evaluate YOLOX-Pose label assignment and losses on recorded data.
#[derive(Parser, Debug)]
#[command(name = "yolox-pose", author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Examples:
    yolox-pose init-config head.json
    yolox-pose loss --config head.json --batch batch.json --epoch 90 --json
    yolox-pose candidates --config head.json --predictions preds.json"#)]
struct Cli {
    /// Log assignment details to stderr
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collate a recorded batch and print its per-term losses
    Loss(LossArgs),
    /// Decode recorded head output into NMS candidates (JSON)
    Candidates(CandidatesArgs),
    /// Write the default head config
    InitConfig {
        /// Output path
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
struct LossArgs {
    /// Head config (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Batch record (JSON): images, instances and raw predictions
    #[arg(short, long)]
    batch: PathBuf,

    /// 0-based training epoch, selects the training stage
    #[arg(long, default_value_t = 0)]
    epoch: usize,

    /// Print the report as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug)]
struct CandidatesArgs {
    /// Head config (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Prediction records (JSON list)
    #[arg(short, long)]
    predictions: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "tracing")]
fn init_logging(_verbose: bool) {
    yolox_pose::core::init_tracing(false);
}

#[cfg(not(feature = "tracing"))]
fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    let _ = yolox_pose::core::init_with_level(level);
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Loss(args) => {
            let config = HeadConfig::load_json(&args.config)?;
            let record: BatchRecord = head::load_json(&args.batch)?;
            let report = pipeline::evaluate_batch(&config, record, args.epoch)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("epoch: {} ({:?})", report.epoch, report.phase);
                println!("num_pos: {}", report.losses.num_pos);
                for (name, value) in report.losses.named() {
                    println!("{name}: {value:.6}");
                }
                println!("loss: {:.6}", report.losses.total);
            }
        }
        Command::Candidates(args) => {
            let config = HeadConfig::load_json(&args.config)?;
            let records: Vec<PredictionRecord> = head::load_json(&args.predictions)?;
            let report = pipeline::decode_records(&config, &records)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::InitConfig { path } => {
            HeadConfig::default().write_json(&path)?;
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}
