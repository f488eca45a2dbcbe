use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use colored::Colorize;
use limitcfr::config::TrainConfig;
use limitcfr::error::SolverError;
use limitcfr::solver::checkpoint::Snapshot;
use limitcfr::solver::control::Hooks;
use limitcfr::solver::control::TrainReport;
use limitcfr::solver::control::Trainer;
use limitcfr::solver::export;
use std::path::PathBuf;

/// process exit codes: 0 stopped by criterion, 1 cancelled,
/// 2 configuration error, 3 checkpoint io error
const EXIT_OK: i32 = 0;
const EXIT_CANCELLED: i32 = 1;
const EXIT_CONFIG: i32 = 2;
const EXIT_CHECKPOINT: i32 = 3;

#[derive(Parser)]
#[command(name = "limitcfr", about = "CFR solver for heads-up limit hold'em")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// train a strategy from scratch
    Solve {
        #[arg(long)]
        config: PathBuf,
    },
    /// continue training from a checkpoint
    Resume {
        #[arg(long)]
        checkpoint: PathBuf,
    },
    /// show the checkpoints in a directory
    ListCheckpoints {
        #[arg(long, default_value = "checkpoints")]
        directory: PathBuf,
    },
    /// write the average strategy of a checkpoint as json lines
    ExportStrategy {
        #[arg(long)]
        checkpoint: PathBuf,
        #[arg(long, default_value = "strategy.jsonl")]
        output: PathBuf,
    },
}

fn main() {
    limitcfr::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            match e.downcast_ref::<SolverError>() {
                Some(SolverError::ConfigInvalid(_)) => EXIT_CONFIG,
                Some(SolverError::CheckpointIo(_)) => EXIT_CHECKPOINT,
                Some(SolverError::CancelRequested) => EXIT_CANCELLED,
                _ => EXIT_CONFIG,
            }
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Command::Solve { config } => {
            let config = TrainConfig::load(&config)?;
            solve(config)
        }
        Command::Resume { checkpoint } => {
            let snapshot = Snapshot::read(&checkpoint)?;
            log::info!(
                "resuming from {} at iteration {}",
                checkpoint.display(),
                snapshot.iteration
            );
            resume(snapshot)
        }
        Command::ListCheckpoints { directory } => {
            let entries = Snapshot::list(&directory)?;
            if entries.is_empty() {
                println!("no checkpoints under {}", directory.display());
            }
            for entry in entries {
                println!(
                    "{:>16}  {}",
                    format!("iter {}", entry.iteration).cyan(),
                    entry.path.display()
                );
            }
            Ok(EXIT_OK)
        }
        Command::ExportStrategy { checkpoint, output } => {
            let snapshot = Snapshot::read(&checkpoint)?;
            let store = limitcfr::solver::new_store(&snapshot.config.resources);
            snapshot.restore_into(&store);
            let rows = export::export_strategy(&store);
            export::write_jsonl(&rows, &output)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("{} infosets -> {}", rows.len(), output.display());
            Ok(EXIT_OK)
        }
    }
}

fn solve(config: TrainConfig) -> anyhow::Result<i32> {
    let bar = limitcfr::progress(config.iter.max_iterations as usize);
    let trainer = Trainer::new(config, hooks(&bar))?;
    train(trainer, bar)
}

fn resume(snapshot: Snapshot) -> anyhow::Result<i32> {
    let bar = limitcfr::progress(snapshot.config.iter.max_iterations as usize);
    let trainer = Trainer::resume(snapshot, hooks(&bar))?;
    train(trainer, bar)
}

fn train(mut trainer: Trainer, bar: indicatif::ProgressBar) -> anyhow::Result<i32> {
    let report = trainer.train()?;
    bar.finish_and_clear();
    summarize(&report);
    Ok(if report.stopping_reason == "cancelled" {
        EXIT_CANCELLED
    } else {
        EXIT_OK
    })
}

fn hooks(bar: &indicatif::ProgressBar) -> Hooks {
    let progress = bar.clone();
    Hooks {
        on_progress: Some(Box::new(move |p| {
            progress.set_position(p.iteration);
        })),
        on_checkpoint: Some(Box::new(|path, iteration| {
            log::info!("checkpoint at iteration {}: {}", iteration, path.display());
        })),
        compute_exploitability: None,
    }
}

fn summarize(report: &TrainReport) {
    println!(
        "{} after {} iterations in {:.1}s",
        report.stopping_reason.green(),
        report.iterations,
        report.elapsed.as_secs_f64(),
    );
    println!(
        "{:<24}{:<24}{:<24}",
        format!("infosets {}", report.convergence.infosets),
        format!("entropy {:.4}", report.convergence.mean_entropy),
        format!("drift {:.6}", report.convergence.strategy_drift),
    );
    if let Some(exploitability) = report.exploitability {
        println!("exploitability estimate {:.6}", exploitability);
    }
    println!("{} checkpoints written", report.checkpoints_written);
}
