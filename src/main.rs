mod clock;
mod config;
mod error;
mod executor;
mod interrupt;
mod logging;
mod process;
mod report;
mod sequence;
mod signal;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use config::{MortaConfig, DEFAULT_CONFIG_FILE};
use error::{exit_codes, CliError};
use executor::{ExecutionContext, Executor, RunOutcome};
use interrupt::CancelFlag;
use logging::{LogSink, Verbosity};
use process::TargetPid;
use report::RunReport;
use sequence::{ShutdownSequence, Step};
use std::path::PathBuf;
use std::time::Duration;

/// Trailing `--help` text: the sequence grammar and every accepted signal name.
fn signal_help() -> String {
    let names: Vec<&str> = signal::SignalKind::names().collect();
    let rows: Vec<String> = names.chunks(15).map(|row| row.join(" ")).collect();
    format!(
        "Sequence grammar: SIGNAL[:SECONDS:SIGNAL]...  e.g. term:10:int:5:kill\n\n\
         Signals: {}",
        rows.join("\n         ")
    )
}

fn parse_pid(value: &str) -> Result<TargetPid, String> {
    let raw = value.parse::<i32>().map_err(|e| e.to_string())?;
    TargetPid::new(raw).map_err(|e| e.to_string())
}

/// Perform a shutdown sequence against a process.
///
/// Given a process PID and a sequence of alternating signals and wait
/// durations, morta performs the sequence against the PID until either the
/// process is dead or the sequence has completed.
#[derive(Parser, Debug)]
#[command(name = "morta", version, about, after_help = signal_help())]
#[command(subcommand_negates_reqs = true, args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// PID of the process to shut down
    #[arg(short, long, required = true, value_parser = parse_pid)]
    pid: Option<TargetPid>,

    /// Shutdown sequence to perform against the process (default: from config)
    #[arg(short, long)]
    sequence: Option<String>,

    /// Seconds to sleep between checks that the process is still alive (default: from config)
    #[arg(short = 'z', long, value_parser = clap::value_parser!(u64).range(1..))]
    polling_period: Option<u64>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a JSON report of the run to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Validate arguments and print the resolved settings, don't send any signal
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (every liveness poll)
    #[arg(short, long)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the version number of morta
    Version,
}

/// Settings after merging CLI flags over the config file.
#[derive(Debug, PartialEq, Eq)]
struct Settings {
    pid: TargetPid,
    sequence: String,
    polling_period_secs: u64,
}

impl Settings {
    fn resolve(cli: &Cli) -> Result<Self, CliError> {
        let config = match &cli.config {
            Some(path) => MortaConfig::load(path, true)?,
            None => MortaConfig::load(&PathBuf::from(DEFAULT_CONFIG_FILE), false)?,
        };

        let pid = cli
            .pid
            .ok_or_else(|| CliError::Usage("--pid is required".to_string()))?;
        let sequence = cli
            .sequence
            .clone()
            .or(config.sequencer.sequence)
            .ok_or_else(|| {
                CliError::Usage(
                    "a shutdown sequence is required: pass --sequence or set \
                     sequencer.sequence in the config file"
                        .to_string(),
                )
            })?;
        let polling_period_secs = cli
            .polling_period
            .unwrap_or(config.sequencer.polling_period_secs);

        Ok(Self {
            pid,
            sequence,
            polling_period_secs,
        })
    }

    fn context(&self) -> ExecutionContext {
        ExecutionContext::new(self.pid, Duration::from_secs(self.polling_period_secs))
    }
}

fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayVersion
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => exit_codes::SUCCESS,
                ErrorKind::InvalidValue | ErrorKind::ValueValidation => {
                    exit_codes::INVALID_ARGUMENT
                }
                _ => exit_codes::INVALID_USAGE,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    }
}

fn print_version() {
    println!("morta");
    println!("{}", env!("CARGO_PKG_DESCRIPTION"));
    println!("version {}", env!("CARGO_PKG_VERSION"));
}

fn print_dry_run(settings: &Settings, sequence: &ShutdownSequence) {
    println!("Dry run mode: arguments validated, no signal sent.");
    println!("  pid:            {}", settings.pid);
    println!("  polling period: {}s", settings.polling_period_secs);
    println!("  sequence:       {sequence}");
    for (i, step) in sequence.steps().enumerate() {
        match step {
            Step::Signal { signal } => {
                println!("    {i}: send {signal} ({})", signal.number())
            }
            Step::Wait(wait) => {
                println!("    {i}: wait up to {}s for exit", wait.seconds)
            }
        }
    }
}

async fn run(cli: &Cli, cancel: CancelFlag) -> Result<(), CliError> {
    let settings = Settings::resolve(cli)?;
    let pid = settings.pid.get();
    tracing::info!(
        pid,
        sequence = %settings.sequence,
        polling_period_secs = settings.polling_period_secs,
        "arguments received"
    );

    let sequence = sequence::parse(&settings.sequence)?;
    tracing::info!(
        pid,
        sequence = %sequence,
        steps = sequence.step_count(),
        max_wait_secs = sequence.total_wait().as_secs(),
        "parsed shutdown sequence"
    );

    if cli.dry_run {
        print_dry_run(&settings, &sequence);
        return Ok(());
    }

    let executor = Executor::new(process::System, process::System, clock::TokioClock)
        .with_cancel(cancel);
    let mut sink = LogSink::new(pid);
    let started_at = chrono::Utc::now();
    let outcome = executor
        .execute(&sequence, &settings.context(), &mut sink)
        .await;
    tracing::debug!(
        outcome = outcome.label(),
        success = outcome.is_success(),
        "shutdown sequence finished"
    );

    match &outcome {
        RunOutcome::ProcessExited => {
            tracing::info!(pid, "process is gone, shutdown complete");
        }
        RunOutcome::SequenceExhausted => {
            tracing::warn!(
                pid,
                "shutdown sequence completed without observing the process exit"
            );
        }
        RunOutcome::Failed { cause } => {
            tracing::error!(pid, error = %cause, "shutdown sequence failed");
        }
    }

    if let Some(path) = &cli.report {
        let report = RunReport::new(
            pid,
            &sequence,
            settings.polling_period_secs,
            started_at,
            &outcome,
            sink.into_events(),
        );
        report.write(path)?;
        tracing::debug!(path = %path.display(), "wrote run report");
    }

    match outcome {
        RunOutcome::Failed { cause } => Err(cause.into()),
        RunOutcome::ProcessExited | RunOutcome::SequenceExhausted => Ok(()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = parse_cli();

    if let Some(Command::Version) = cli.command {
        print_version();
        return;
    }

    logging::init(Verbosity::from_flags(cli.verbose, cli.quiet));
    tracing::debug!(?cli, "parsed CLI arguments");

    let cancel = CancelFlag::new();
    if let Err(e) = interrupt::install(cancel.clone()) {
        tracing::warn!(error = %e, "failed to install interrupt handler");
    }

    let code = match run(&cli, cancel).await {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("morta: {e}");
            e.exit_code()
        }
    };
    std::process::exit(code);
}
