use crate::executor::{StepEvent, TraceSink};
use tracing_subscriber::EnvFilter;

/// Log verbosity selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (true, _) => Verbosity::Verbose,
            (false, true) => Verbosity::Quiet,
            (false, false) => Verbosity::Normal,
        }
    }

    fn default_filter(self) -> &'static str {
        match self {
            Verbosity::Quiet => "morta=warn",
            Verbosity::Normal => "morta=info",
            Verbosity::Verbose => "morta=debug",
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the verbosity flags.
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Renders executor events as log lines while also keeping them for the report.
pub struct LogSink {
    pid: i32,
    events: Vec<StepEvent>,
}

impl LogSink {
    pub fn new(pid: i32) -> Self {
        Self {
            pid,
            events: Vec::new(),
        }
    }

    pub fn into_events(self) -> Vec<StepEvent> {
        self.events
    }
}

impl TraceSink for LogSink {
    fn record(&mut self, event: StepEvent) {
        let pid = self.pid;
        match &event {
            StepEvent::SignalSent { step, signal } => {
                tracing::info!(pid, step, %signal, "sent signal to process");
            }
            StepEvent::ProcessGone { step, signal } => {
                tracing::info!(pid, step, %signal, "process no longer exists");
            }
            StepEvent::DeliveryFailed {
                step,
                signal,
                error,
            } => {
                tracing::error!(pid, step, %signal, %error, "failed to send signal to process");
            }
            StepEvent::WaitStarted { step, seconds } => {
                tracing::info!(pid, step, seconds, "waiting for process to exit");
            }
            StepEvent::StillAlive { step, elapsed_ms } => {
                tracing::debug!(pid, step, elapsed_ms, "process still alive, polling");
            }
            StepEvent::WaitExpired { step, seconds } => {
                tracing::info!(pid, step, seconds, "process still alive after wait");
            }
            StepEvent::ProcessExited { step, elapsed_ms } => {
                tracing::info!(pid, step, elapsed_ms, "process has exited");
            }
            StepEvent::LivenessFailed { step, error } => {
                tracing::error!(pid, step, %error, "failed to check whether process exists");
            }
            StepEvent::Interrupted { step } => {
                tracing::warn!(pid, step, "shutdown sequence interrupted");
            }
        }
        self.events.push(event);
    }
}
