/// Runs a parsed shutdown sequence against one process.
///
/// Signal steps deliver a signal; wait steps poll for the process to disappear
/// until their deadline passes. The run stops as soon as the process is seen
/// to be gone, on the first hard OS error, or when the sequence runs out.
///
/// Liveness polling is a check-then-act approximation: the process may exit
/// between a poll and the next signal. A faster polling period narrows that
/// window but cannot close it; the next step simply observes the exit.
use crate::clock::Clock;
use crate::interrupt::CancelFlag;
use crate::process::{DeliveryError, LivenessProbe, SignalSender, TargetPid};
use crate::sequence::{ShutdownSequence, Step, WaitStep};
use crate::signal::SignalKind;
use nix::errno::Errno;
use serde::Serialize;
use std::time::Duration;

/// Read-only parameters for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    pub target_pid: TargetPid,
    /// Sleep between liveness checks during a wait step.
    pub polling_period: Duration,
}

impl ExecutionContext {
    pub fn new(target_pid: TargetPid, polling_period: Duration) -> Self {
        Self {
            target_pid,
            polling_period,
        }
    }
}

/// Fatal errors that abort a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("failed to send signal {signal} to process {pid}: {source}")]
    Delivery {
        pid: i32,
        signal: SignalKind,
        source: Errno,
    },

    #[error("failed to determine whether process {pid} still exists: {source}")]
    Liveness { pid: i32, source: Errno },

    #[error("shutdown sequence interrupted")]
    Interrupted,
}

/// Terminal result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The process was observed to be gone.
    ProcessExited,
    /// Every step ran and the process was never observed to exit.
    SequenceExhausted,
    /// A hard error stopped the run early.
    Failed { cause: ExecutionError },
}

impl RunOutcome {
    /// Both non-failure outcomes count as success for the caller.
    pub fn is_success(&self) -> bool {
        !matches!(self, RunOutcome::Failed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::ProcessExited => "process_exited",
            RunOutcome::SequenceExhausted => "sequence_exhausted",
            RunOutcome::Failed { .. } => "failed",
        }
    }
}

/// Something that happened while running a step. `step` is the 0-based
/// position in the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StepEvent {
    SignalSent {
        step: usize,
        signal: SignalKind,
    },
    /// Delivery reported that the process no longer exists.
    ProcessGone {
        step: usize,
        signal: SignalKind,
    },
    DeliveryFailed {
        step: usize,
        signal: SignalKind,
        error: String,
    },
    WaitStarted {
        step: usize,
        seconds: u32,
    },
    StillAlive {
        step: usize,
        elapsed_ms: u64,
    },
    WaitExpired {
        step: usize,
        seconds: u32,
    },
    /// A liveness poll found the process gone.
    ProcessExited {
        step: usize,
        elapsed_ms: u64,
    },
    LivenessFailed {
        step: usize,
        error: String,
    },
    Interrupted {
        step: usize,
    },
}

/// Receives step events as they happen.
pub trait TraceSink {
    fn record(&mut self, event: StepEvent);
}

impl TraceSink for Vec<StepEvent> {
    fn record(&mut self, event: StepEvent) {
        self.push(event);
    }
}

/// Whether the run continues after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Next,
    ProcessGone,
}

/// Sequence executor over pluggable OS collaborators.
pub struct Executor<S, P, C> {
    sender: S,
    probe: P,
    clock: C,
    cancel: Option<CancelFlag>,
}

impl<S, P, C> Executor<S, P, C>
where
    S: SignalSender,
    P: LivenessProbe,
    C: Clock,
{
    pub fn new(sender: S, probe: P, clock: C) -> Self {
        Self {
            sender,
            probe,
            clock,
            cancel: None,
        }
    }

    /// Stop the run at the next step or poll once `flag` is set.
    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Run every step in order until the process is gone, a step fails,
    /// or the sequence is exhausted.
    pub async fn execute(
        &self,
        sequence: &ShutdownSequence,
        ctx: &ExecutionContext,
        sink: &mut impl TraceSink,
    ) -> RunOutcome {
        match self.run(sequence, ctx, sink).await {
            Ok(Flow::ProcessGone) => RunOutcome::ProcessExited,
            Ok(Flow::Next) => RunOutcome::SequenceExhausted,
            Err(cause) => RunOutcome::Failed { cause },
        }
    }

    async fn run(
        &self,
        sequence: &ShutdownSequence,
        ctx: &ExecutionContext,
        sink: &mut impl TraceSink,
    ) -> Result<Flow, ExecutionError> {
        for (step, instruction) in sequence.steps().enumerate() {
            self.check_cancel(step, sink)?;
            let flow = match instruction {
                Step::Signal { signal } => self.deliver(step, signal, ctx, sink)?,
                Step::Wait(wait) => self.wait(step, wait, ctx, sink).await?,
            };
            if flow == Flow::ProcessGone {
                return Ok(Flow::ProcessGone);
            }
        }
        Ok(Flow::Next)
    }

    fn deliver(
        &self,
        step: usize,
        signal: SignalKind,
        ctx: &ExecutionContext,
        sink: &mut impl TraceSink,
    ) -> Result<Flow, ExecutionError> {
        match self.sender.send_signal(ctx.target_pid, signal) {
            Ok(()) => {
                sink.record(StepEvent::SignalSent { step, signal });
                Ok(Flow::Next)
            }
            Err(DeliveryError::NoSuchProcess) => {
                sink.record(StepEvent::ProcessGone { step, signal });
                Ok(Flow::ProcessGone)
            }
            Err(DeliveryError::Os(source)) => {
                sink.record(StepEvent::DeliveryFailed {
                    step,
                    signal,
                    error: source.to_string(),
                });
                Err(ExecutionError::Delivery {
                    pid: ctx.target_pid.get(),
                    signal,
                    source,
                })
            }
        }
    }

    /// Poll until the process is gone or the deadline passes. A zero-second
    /// wait polls exactly once without sleeping.
    async fn wait(
        &self,
        step: usize,
        wait: WaitStep,
        ctx: &ExecutionContext,
        sink: &mut impl TraceSink,
    ) -> Result<Flow, ExecutionError> {
        let start = self.clock.now();
        let deadline = start + wait.duration();
        sink.record(StepEvent::WaitStarted {
            step,
            seconds: wait.seconds,
        });

        loop {
            let exists = match self.probe.process_exists(ctx.target_pid) {
                Ok(exists) => exists,
                Err(source) => {
                    sink.record(StepEvent::LivenessFailed {
                        step,
                        error: source.to_string(),
                    });
                    return Err(ExecutionError::Liveness {
                        pid: ctx.target_pid.get(),
                        source,
                    });
                }
            };

            let now = self.clock.now();
            let elapsed_ms = millis(now.saturating_duration_since(start));
            if !exists {
                sink.record(StepEvent::ProcessExited { step, elapsed_ms });
                return Ok(Flow::ProcessGone);
            }
            if now >= deadline {
                sink.record(StepEvent::WaitExpired {
                    step,
                    seconds: wait.seconds,
                });
                return Ok(Flow::Next);
            }

            sink.record(StepEvent::StillAlive { step, elapsed_ms });
            self.clock.sleep(ctx.polling_period).await;
            self.check_cancel(step, sink)?;
        }
    }

    fn check_cancel(&self, step: usize, sink: &mut impl TraceSink) -> Result<(), ExecutionError> {
        match &self.cancel {
            Some(flag) if flag.is_cancelled() => {
                sink.record(StepEvent::Interrupted { step });
                Err(ExecutionError::Interrupted)
            }
            _ => Ok(()),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
