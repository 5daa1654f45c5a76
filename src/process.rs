/// OS-facing collaborators: deliver a signal to a PID and ask whether a PID is alive.
///
/// Both are traits so the executor can be driven by scripted fakes in tests.
/// `System` is the real implementation on top of `kill(2)`.
use crate::signal::SignalKind;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::fmt;

/// A PID that names exactly one process.
///
/// `kill(2)` treats 0 and negative values as process groups or "every process
/// we may signal", so those never reach the OS through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetPid(i32);

/// Rejected PID value: zero or negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("pid must be a positive integer, got {0}")]
pub struct InvalidPid(pub i32);

impl TargetPid {
    pub fn new(raw: i32) -> Result<Self, InvalidPid> {
        if raw > 0 {
            Ok(Self(raw))
        } else {
            Err(InvalidPid(raw))
        }
    }

    pub fn get(self) -> i32 {
        self.0
    }

    fn as_nix(self) -> Pid {
        Pid::from_raw(self.0)
    }
}

impl TryFrom<i32> for TargetPid {
    type Error = InvalidPid;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl fmt::Display for TargetPid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a signal could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The target PID does not exist (ESRCH).
    #[error("no such process")]
    NoSuchProcess,
    /// Anything else: permission denied, invalid signal, ...
    #[error("{0}")]
    Os(Errno),
}

impl From<Errno> for DeliveryError {
    fn from(errno: Errno) -> Self {
        match errno {
            Errno::ESRCH => DeliveryError::NoSuchProcess,
            other => DeliveryError::Os(other),
        }
    }
}

/// Delivers signals to processes.
pub trait SignalSender {
    fn send_signal(&self, pid: TargetPid, signal: SignalKind) -> Result<(), DeliveryError>;
}

/// Reports whether a process is still around.
pub trait LivenessProbe {
    fn process_exists(&self, pid: TargetPid) -> Result<bool, Errno>;
}

/// Real signal delivery and liveness checks against the running OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct System;

impl SignalSender for System {
    fn send_signal(&self, pid: TargetPid, signal: SignalKind) -> Result<(), DeliveryError> {
        kill(pid.as_nix(), signal.to_nix()).map_err(DeliveryError::from)
    }
}

impl LivenessProbe for System {
    /// Probe with the null signal. EPERM still means the PID is in use,
    /// just not by a process we may signal.
    fn process_exists(&self, pid: TargetPid) -> Result<bool, Errno> {
        match kill(pid.as_nix(), None) {
            Ok(()) | Err(Errno::EPERM) => Ok(!is_zombie(pid)),
            Err(Errno::ESRCH) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// A zombie has already exited and only waits for its parent to reap it.
#[cfg(target_os = "linux")]
fn is_zombie(pid: TargetPid) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    // The command name is parenthesised and may itself contain ") ".
    stat.rsplit_once(") ")
        .and_then(|(_, rest)| rest.chars().next())
        .is_some_and(|state| state == 'Z')
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: TargetPid) -> bool {
    false
}
