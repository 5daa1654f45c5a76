/// Symbolic signal names accepted in a shutdown sequence.
///
/// The set is fixed and case-sensitive. Each name maps to one POSIX signal;
/// `iot` is kept as its own name even though it shares `abrt`'s number.
use nix::sys::signal::Signal;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Abrt,
    Alrm,
    Bus,
    Chld,
    Cont,
    Fpe,
    Hup,
    Ill,
    Int,
    Io,
    Iot,
    Kill,
    Pipe,
    Prof,
    Quit,
    Segv,
    Stop,
    Sys,
    Term,
    Trap,
    Tstp,
    Ttin,
    Ttou,
    Urg,
    Usr1,
    Usr2,
    Vtalrm,
    Winch,
    Xcpu,
    Xfsz,
}

/// Name lookup table, in the order names are listed to users.
static TABLE: [(&str, SignalKind); 30] = [
    ("abrt", SignalKind::Abrt),
    ("alrm", SignalKind::Alrm),
    ("bus", SignalKind::Bus),
    ("chld", SignalKind::Chld),
    ("cont", SignalKind::Cont),
    ("fpe", SignalKind::Fpe),
    ("hup", SignalKind::Hup),
    ("ill", SignalKind::Ill),
    ("int", SignalKind::Int),
    ("io", SignalKind::Io),
    ("iot", SignalKind::Iot),
    ("kill", SignalKind::Kill),
    ("pipe", SignalKind::Pipe),
    ("prof", SignalKind::Prof),
    ("quit", SignalKind::Quit),
    ("segv", SignalKind::Segv),
    ("stop", SignalKind::Stop),
    ("sys", SignalKind::Sys),
    ("term", SignalKind::Term),
    ("trap", SignalKind::Trap),
    ("tstp", SignalKind::Tstp),
    ("ttin", SignalKind::Ttin),
    ("ttou", SignalKind::Ttou),
    ("urg", SignalKind::Urg),
    ("usr1", SignalKind::Usr1),
    ("usr2", SignalKind::Usr2),
    ("vtalrm", SignalKind::Vtalrm),
    ("winch", SignalKind::Winch),
    ("xcpu", SignalKind::Xcpu),
    ("xfsz", SignalKind::Xfsz),
];

impl SignalKind {
    /// Look up a signal by its table name. Returns `None` for anything not in the table.
    pub fn from_name(name: &str) -> Option<Self> {
        TABLE
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, kind)| *kind)
    }

    /// The name this signal is written as in a sequence (e.g. `term`).
    pub fn name(self) -> &'static str {
        TABLE
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(name, _)| *name)
            .unwrap_or("?")
    }

    /// All accepted names, in table order.
    pub fn names() -> impl Iterator<Item = &'static str> {
        TABLE.iter().map(|(name, _)| *name)
    }

    /// The OS signal delivered for this name.
    pub fn to_nix(self) -> Signal {
        match self {
            SignalKind::Abrt | SignalKind::Iot => Signal::SIGABRT,
            SignalKind::Alrm => Signal::SIGALRM,
            SignalKind::Bus => Signal::SIGBUS,
            SignalKind::Chld => Signal::SIGCHLD,
            SignalKind::Cont => Signal::SIGCONT,
            SignalKind::Fpe => Signal::SIGFPE,
            SignalKind::Hup => Signal::SIGHUP,
            SignalKind::Ill => Signal::SIGILL,
            SignalKind::Int => Signal::SIGINT,
            SignalKind::Io => Signal::SIGIO,
            SignalKind::Kill => Signal::SIGKILL,
            SignalKind::Pipe => Signal::SIGPIPE,
            SignalKind::Prof => Signal::SIGPROF,
            SignalKind::Quit => Signal::SIGQUIT,
            SignalKind::Segv => Signal::SIGSEGV,
            SignalKind::Stop => Signal::SIGSTOP,
            SignalKind::Sys => Signal::SIGSYS,
            SignalKind::Term => Signal::SIGTERM,
            SignalKind::Trap => Signal::SIGTRAP,
            SignalKind::Tstp => Signal::SIGTSTP,
            SignalKind::Ttin => Signal::SIGTTIN,
            SignalKind::Ttou => Signal::SIGTTOU,
            SignalKind::Urg => Signal::SIGURG,
            SignalKind::Usr1 => Signal::SIGUSR1,
            SignalKind::Usr2 => Signal::SIGUSR2,
            SignalKind::Vtalrm => Signal::SIGVTALRM,
            SignalKind::Winch => Signal::SIGWINCH,
            SignalKind::Xcpu => Signal::SIGXCPU,
            SignalKind::Xfsz => Signal::SIGXFSZ,
        }
    }

    /// Numeric OS value of the signal.
    pub fn number(self) -> i32 {
        self.to_nix() as i32
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for a name that is not in the signal table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown signal name {0:?}")]
pub struct UnknownSignalName(pub String);

impl FromStr for SignalKind {
    type Err = UnknownSignalName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignalKind::from_name(s).ok_or_else(|| UnknownSignalName(s.to_string()))
    }
}
