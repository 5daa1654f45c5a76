/// Operator interrupt handling for the sequencer itself.
///
/// The first SIGINT (Ctrl-C) or SIGTERM sent to morta sets a shared flag. The
/// executor checks the flag at every step and every poll, so an interrupted
/// run stops at the next boundary; an in-progress sleep is not cut short.
/// A second SIGINT or SIGTERM exits the process at once with
/// `exit_codes::INTERRUPTED`, without waiting for that boundary.
use crate::error::exit_codes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind as UnixSignalKind};

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Install SIGINT/SIGTERM listeners for the lifetime of the process.
///
/// Must be called from within a tokio runtime.
pub fn install(flag: CancelFlag) -> std::io::Result<()> {
    install_with(flag, || std::process::exit(exit_codes::INTERRUPTED))
}

/// Like [`install`], but runs `force` instead of exiting on the second signal.
fn install_with<F>(flag: CancelFlag, force: F) -> std::io::Result<()>
where
    F: FnOnce() + Send + 'static,
{
    let mut sigint = signal(UnixSignalKind::interrupt())?;
    let mut sigterm = signal(UnixSignalKind::terminate())?;

    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                _ = sigint.recv() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
            };
            if !flag.is_cancelled() {
                tracing::warn!(
                    signal = received,
                    "interrupt received, stopping after the current poll; repeat to exit now"
                );
                flag.cancel();
                continue;
            }
            tracing::warn!(
                signal = received,
                exit_code = exit_codes::INTERRUPTED,
                "second interrupt received, exiting immediately"
            );
            force();
            break;
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::{raise, Signal};
    use std::time::Duration;

    /// Yield to the listener task until `cond` holds, or give up after 5s.
    async fn wait_until(cond: impl Fn() -> bool) -> bool {
        for _ in 0..500 {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cond()
    }

    #[test]
    fn test_flag_starts_clear() {
        assert!(!CancelFlag::new().is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        other.cancel();
        assert!(flag.is_cancelled());
    }

    #[tokio::test]
    async fn test_install_succeeds_inside_runtime() {
        install_with(CancelFlag::new(), || {}).unwrap();
    }

    #[tokio::test]
    async fn test_raised_sigint_sets_flag() {
        let flag = CancelFlag::new();
        install_with(flag.clone(), || {}).unwrap();
        assert!(!flag.is_cancelled());

        raise(Signal::SIGINT).unwrap();

        assert!(wait_until(|| flag.is_cancelled()).await);
    }

    #[tokio::test]
    async fn test_second_signal_forces_exit() {
        let flag = CancelFlag::new();
        let forced = CancelFlag::new();
        let on_force = forced.clone();
        install_with(flag.clone(), move || on_force.cancel()).unwrap();

        raise(Signal::SIGTERM).unwrap();
        assert!(wait_until(|| flag.is_cancelled()).await);

        // Raised separately: back-to-back signals may be coalesced.
        raise(Signal::SIGINT).unwrap();
        assert!(wait_until(|| forced.is_cancelled()).await);
    }
}
