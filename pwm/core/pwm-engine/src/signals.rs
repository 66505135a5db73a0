//! Termination signals.
//!
//! The handler only stores into an atomic. The caller notices the latch,
//! leaves its loop, and the engine's `Drop` does the actual teardown.

use nix::errno::Errno;
use nix::libc::c_int;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use std::sync::atomic::{AtomicBool, Ordering};

/// Signals that latch termination.
pub const TERMINATION_SIGNALS: [Signal; 4] = [
    Signal::SIGINT,
    Signal::SIGTERM,
    Signal::SIGHUP,
    Signal::SIGQUIT,
];

static TERMINATE: AtomicBool = AtomicBool::new(false);

extern "C" fn on_termination(_signal: c_int) {
    TERMINATE.store(true, Ordering::SeqCst);
}

/// Handle to the process-wide termination flag.
#[derive(Copy, Clone, Debug)]
pub struct TerminationLatch {
    flag: &'static AtomicBool,
}

impl TerminationLatch {
    /// Whether a termination signal arrived (or [`set`](Self::set) was called).
    #[must_use]
    pub fn is_set(self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Latch termination from ordinary code, e.g. on a `quit` command.
    pub fn set(self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// Install the handler for every signal in [`TERMINATION_SIGNALS`].
///
/// # Errors
/// The [`Errno`] of the first `sigaction` call that fails.
pub fn install_termination_latch() -> Result<TerminationLatch, Errno> {
    let action = SigAction::new(
        SigHandler::Handler(on_termination),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    for signal in TERMINATION_SIGNALS {
        // SAFETY: the handler only performs an atomic store.
        unsafe { sigaction(signal, &action) }?;
    }
    log::debug!("termination handlers installed");
    Ok(TerminationLatch { flag: &TERMINATE })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::raise;

    #[test]
    fn raised_signal_sets_latch() {
        let latch = install_termination_latch().unwrap();
        raise(Signal::SIGHUP).unwrap();
        assert!(latch.is_set());
    }
}
