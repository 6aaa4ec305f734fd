use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPT_REQUESTED: AtomicBool = AtomicBool::new(false);
static FOREGROUND_CHILD: AtomicBool = AtomicBool::new(false);

/// Record Ctrl-C instead of dying, so a running pip child can finish
/// unwinding and the caller can skip the lock file write.
///
/// While an interactive child (`run`, `shell`) is in the foreground the
/// signal is left to the child and pipf does nothing.
pub fn install_signal_handler() {
    let _ = ctrlc::set_handler(move || {
        if record_interrupt(&INTERRUPT_REQUESTED, &FOREGROUND_CHILD) {
            eprintln!("\ninterrupt received, stopping after the current step...");
        }
    });
}

pub fn interrupt_requested() -> bool {
    INTERRUPT_REQUESTED.load(Ordering::SeqCst)
}

pub(crate) fn interrupt_flag() -> &'static AtomicBool {
    &INTERRUPT_REQUESTED
}

/// Returns true the first time an interrupt is recorded.
fn record_interrupt(requested: &AtomicBool, foreground_child: &AtomicBool) -> bool {
    if foreground_child.load(Ordering::SeqCst) {
        return false;
    }
    !requested.swap(true, Ordering::SeqCst)
}

/// Hands Ctrl-C to an interactive child until dropped.
pub(crate) struct ForegroundChild(());

impl ForegroundChild {
    pub(crate) fn enter() -> Self {
        FOREGROUND_CHILD.store(true, Ordering::SeqCst);
        Self(())
    }
}

impl Drop for ForegroundChild {
    fn drop(&mut self) {
        FOREGROUND_CHILD.store(false, Ordering::SeqCst);
    }
}
