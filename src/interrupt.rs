//! Interrupt handling
//!
//! SIGINT, SIGTERM and SIGHUP all land in the same handler. The first signal
//! only records the request. The workflow notices the flag when the running
//! engine command returns and unwinds, which removes the environment. A
//! second signal exits immediately.

use crate::error::EXIT_INTERRUPTED;
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPT_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Install the process-wide handler for interrupt and termination signals
pub fn install_handler() {
    let result = ctrlc::set_handler(move || {
        if INTERRUPT_REQUESTED.swap(true, Ordering::SeqCst) {
            std::process::exit(i32::from(EXIT_INTERRUPTED));
        }
        eprintln!("\ninterrupt requested, removing the environment...");
    });
    if let Err(e) = result {
        tracing::warn!(error = %e, "failed to install signal handler");
    }
}

/// Handle to an interrupt flag checked between workflow stages
#[derive(Debug, Clone, Copy)]
pub struct Interrupt(&'static AtomicBool);

impl Interrupt {
    /// The flag set by the process-wide handler
    pub fn global() -> Self {
        Self(&INTERRUPT_REQUESTED)
    }

    /// Use a caller-owned flag instead of the global one
    pub fn from_flag(flag: &'static AtomicBool) -> Self {
        Self(flag)
    }

    pub fn requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::global()
    }
}
