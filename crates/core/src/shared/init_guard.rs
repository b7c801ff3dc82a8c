use std::sync::OnceLock;

use crate::shared::error::StreamError;

/// Runs a library's process-wide setup exactly once.
///
/// Declared as a `static` next to the backend it guards. The outcome of the
/// first run is cached: later callers get the same success or the same
/// failure without running setup again, including when several threads
/// race on first use.
pub struct InitGuard {
    outcome: OnceLock<Result<(), String>>,
}

impl InitGuard {
    pub const fn new() -> Self {
        Self {
            outcome: OnceLock::new(),
        }
    }

    pub fn run<F>(&self, setup: F) -> Result<(), StreamError>
    where
        F: FnOnce() -> Result<(), String>,
    {
        self.outcome
            .get_or_init(|| {
                log::debug!("initialising media library");
                setup()
            })
            .clone()
            .map_err(|e| StreamError::Config(format!("library initialisation failed: {e}")))
    }

    pub fn is_initialised(&self) -> bool {
        matches!(self.outcome.get(), Some(Ok(())))
    }
}

impl Default for InitGuard {
    fn default() -> Self {
        Self::new()
    }
}
