use crate::config::RetryPolicy;
use crate::errors::AutomationError;
use crate::platforms::{AutomationBackend, WindowRef};
use crate::timing::{Phase, Sleeper, TimingProfile};
use std::sync::Arc;
use tracing::{debug, warn};

/// Gives a window input focus so synthetic keystrokes land in it.
///
/// Each attempt asks the accessibility layer for focus first, then falls back to
/// restore + set-foreground on the native handle. Attempts are separated by the
/// policy's retry delay.
#[derive(Clone)]
pub struct Activator {
    backend: Arc<dyn AutomationBackend>,
    timing: TimingProfile,
    sleeper: Arc<dyn Sleeper>,
}

impl Activator {
    pub fn new(
        backend: Arc<dyn AutomationBackend>,
        timing: TimingProfile,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            backend,
            timing,
            sleeper,
        }
    }

    /// Returns the number of the attempt that succeeded, or `ActivationExhausted`.
    pub fn activate(
        &self,
        window: &WindowRef,
        policy: &RetryPolicy,
    ) -> Result<u32, AutomationError> {
        let settle = self.timing.get(Phase::WindowActivation);

        for attempt in 1..=policy.max_retries {
            match self.backend.set_focus(window) {
                Ok(()) => {
                    self.sleeper.sleep(settle);
                    return Ok(attempt);
                }
                Err(e) => debug!("set_focus failed on attempt {}: {}; trying OS fallback", attempt, e),
            }

            match self.os_fallback(window) {
                Ok(()) => return Ok(attempt),
                Err(e) => debug!("OS fallback failed on attempt {}: {}", attempt, e),
            }

            if attempt < policy.max_retries {
                self.sleeper.sleep(policy.retry_delay());
            }
        }

        warn!(
            "Window '{}' could not be activated after {} attempts",
            window.title, policy.max_retries
        );
        Err(AutomationError::ActivationExhausted {
            attempts: policy.max_retries,
        })
    }

    fn os_fallback(&self, window: &WindowRef) -> Result<(), AutomationError> {
        let handle = window.native_handle.ok_or_else(|| {
            AutomationError::ElementNotFound(format!("'{}' has no native handle", window.title))
        })?;
        let settle = self.timing.get(Phase::WindowActivation);

        self.backend.restore_window(handle)?;
        self.sleeper.sleep(settle);
        self.backend.set_foreground(handle)?;
        self.sleeper.sleep(settle);
        Ok(())
    }
}
