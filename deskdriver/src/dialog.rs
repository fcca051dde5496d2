use crate::commands::{CommandPlan, PlanExecutor};
use crate::errors::AutomationError;
use crate::platforms::{AutomationBackend, SearchScope, SearchSpec};
use crate::timing::{Phase, Sleeper, TimingProfile};
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// What a dialog wait ended with. Both are successes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DialogOutcome {
    /// A dialog matched `patterns[pattern_index]` and the response key was sent.
    Handled { pattern_index: usize, title: String },
    /// Nothing appeared before the timeout; the operation completed without prompting.
    NotShown,
}

impl DialogOutcome {
    pub fn was_handled(&self) -> bool {
        matches!(self, DialogOutcome::Handled { .. })
    }
}

/// Polls the desktop for one of several expected transient dialogs and answers it.
#[derive(Clone)]
pub struct DialogWatcher {
    backend: Arc<dyn AutomationBackend>,
    timing: TimingProfile,
    sleeper: Arc<dyn Sleeper>,
    executor: PlanExecutor,
}

impl DialogWatcher {
    pub fn new(
        backend: Arc<dyn AutomationBackend>,
        timing: TimingProfile,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let executor = PlanExecutor::new(backend.clone(), timing.clone(), sleeper.clone());
        Self {
            backend,
            timing,
            sleeper,
            executor,
        }
    }

    /// Wait up to `timeout` for a window whose title contains a match for one of
    /// `patterns`. Patterns are tried in order on every tick; the first match wins.
    #[instrument(level = "debug", skip(self, patterns, cancel))]
    pub fn handle_dialog<S: AsRef<str>>(
        &self,
        patterns: &[S],
        response_key: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<DialogOutcome, AutomationError> {
        let compiled = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| {
                    AutomationError::invalid(format!("bad dialog pattern '{}': {e}", p.as_ref()))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let interval = self.timing.get(Phase::DialogCheckInterval);
        let started = Instant::now();
        debug!("Waiting up to {:?} for dialog, {} pattern(s)", timeout, compiled.len());

        loop {
            if cancel.is_cancelled() {
                return Err(AutomationError::Cancelled("dialog wait".to_string()));
            }

            for (pattern_index, pattern) in compiled.iter().enumerate() {
                let spec = SearchSpec::new(pattern.clone(), SearchScope::Desktop);
                let found = self.backend.find_window(&spec, Duration::ZERO).map_err(|e| {
                    AutomationError::Transient(format!("dialog poll failed: {e}"))
                })?;
                if let Some(dialog) = found {
                    info!("Dialog '{}' matched pattern {}", dialog.title, pattern);
                    // The response is sent to the focused window, not to this element.
                    self.backend.release(&dialog);
                    self.executor.execute(&CommandPlan::dialog_response(response_key))?;
                    return Ok(DialogOutcome::Handled {
                        pattern_index,
                        title: dialog.title,
                    });
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                debug!("No dialog detected within {:?}", timeout);
                return Ok(DialogOutcome::NotShown);
            }
            self.sleeper.sleep(interval.min(timeout - elapsed));
        }
    }
}
