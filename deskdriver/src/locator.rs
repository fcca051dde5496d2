use tracing::{debug, info, instrument, warn};

use crate::config::LocatorConfig;
use crate::errors::AutomationError;
use crate::platforms::{AutomationBackend, ChildQuery, SearchScope, SearchSpec, WindowRef};
use regex::Regex;
use std::sync::Arc;

/// Finds the target application's main window, preferring process-scoped searches.
///
/// Process scope bounds the work to one application's windows. The desktop-wide
/// search is the completeness fallback for launches where the visible window is not
/// owned by the process the OS reports (packaged or sandboxed apps).
#[derive(Clone)]
pub struct WindowLocator {
    backend: Arc<dyn AutomationBackend>,
    config: LocatorConfig,
}

impl WindowLocator {
    pub fn new(backend: Arc<dyn AutomationBackend>, config: LocatorConfig) -> Self {
        Self { backend, config }
    }

    /// Two-phase lookup. `Ok(None)` means neither phase found a window.
    #[instrument(level = "debug", skip(self, title_pattern), fields(pattern = %title_pattern))]
    pub fn locate(
        &self,
        executable: &str,
        title_pattern: &Regex,
    ) -> Result<Option<WindowRef>, AutomationError> {
        if let Some(window) = self.locate_in_processes(executable, title_pattern)? {
            return Ok(Some(window));
        }

        info!(
            "Process-scoped search for '{}' found nothing, falling back to desktop search",
            executable
        );
        let spec = SearchSpec::new(title_pattern.clone(), SearchScope::Desktop);
        self.backend
            .find_window(&spec, self.config.desktop_search_timeout())
    }

    /// Phase one only: each PID in enumeration order, first match wins. A failed
    /// enumeration counts as no processes.
    pub fn locate_in_processes(
        &self,
        executable: &str,
        title_pattern: &Regex,
    ) -> Result<Option<WindowRef>, AutomationError> {
        let pids = match self.backend.process_ids(executable) {
            Ok(pids) => pids,
            Err(e) => {
                debug!("Could not enumerate '{}' processes: {}", executable, e);
                return Ok(None);
            }
        };
        debug!("Searching {} process(es) of '{}'", pids.len(), executable);

        for pid in pids {
            let spec = SearchSpec::new(title_pattern.clone(), SearchScope::Process(pid));
            match self.backend.find_window(&spec, self.config.exists_timeout()) {
                Ok(Some(window)) => {
                    debug!("Found '{}' in PID {}", window.title, pid);
                    return Ok(Some(window));
                }
                Ok(None) => continue,
                Err(e) => {
                    debug!("Search in PID {} failed, trying next: {}", pid, e);
                    continue;
                }
            }
        }
        Ok(None)
    }

    /// Probe `window` for the first control matching one of `candidates`, in order.
    ///
    /// Used where a control's type differs between application versions, e.g. an
    /// editing surface exposed as `Document` in newer builds and `Edit` in older ones.
    pub fn resolve_first(
        &self,
        window: &WindowRef,
        candidates: &[ChildQuery],
    ) -> Result<Option<WindowRef>, AutomationError> {
        for candidate in candidates {
            match self
                .backend
                .find_child(window, candidate, self.config.child_probe_timeout())
            {
                Ok(Some(found)) => {
                    debug!("Resolved {} in '{}'", candidate, window.title);
                    return Ok(Some(found));
                }
                Ok(None) => debug!("No {} in '{}'", candidate, window.title),
                Err(e) => warn!("Probe for {} failed: {}", candidate, e),
            }
        }
        Ok(None)
    }
}
