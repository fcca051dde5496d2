use super::types::{SharedAutomation, RegisteredElement};
use super::utils::{create_ui_automation_with_com_init, from_control_type, to_control_type};
use super::{input, process};
use crate::platforms::{AutomationBackend, ChildQuery, SearchScope, SearchSpec, WindowRef};
use crate::AutomationError;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, instrument};
use windows::Win32::Foundation::HWND;
use windows::Win32::UI::WindowsAndMessaging::{
    IsIconic, SetForegroundWindow, ShowWindow, SW_RESTORE,
};

// Top-level windows of a process can sit under an intermediate pane
const PROCESS_SEARCH_DEPTH: u32 = 2;
const DESKTOP_SEARCH_DEPTH: u32 = 1;
const CHILD_SEARCH_DEPTH: u32 = 50;

pub struct WindowsBackend {
    automation: SharedAutomation,
    elements: Mutex<HashMap<u64, RegisteredElement>>,
    next_id: AtomicU64,
}

impl WindowsBackend {
    pub fn new() -> Result<Self, AutomationError> {
        let automation = create_ui_automation_with_com_init()?;
        Ok(Self {
            automation: SharedAutomation(Arc::new(automation)),
            elements: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    fn register(
        &self,
        element: uiautomation::UIElement,
    ) -> Result<WindowRef, AutomationError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let window = WindowRef {
            id,
            pid: element.get_process_id().ok(),
            title: element.get_name().unwrap_or_default(),
            native_handle: element.get_native_window_handle().ok().and_then(|handle| {
                let hwnd: HWND = handle.into();
                (!hwnd.0.is_null()).then_some(hwnd.0 as isize)
            }),
            control_type: element.get_control_type().ok().and_then(from_control_type),
        };
        #[allow(clippy::arc_with_non_send_sync)]
        let registered = RegisteredElement(Arc::new(element));
        self.elements
            .lock()
            .map_err(|e| AutomationError::PlatformError(format!("element registry poisoned: {e}")))?
            .insert(id, registered);
        Ok(window)
    }

    fn lookup(&self, window: &WindowRef) -> Result<RegisteredElement, AutomationError> {
        self.elements
            .lock()
            .map_err(|e| AutomationError::PlatformError(format!("element registry poisoned: {e}")))?
            .get(&window.id)
            .cloned()
            .ok_or_else(|| {
                AutomationError::ElementNotFound(format!(
                    "window '{}' is no longer tracked",
                    window.title
                ))
            })
    }
}

impl AutomationBackend for WindowsBackend {
    fn process_ids(&self, executable: &str) -> Result<Vec<u32>, AutomationError> {
        Ok(process::find_process_ids(executable))
    }

    fn launch(&self, executable: &str, args: &[String]) -> Result<u32, AutomationError> {
        process::launch_process(executable, args)
    }

    fn terminate(&self, executable: &str) -> Result<usize, AutomationError> {
        Ok(process::kill_processes(executable))
    }

    #[instrument(level = "debug", skip(self, spec), fields(pattern = %spec.title_pattern))]
    fn find_window(
        &self,
        spec: &SearchSpec,
        timeout: Duration,
    ) -> Result<Option<WindowRef>, AutomationError> {
        let root = self.automation.0.get_root_element()?;
        let title_pattern = spec.title_pattern.clone();
        let scope = spec.scope;

        let mut matcher = self
            .automation
            .0
            .create_matcher()
            .from_ref(&root)
            .filter_fn(Box::new(move |e: &uiautomation::UIElement| {
                if let SearchScope::Process(pid) = scope {
                    match e.get_process_id() {
                        Ok(element_pid) if element_pid == pid => {}
                        _ => return Ok(false),
                    }
                }
                let name = e.get_name().unwrap_or_default();
                Ok(title_pattern.is_match(&name))
            }))
            .depth(match spec.scope {
                SearchScope::Process(_) => PROCESS_SEARCH_DEPTH,
                SearchScope::Desktop => DESKTOP_SEARCH_DEPTH,
            })
            .timeout(timeout.as_millis() as u64);

        if let Some(kind) = spec.control_type {
            matcher = matcher.control_type(to_control_type(kind));
        }

        // The matcher reports "nothing found before timeout" as an error.
        let found = match matcher.find_all() {
            Ok(found) => found,
            Err(e) => {
                debug!("No window matched {:?}: {}", spec.scope, e);
                return Ok(None);
            }
        };

        match found.into_iter().nth(spec.found_index) {
            Some(element) => self.register(element).map(Some),
            None => Ok(None),
        }
    }

    fn find_child(
        &self,
        parent: &WindowRef,
        query: &ChildQuery,
        timeout: Duration,
    ) -> Result<Option<WindowRef>, AutomationError> {
        let parent_element = self.lookup(parent)?;
        let name_pattern = query
            .name_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| AutomationError::invalid(format!("bad name pattern: {e}")))?;

        let matcher = self
            .automation
            .0
            .create_matcher()
            .from_ref(&parent_element.0)
            .control_type(to_control_type(query.control_type))
            .filter_fn(Box::new(move |e: &uiautomation::UIElement| {
                Ok(match &name_pattern {
                    Some(pattern) => pattern.is_match(&e.get_name().unwrap_or_default()),
                    None => true,
                })
            }))
            .depth(CHILD_SEARCH_DEPTH)
            .timeout(timeout.as_millis() as u64);

        match matcher.find_first() {
            Ok(element) => self.register(element).map(Some),
            Err(e) => {
                debug!("No {} under '{}': {}", query, parent.title, e);
                Ok(None)
            }
        }
    }

    fn set_focus(&self, window: &WindowRef) -> Result<(), AutomationError> {
        let element = self.lookup(window)?;
        element.0.set_focus().map_err(|e| {
            AutomationError::Transient(format!("Failed to set focus on '{}': {e}", window.title))
        })
    }

    fn restore_window(&self, native_handle: isize) -> Result<(), AutomationError> {
        let hwnd = HWND(native_handle as *mut std::ffi::c_void);
        unsafe {
            if IsIconic(hwnd).as_bool() {
                debug!("Window is minimized, restoring it");
                let _ = ShowWindow(hwnd, SW_RESTORE);
            }
        }
        Ok(())
    }

    fn set_foreground(&self, native_handle: isize) -> Result<(), AutomationError> {
        let hwnd = HWND(native_handle as *mut std::ffi::c_void);
        let result = unsafe { SetForegroundWindow(hwnd) };
        if result.as_bool() {
            Ok(())
        } else {
            Err(AutomationError::Transient(
                "SetForegroundWindow was refused".to_string(),
            ))
        }
    }

    fn send_keys(&self, keys: &str) -> Result<(), AutomationError> {
        input::send_keys(keys)
    }

    fn send_text(&self, text: &str, with_spaces: bool) -> Result<(), AutomationError> {
        input::send_text(text, with_spaces)
    }

    fn release(&self, window: &WindowRef) {
        if let Ok(mut elements) = self.elements.lock() {
            elements.remove(&window.id);
        }
    }
}
