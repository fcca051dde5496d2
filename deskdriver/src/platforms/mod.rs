use crate::AutomationError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Backend-neutral control types the driver searches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Window,
    Pane,
    Document,
    Edit,
    MenuBar,
    MenuItem,
    Button,
}

impl std::str::FromStr for ControlKind {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "window" | "dialog" => Ok(ControlKind::Window),
            "pane" => Ok(ControlKind::Pane),
            "document" => Ok(ControlKind::Document),
            "edit" => Ok(ControlKind::Edit),
            "menubar" => Ok(ControlKind::MenuBar),
            "menuitem" => Ok(ControlKind::MenuItem),
            "button" => Ok(ControlKind::Button),
            other => Err(AutomationError::invalid(format!(
                "unknown control type '{other}'"
            ))),
        }
    }
}

/// Where a window search looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Only windows owned by one process.
    Process(u32),
    /// Every top-level window on the system. Only used once process scope is exhausted.
    Desktop,
}

/// A window query: title regex, optional control type, scope and ordinal of the match.
#[derive(Debug, Clone)]
pub struct SearchSpec {
    pub title_pattern: Regex,
    pub control_type: Option<ControlKind>,
    pub scope: SearchScope,
    pub found_index: usize,
}

impl SearchSpec {
    pub fn new(title_pattern: Regex, scope: SearchScope) -> Self {
        Self {
            title_pattern,
            control_type: None,
            scope,
            found_index: 0,
        }
    }

    pub fn control_type(mut self, kind: ControlKind) -> Self {
        self.control_type = Some(kind);
        self
    }

    pub fn found_index(mut self, index: usize) -> Self {
        self.found_index = index;
        self
    }
}

/// A probe for a control inside an already-located window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildQuery {
    pub control_type: ControlKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_pattern: Option<String>,
}

impl ChildQuery {
    pub fn of(control_type: ControlKind) -> Self {
        Self {
            control_type,
            name_pattern: None,
        }
    }

    /// Restrict the match to controls whose name matches `pattern`.
    pub fn named(mut self, pattern: &str) -> Self {
        self.name_pattern = Some(pattern.to_string());
        self
    }
}

impl std::fmt::Display for ChildQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name_pattern {
            Some(name) => write!(f, "{:?}|{}", self.control_type, name),
            None => write!(f, "{:?}", self.control_type),
        }
    }
}

/// A live query result into the OS UI tree.
///
/// The `id` is only meaningful to the backend that produced it. Handles are never
/// kept across an activation failure; the driver re-resolves instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowRef {
    pub id: u64,
    pub pid: Option<u32>,
    pub title: String,
    pub native_handle: Option<isize>,
    pub control_type: Option<ControlKind>,
}

/// The OS surface the driver consumes. Every call is blocking.
pub trait AutomationBackend: Send + Sync {
    /// Process IDs whose executable name matches `executable` (case-insensitive), in
    /// enumeration order.
    fn process_ids(&self, executable: &str) -> Result<Vec<u32>, AutomationError>;

    /// Start `executable` with `args`, returning the new process ID.
    fn launch(&self, executable: &str, args: &[String]) -> Result<u32, AutomationError>;

    /// Kill every process named `executable`. Returns how many were signalled.
    fn terminate(&self, executable: &str) -> Result<usize, AutomationError>;

    /// Search for a window. `Ok(None)` means nothing matched before `timeout`.
    fn find_window(
        &self,
        spec: &SearchSpec,
        timeout: Duration,
    ) -> Result<Option<WindowRef>, AutomationError>;

    /// Search the descendants of `parent` for the first control matching `query`.
    fn find_child(
        &self,
        parent: &WindowRef,
        query: &ChildQuery,
        timeout: Duration,
    ) -> Result<Option<WindowRef>, AutomationError>;

    /// Ask the accessibility layer to focus the element.
    fn set_focus(&self, window: &WindowRef) -> Result<(), AutomationError>;

    /// Restore a minimized top-level window.
    fn restore_window(&self, native_handle: isize) -> Result<(), AutomationError>;

    /// Make the window the foreground window.
    fn set_foreground(&self, native_handle: isize) -> Result<(), AutomationError>;

    /// Dispatch a key chord sequence in send-keys syntax (`^s`, `{ENTER}`, `%`).
    fn send_keys(&self, keys: &str) -> Result<(), AutomationError>;

    /// Type `text` literally. Spaces are dropped unless `with_spaces` is set.
    fn send_text(&self, text: &str, with_spaces: bool) -> Result<(), AutomationError>;

    /// Drop any backend state held for `window`.
    fn release(&self, _window: &WindowRef) {}
}

#[cfg(target_os = "windows")]
pub mod windows;

/// Create the appropriate backend for the current platform
pub fn create_backend() -> Result<Arc<dyn AutomationBackend>, AutomationError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Arc::new(windows::WindowsBackend::new()?))
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(AutomationError::UnsupportedPlatform(
            "keyboard-driven desktop automation is only implemented for Windows".to_string(),
        ))
    }
}
