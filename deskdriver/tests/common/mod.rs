//! Scripted in-memory backend shared by the integration tests.
//!
//! Every call the driver makes (searches, focus requests, keystrokes and settle
//! waits) is appended to one ordered event log so tests can assert on exact
//! sequences.

#![allow(dead_code)]

use deskdriver::config::DriverConfig;
use deskdriver::platforms::{
    AutomationBackend, ChildQuery, ControlKind, SearchScope, SearchSpec, WindowRef,
};
use deskdriver::timing::{Phase, Sleeper, TimingProfile};
use deskdriver::AutomationError;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ProcessIds,
    Launch(String, Vec<String>),
    Terminate,
    FindWindow(SearchScope, String),
    FindChild(ControlKind),
    Release(u64),
    SetFocus,
    Restore,
    Foreground,
    Keys(String),
    Text(String),
    Sleep(Duration),
}

#[derive(Default)]
struct Script {
    events: Vec<Event>,
    pids: Vec<u32>,
    windows: HashMap<u32, Vec<String>>,
    erroring_pids: HashSet<u32>,
    desktop: Vec<(String, usize)>,
    desktop_calls: usize,
    desktop_errors: bool,
    launch_as: Option<(u32, Vec<String>)>,
    launch_fails: bool,
    children: Vec<(ControlKind, String)>,
    enumeration_fails: bool,
    focus_fails: bool,
    fallback_fails: bool,
    no_native_handle: bool,
    failing_keys: Option<String>,
    next_id: u64,
}

pub struct ScriptedBackend {
    script: Mutex<Script>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script::default()),
        }
    }

    fn edit(self, f: impl FnOnce(&mut Script)) -> Self {
        f(&mut self.script.lock().unwrap());
        self
    }

    /// A running process owning windows with these titles.
    pub fn with_process(self, pid: u32, titles: &[&str]) -> Self {
        self.edit(|s| {
            s.pids.push(pid);
            s.windows
                .insert(pid, titles.iter().map(|t| t.to_string()).collect());
        })
    }

    /// A process whose automation connection errors out.
    pub fn with_erroring_process(self, pid: u32) -> Self {
        self.edit(|s| {
            s.pids.push(pid);
            s.erroring_pids.insert(pid);
        })
    }

    /// A top-level window only the desktop-wide search can see.
    pub fn with_desktop_window(self, title: &str) -> Self {
        self.with_desktop_window_after(title, 0)
    }

    /// Visible to desktop searches once `calls` desktop searches have already run.
    pub fn with_desktop_window_after(self, title: &str, calls: usize) -> Self {
        self.edit(|s| s.desktop.push((title.to_string(), calls)))
    }

    pub fn with_desktop_errors(self) -> Self {
        self.edit(|s| s.desktop_errors = true)
    }

    /// Launching creates `pid` with windows titled `titles`.
    pub fn launches_as(self, pid: u32, titles: &[&str]) -> Self {
        self.edit(|s| s.launch_as = Some((pid, titles.iter().map(|t| t.to_string()).collect())))
    }

    pub fn with_failing_launch(self) -> Self {
        self.edit(|s| s.launch_fails = true)
    }

    /// Unnamed descendant controls of every window.
    pub fn with_children(self, kinds: &[ControlKind]) -> Self {
        self.edit(|s| s.children = kinds.iter().map(|k| (*k, String::new())).collect())
    }

    pub fn with_named_child(self, kind: ControlKind, name: &str) -> Self {
        self.edit(|s| s.children.push((kind, name.to_string())))
    }

    pub fn with_enumeration_failure(self) -> Self {
        self.edit(|s| s.enumeration_fails = true)
    }

    pub fn with_focus_failure(self) -> Self {
        self.edit(|s| s.focus_fails = true)
    }

    pub fn with_fallback_failure(self) -> Self {
        self.edit(|s| s.fallback_fails = true)
    }

    pub fn without_native_handles(self) -> Self {
        self.edit(|s| s.no_native_handle = true)
    }

    pub fn with_failing_keys(self, keys: &str) -> Self {
        self.edit(|s| s.failing_keys = Some(keys.to_string()))
    }

    pub fn events(&self) -> Vec<Event> {
        self.script.lock().unwrap().events.clone()
    }

    pub fn clear_events(&self) {
        self.script.lock().unwrap().events.clear();
    }

    /// Only keystrokes and typed text, in order.
    pub fn dispatched(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, Event::Keys(_) | Event::Text(_)))
            .collect()
    }

    pub fn releases(&self) -> usize {
        self.count(|e| matches!(e, Event::Release(_)))
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    fn record(&self, event: Event) {
        self.script.lock().unwrap().events.push(event);
    }

    fn window(s: &mut Script, pid: Option<u32>, title: &str, kind: ControlKind) -> WindowRef {
        s.next_id += 1;
        WindowRef {
            id: s.next_id,
            pid,
            title: title.to_string(),
            native_handle: if s.no_native_handle {
                None
            } else {
                Some(0x1000 + s.next_id as isize)
            },
            control_type: Some(kind),
        }
    }
}

impl AutomationBackend for ScriptedBackend {
    fn process_ids(&self, _executable: &str) -> Result<Vec<u32>, AutomationError> {
        let mut s = self.script.lock().unwrap();
        s.events.push(Event::ProcessIds);
        if s.enumeration_fails {
            return Err(AutomationError::PlatformError("enumeration failed".into()));
        }
        Ok(s.pids.clone())
    }

    fn launch(&self, executable: &str, args: &[String]) -> Result<u32, AutomationError> {
        let mut s = self.script.lock().unwrap();
        s.events
            .push(Event::Launch(executable.to_string(), args.to_vec()));
        if s.launch_fails {
            return Err(AutomationError::PlatformError(format!(
                "Failed to launch '{executable}'"
            )));
        }
        let (pid, titles) = s.launch_as.clone().unwrap_or((4242, vec![]));
        s.pids.push(pid);
        s.windows.insert(pid, titles);
        Ok(pid)
    }

    fn terminate(&self, _executable: &str) -> Result<usize, AutomationError> {
        let mut s = self.script.lock().unwrap();
        s.events.push(Event::Terminate);
        let count = s.pids.len();
        s.pids.clear();
        s.windows.clear();
        Ok(count)
    }

    fn find_window(
        &self,
        spec: &SearchSpec,
        _timeout: Duration,
    ) -> Result<Option<WindowRef>, AutomationError> {
        let mut s = self.script.lock().unwrap();
        s.events.push(Event::FindWindow(
            spec.scope,
            spec.title_pattern.as_str().to_string(),
        ));

        let (pid, titles): (Option<u32>, Vec<String>) = match spec.scope {
            SearchScope::Process(pid) => {
                if s.erroring_pids.contains(&pid) {
                    return Err(AutomationError::PlatformError(format!(
                        "cannot connect to PID {pid}"
                    )));
                }
                (Some(pid), s.windows.get(&pid).cloned().unwrap_or_default())
            }
            SearchScope::Desktop => {
                if s.desktop_errors {
                    return Err(AutomationError::PlatformError("desktop unavailable".into()));
                }
                let seen = s.desktop_calls;
                s.desktop_calls += 1;
                let visible = s
                    .desktop
                    .iter()
                    .filter(|(_, after)| seen >= *after)
                    .map(|(title, _)| title.clone())
                    .collect();
                (None, visible)
            }
        };

        let title = titles
            .iter()
            .filter(|t| spec.title_pattern.is_match(t))
            .nth(spec.found_index)
            .cloned();
        Ok(title.map(|t| Self::window(&mut s, pid, &t, ControlKind::Window)))
    }

    fn find_child(
        &self,
        parent: &WindowRef,
        query: &ChildQuery,
        _timeout: Duration,
    ) -> Result<Option<WindowRef>, AutomationError> {
        let mut s = self.script.lock().unwrap();
        s.events.push(Event::FindChild(query.control_type));
        let name_pattern = query
            .name_pattern
            .as_deref()
            .map(|p| regex::Regex::new(p).unwrap());
        let hit = s
            .children
            .iter()
            .find(|(kind, name)| {
                *kind == query.control_type
                    && name_pattern.as_ref().map_or(true, |p| p.is_match(name))
            })
            .cloned();
        Ok(hit.map(|(kind, name)| {
            let title = if name.is_empty() {
                format!("{} {:?}", parent.title, kind)
            } else {
                name
            };
            Self::window(&mut s, parent.pid, &title, kind)
        }))
    }

    fn set_focus(&self, _window: &WindowRef) -> Result<(), AutomationError> {
        let mut s = self.script.lock().unwrap();
        s.events.push(Event::SetFocus);
        if s.focus_fails {
            Err(AutomationError::Transient("focus refused".into()))
        } else {
            Ok(())
        }
    }

    fn restore_window(&self, _native_handle: isize) -> Result<(), AutomationError> {
        let mut s = self.script.lock().unwrap();
        s.events.push(Event::Restore);
        Ok(())
    }

    fn set_foreground(&self, _native_handle: isize) -> Result<(), AutomationError> {
        let mut s = self.script.lock().unwrap();
        s.events.push(Event::Foreground);
        if s.fallback_fails {
            Err(AutomationError::Transient("SetForegroundWindow was refused".into()))
        } else {
            Ok(())
        }
    }

    fn send_keys(&self, keys: &str) -> Result<(), AutomationError> {
        let mut s = self.script.lock().unwrap();
        s.events.push(Event::Keys(keys.to_string()));
        if s.failing_keys.as_deref() == Some(keys) {
            Err(AutomationError::Transient(format!("could not send {keys:?}")))
        } else {
            Ok(())
        }
    }

    fn send_text(&self, text: &str, _with_spaces: bool) -> Result<(), AutomationError> {
        self.record(Event::Text(text.to_string()));
        Ok(())
    }

    fn release(&self, window: &WindowRef) {
        self.record(Event::Release(window.id));
    }
}

impl Sleeper for ScriptedBackend {
    fn sleep(&self, duration: Duration) {
        self.record(Event::Sleep(duration));
    }
}

/// Timing where every phase has a different duration, so sleeps identify their phase.
pub fn distinct_timing() -> TimingProfile {
    Phase::ALL
        .iter()
        .enumerate()
        .fold(TimingProfile::default(), |profile, (i, phase)| {
            profile.with(*phase, Duration::from_millis(i as u64 + 1))
        })
}

pub fn settle(phase: Phase) -> Event {
    Event::Sleep(distinct_timing().get(phase))
}

pub fn keys(k: &str) -> Event {
    Event::Keys(k.to_string())
}

pub fn text(t: &str) -> Event {
    Event::Text(t.to_string())
}

/// Spreadsheet preset with distinct timings and no recovery directories.
pub fn test_config() -> DriverConfig {
    let mut config = DriverConfig::spreadsheet();
    config.timing = distinct_timing();
    config.retry.retry_delay_ms = 1000;
    config.app.recovery.directories.clear();
    config.app.recovery.desktop_patterns.clear();
    config
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
