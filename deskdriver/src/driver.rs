use crate::activation::Activator;
use crate::cleanup::{CleanupReport, CopiedFiles, RecoveryCleaner};
use crate::commands::{CellRef, CommandPlan, PlanExecutor};
use crate::config::DriverConfig;
use crate::dialog::{DialogOutcome, DialogWatcher};
use crate::errors::AutomationError;
use crate::locator::WindowLocator;
use crate::platforms::{self, AutomationBackend, ChildQuery, WindowRef};
use crate::timing::{Phase, Sleeper, ThreadSleeper};
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Stopped,
    Starting,
    Running,
}

/// The attached application: its processes and, once found, its main window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationHandle {
    pub pids: Vec<u32>,
    pub window: Option<WindowRef>,
}

pub struct DriverBuilder {
    config: DriverConfig,
    backend: Option<Arc<dyn AutomationBackend>>,
    sleeper: Arc<dyn Sleeper>,
    copied_files: CopiedFiles,
    cancel: CancellationToken,
}

impl DriverBuilder {
    pub fn backend(mut self, backend: Arc<dyn AutomationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Share an exclusion set with the caller. Each concurrent session needs its own.
    pub fn copied_files(mut self, copied_files: CopiedFiles) -> Self {
        self.copied_files = copied_files;
        self
    }

    pub fn cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn build(self) -> Result<AppDriver, AutomationError> {
        self.config.validate()?;
        let backend = match self.backend {
            Some(backend) => backend,
            None => platforms::create_backend()?,
        };
        let title = self.config.title_regex()?;
        let timing = self.config.timing.clone();

        Ok(AppDriver {
            locator: WindowLocator::new(backend.clone(), self.config.locator),
            activator: Activator::new(backend.clone(), timing.clone(), self.sleeper.clone()),
            executor: PlanExecutor::new(backend.clone(), timing.clone(), self.sleeper.clone()),
            dialogs: DialogWatcher::new(backend.clone(), timing, self.sleeper.clone()),
            cleaner: RecoveryCleaner::from_config(&self.config.app.recovery),
            backend,
            title,
            config: self.config,
            sleeper: self.sleeper,
            copied_files: self.copied_files,
            cancel: self.cancel,
            state: DriverState::Stopped,
            handle: None,
        })
    }
}

/// Drives one desktop application through synthetic keyboard input.
///
/// Operations take `&mut self`: commands against one window must be strictly
/// serialized. Every command activates the window first, replays a
/// [`CommandPlan`], and reports failures as [`AutomationError`]s whose
/// [`kind`](AutomationError::kind) tells the caller whether to retry or abandon
/// the step.
///
/// ```no_run
/// use deskdriver::{AppDriver, CellRef, DriverConfig};
///
/// let mut driver = AppDriver::new(DriverConfig::spreadsheet())?;
/// driver.start(None)?;
/// driver.select_cell(&CellRef::at(2, 2)?)?;
/// driver.input_text("42")?;
/// driver.close_document(false)?;
/// driver.quit();
/// # Ok::<(), deskdriver::AutomationError>(())
/// ```
pub struct AppDriver {
    backend: Arc<dyn AutomationBackend>,
    config: DriverConfig,
    title: Regex,
    locator: WindowLocator,
    activator: Activator,
    executor: PlanExecutor,
    dialogs: DialogWatcher,
    cleaner: RecoveryCleaner,
    sleeper: Arc<dyn Sleeper>,
    copied_files: CopiedFiles,
    cancel: CancellationToken,
    state: DriverState,
    handle: Option<ApplicationHandle>,
}

impl AppDriver {
    /// Driver on the platform backend with real sleeps and a fresh exclusion set.
    pub fn new(config: DriverConfig) -> Result<Self, AutomationError> {
        Self::builder(config).build()
    }

    pub fn builder(config: DriverConfig) -> DriverBuilder {
        DriverBuilder {
            config,
            backend: None,
            sleeper: Arc::new(ThreadSleeper),
            copied_files: CopiedFiles::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn handle(&self) -> Option<&ApplicationHandle> {
        self.handle.as_ref()
    }

    pub fn copied_files(&self) -> &CopiedFiles {
        &self.copied_files
    }

    /// Token checked by poll loops. Cancelling it makes an in-flight dialog wait return.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // ----- lifecycle -----

    /// Clean stale recovery files, then attach to a running instance or launch one
    /// (opening `path` if given).
    #[instrument(skip(self))]
    pub fn start(&mut self, path: Option<&Path>) -> Result<(), AutomationError> {
        self.state = DriverState::Starting;
        self.cleanup();

        let executable = self.config.app.executable.clone();
        let running = match self.backend.process_ids(&executable) {
            Ok(pids) => !pids.is_empty(),
            Err(e) => {
                debug!("Process enumeration failed before start: {}", e);
                false
            }
        };

        if running && path.is_none() {
            info!("Attaching to running '{}'", executable);
        } else {
            let args: Vec<String> = path.iter().map(|p| p.display().to_string()).collect();
            if let Err(e) = self.backend.launch(&self.config.app.launch_target(), &args) {
                error!("Failed to start {}: {}", self.config.app.name, e);
                self.state = DriverState::Stopped;
                return Err(e);
            }
        }

        self.wait_for_window();
        self.state = DriverState::Running;
        info!("{} started", self.config.app.name);
        Ok(())
    }

    /// Poll cheaply by process scope, paying for the desktop fallback only on the last try.
    fn wait_for_window(&mut self) {
        let attempts = self.config.retry.max_retries;
        for attempt in 1..=attempts {
            let last = attempt == attempts;
            if self.refresh_handles(last) {
                return;
            }
            if !last {
                self.sleeper.sleep(self.config.timing.get(Phase::FileOperation));
            }
        }
        warn!(
            "{} window not found yet; it will be looked up again on first use",
            self.config.app.name
        );
    }

    /// Re-resolve process and window handles. Returns whether a window was found.
    fn refresh_handles(&mut self, allow_desktop_fallback: bool) -> bool {
        let executable = &self.config.app.executable;
        let pids = match self.backend.process_ids(executable) {
            Ok(pids) if pids.is_empty() => {
                self.invalidate_handles();
                return false;
            }
            Ok(pids) => pids,
            Err(e) => {
                // Unknown process set: the desktop search can still find the window.
                debug!("Failed to refresh process handles: {}", e);
                vec![]
            }
        };

        let located = if allow_desktop_fallback {
            self.locator.locate(executable, &self.title)
        } else {
            self.locator.locate_in_processes(executable, &self.title)
        };
        let window = match located {
            Ok(window) => window,
            Err(e) => {
                debug!("Failed to refresh window handle: {}", e);
                None
            }
        };
        let found = window.is_some();
        if let Some(old) = self.handle.as_ref().and_then(|h| h.window.as_ref()) {
            self.backend.release(old);
        }
        self.handle = Some(ApplicationHandle { pids, window });
        found
    }

    fn invalidate_handles(&mut self) {
        if let Some(window) = self.handle.take().and_then(|h| h.window) {
            self.backend.release(&window);
        }
    }

    fn invalidate_window(&mut self) {
        if let Some(window) = self.handle.as_mut().and_then(|h| h.window.take()) {
            self.backend.release(&window);
        }
    }

    /// The main window, re-acquired lazily when it was dropped or never found.
    fn current_window(&mut self) -> Option<WindowRef> {
        if let Some(window) = self.handle.as_ref().and_then(|h| h.window.clone()) {
            return Some(window);
        }
        self.refresh_handles(true);
        self.handle.as_ref().and_then(|h| h.window.clone())
    }

    /// Is the application currently attached.
    pub fn exists(&mut self) -> bool {
        self.current_window().is_some()
    }

    /// Whether any process of the application is alive, attached or not. Falls back
    /// to the held handle when processes cannot be enumerated.
    fn is_process_running(&self) -> bool {
        match self.backend.process_ids(&self.config.app.executable) {
            Ok(pids) => !pids.is_empty(),
            Err(e) => {
                debug!("Process enumeration failed: {}", e);
                self.handle.is_some() || self.state == DriverState::Running
            }
        }
    }

    /// Request termination, drop handles, sweep recovery files. Never fails.
    #[instrument(skip(self))]
    pub fn quit(&mut self) {
        match self.backend.terminate(&self.config.app.executable) {
            Ok(count) => debug!("Terminated {} process(es)", count),
            Err(e) => debug!("Termination raised but was ignored: {}", e),
        }
        self.invalidate_handles();
        self.cleanup();
        self.state = DriverState::Stopped;
        debug!("{} quit and cleanup complete", self.config.app.name);
    }

    /// Quit and forget every caller-registered file. Meant for isolation between
    /// independent test cases, not for use mid-scenario.
    pub fn reset(&mut self) {
        self.quit();
        self.copied_files.clear();
    }

    /// One recovery sweep honoring this session's exclusion set.
    pub fn cleanup(&self) -> CleanupReport {
        self.cleaner.cleanup(&self.copied_files)
    }

    // ----- activation -----

    /// Focus the main window, retrying per the configured policy.
    pub fn activate_window(&mut self) -> Result<u32, AutomationError> {
        let window = self.current_window().ok_or_else(|| {
            AutomationError::NotRunning(format!("{} window not found", self.config.app.name))
        })?;
        let result = self.activator.activate(&window, &self.config.retry);
        if result.is_err() {
            self.invalidate_window();
        }
        result
    }

    /// Activation before a command is best-effort: failure is logged, not returned.
    fn ensure_active(&mut self, operation: &str) {
        debug!("Activating window before {}", operation);
        if let Err(e) = self.activate_window() {
            warn!("Window not active before {}: {}", operation, e);
        }
    }

    fn run(&mut self, operation: &str, plan: &CommandPlan) -> Result<(), AutomationError> {
        self.ensure_active(operation);
        self.executor.execute(plan).map_err(|e| {
            error!("Failed to {}: {}", operation, e);
            e
        })
    }

    // ----- commands -----

    #[instrument(skip(self))]
    pub fn select_cell(&mut self, cell: &CellRef) -> Result<(), AutomationError> {
        let plan = CommandPlan::select_cell(cell, &self.config.shortcuts);
        self.run("select_cell", &plan)?;
        debug!("Selected cell {}", cell.address());
        Ok(())
    }

    #[instrument(skip(self, text))]
    pub fn input_text(&mut self, text: &str) -> Result<(), AutomationError> {
        let plan = CommandPlan::input_text(text, &self.config.shortcuts);
        self.run("input_text", &plan)
    }

    /// Run a `>`-delimited accelerator path such as `"Home>Format>AutoFit"`.
    #[instrument(skip(self))]
    pub fn execute_menu_path(&mut self, path: &str) -> Result<(), AutomationError> {
        let plan = CommandPlan::menu_path(path, &self.config.shortcuts)?;
        self.run("execute_menu_path", &plan)
    }

    /// Save in place, or save-as when `path` is given.
    #[instrument(skip(self))]
    pub fn save(&mut self, path: Option<&str>) -> Result<(), AutomationError> {
        let plan = CommandPlan::save(path, &self.config.shortcuts);
        self.run("save", &plan)
    }

    /// Close the active document, answering the save prompt with `save`.
    ///
    /// If the close sequence fails the application is force-terminated so a hung
    /// instance cannot block the next step.
    #[instrument(skip(self))]
    pub fn close_document(&mut self, save: bool) -> Result<(), AutomationError> {
        if !self.is_process_running() {
            debug!("{} not running; nothing to close", self.config.app.name);
            self.invalidate_handles();
            return Ok(());
        }

        let plan = CommandPlan::close_document(save, &self.config.shortcuts);
        match self.run("close_document", &plan) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Force-terminating {} after failed close", self.config.app.name);
                self.quit();
                Err(AutomationError::FatalProcess(e.to_string()))
            }
        }
    }

    /// Wait for one of `patterns` to appear as a window title and answer it with `key`.
    /// A dialog that never shows up is a success.
    pub fn handle_dialog<S: AsRef<str>>(
        &mut self,
        patterns: &[S],
        key: &str,
        timeout: Duration,
    ) -> Result<DialogOutcome, AutomationError> {
        self.dialogs
            .handle_dialog(patterns, key, timeout, &self.cancel)
            .map_err(|e| {
                error!("Failed to handle dialog: {}", e);
                e
            })
    }

    /// [`handle_dialog`](Self::handle_dialog) with the configured response key and timeout.
    pub fn dismiss_dialog<S: AsRef<str>>(
        &mut self,
        patterns: &[S],
    ) -> Result<DialogOutcome, AutomationError> {
        let key = self.config.dialog.response_key.clone();
        let timeout = self.config.dialog.timeout();
        self.handle_dialog(patterns, &key, timeout)
    }

    /// The editing surface, probing the configured control types in order.
    ///
    /// The returned reference stays tracked by the backend until passed to
    /// [`release`](Self::release).
    pub fn editor(&mut self) -> Result<Option<WindowRef>, AutomationError> {
        let candidates = self.config.app.editor_candidates.clone();
        self.resolve_in_window(&candidates)
    }

    /// A named control from the profile's `elements` table, e.g. `"save_as_menu_item"`.
    /// Release the result when done with it.
    pub fn element(&mut self, name: &str) -> Result<Option<WindowRef>, AutomationError> {
        let candidates = self.config.app.elements.get(name).cloned().ok_or_else(|| {
            AutomationError::invalid(format!(
                "{} has no element named '{}'",
                self.config.app.name, name
            ))
        })?;
        self.resolve_in_window(&candidates)
    }

    fn resolve_in_window(
        &mut self,
        candidates: &[ChildQuery],
    ) -> Result<Option<WindowRef>, AutomationError> {
        let window = self.current_window().ok_or_else(|| {
            AutomationError::NotRunning(format!("{} window not found", self.config.app.name))
        })?;
        self.locator.resolve_first(&window, candidates)
    }

    /// Drop the backend state behind an element obtained from [`editor`](Self::editor)
    /// or [`element`](Self::element).
    pub fn release(&self, element: &WindowRef) {
        self.backend.release(element);
    }
}
