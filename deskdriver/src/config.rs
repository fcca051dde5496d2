//! Driver configuration.
//!
//! Everything the driver needs to know about one target application, loaded from
//! JSON or taken from a built-in preset.

use crate::platforms::{ChildQuery, ControlKind};
use crate::timing::TimingProfile;
use crate::AutomationError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable naming a JSON config file, consulted when no path is given.
pub const CONFIG_ENV_VAR: &str = "DESKDRIVER_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub app: AppProfile,
    pub timing: TimingProfile,
    pub retry: RetryPolicy,
    pub locator: LocatorConfig,
    pub shortcuts: Shortcuts,
    pub dialog: DialogConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::spreadsheet()
    }
}

/// The application being driven.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppProfile {
    pub name: String,
    /// Process executable name, e.g. `EXCEL.EXE`.
    pub executable: String,
    /// Full path used to launch when the executable is not on `PATH`.
    pub launch_path: Option<PathBuf>,
    /// Regex matched anywhere in the main window title.
    pub title_pattern: String,
    /// Editing-surface probes, tried in order. Differs between application versions.
    pub editor_candidates: Vec<ChildQuery>,
    /// Named controls looked up on demand, each a fallback chain like the editor's.
    pub elements: BTreeMap<String, Vec<ChildQuery>>,
    pub recovery: RecoveryConfig,
}

impl Default for AppProfile {
    fn default() -> Self {
        DriverConfig::spreadsheet().app
    }
}

impl AppProfile {
    pub fn launch_target(&self) -> String {
        match &self.launch_path {
            Some(path) => path.display().to_string(),
            None => self.executable.clone(),
        }
    }
}

/// Where the application leaves autosave and lock files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Directories to sweep. A leading `~` is the user's home directory.
    pub directories: Vec<String>,
    /// Glob patterns matched inside each directory.
    pub patterns: Vec<String>,
    /// Patterns swept on the user's desktop. Empty disables the desktop sweep.
    pub desktop_patterns: Vec<String>,
}

impl RecoveryConfig {
    pub fn resolved_directories(&self) -> Vec<PathBuf> {
        self.directories.iter().map(|d| expand_home(d)).collect()
    }
}

/// Expand a leading `~` to the home directory. Other paths are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) => rest.trim_start_matches(['/', '\\']),
        None => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Existence-check timeout for each process-scoped search.
    pub exists_timeout_ms: u64,
    /// Upper bound on the desktop-wide fallback search.
    pub desktop_search_timeout_ms: u64,
    /// Existence-check timeout for each editor probe.
    pub child_probe_timeout_ms: u64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            exists_timeout_ms: 1000,
            desktop_search_timeout_ms: 30_000,
            child_probe_timeout_ms: 1000,
        }
    }
}

impl LocatorConfig {
    pub fn exists_timeout(&self) -> Duration {
        Duration::from_millis(self.exists_timeout_ms)
    }

    pub fn desktop_search_timeout(&self) -> Duration {
        Duration::from_millis(self.desktop_search_timeout_ms)
    }

    pub fn child_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.child_probe_timeout_ms)
    }
}

/// Accelerators in send-keys syntax: `^` ctrl, `%` alt, `+` shift, `{NAME}` named keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Shortcuts {
    pub go_to: String,
    pub save: String,
    pub save_as: String,
    pub close_document: String,
    pub menu_open: String,
    pub confirm: String,
    pub cancel: String,
    pub discard: String,
}

impl Default for Shortcuts {
    fn default() -> Self {
        Self {
            go_to: "^g".to_string(),
            save: "^s".to_string(),
            save_as: "{F12}".to_string(),
            close_document: "^w".to_string(),
            menu_open: "%".to_string(),
            confirm: "{ENTER}".to_string(),
            cancel: "{ESC}".to_string(),
            discard: "n".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogConfig {
    pub response_key: String,
    pub timeout_ms: u64,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            response_key: "{ESC}".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl DialogConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl DriverConfig {
    /// Spreadsheet application driven through Go To, ribbon accelerators and save/close chords.
    pub fn spreadsheet() -> Self {
        Self {
            app: AppProfile {
                name: "Excel".to_string(),
                executable: "EXCEL.EXE".to_string(),
                launch_path: None,
                title_pattern: "Excel".to_string(),
                editor_candidates: vec![],
                elements: BTreeMap::new(),
                recovery: RecoveryConfig {
                    directories: vec![
                        "~/AppData/Local/Microsoft/Office/UnsavedFiles".to_string(),
                        "~/AppData/Roaming/Microsoft/Excel".to_string(),
                    ],
                    patterns: vec![
                        "*.xlsx~*".to_string(),
                        "*.xls~*".to_string(),
                        "*[[]Recovered[]]*".to_string(),
                        "*~$*.xlsx".to_string(),
                        "*~$*.xls".to_string(),
                    ],
                    desktop_patterns: vec!["*~$*.xlsx".to_string(), "*~$*.xls".to_string()],
                },
            },
            timing: TimingProfile::default(),
            retry: RetryPolicy::default(),
            locator: LocatorConfig::default(),
            shortcuts: Shortcuts::default(),
            dialog: DialogConfig::default(),
        }
    }

    /// Plain text editor whose editing surface is `Document` in newer builds and `Edit` in
    /// classic ones.
    pub fn text_editor() -> Self {
        Self {
            app: AppProfile {
                name: "Notepad".to_string(),
                executable: "notepad.exe".to_string(),
                launch_path: None,
                title_pattern: "(Notepad|メモ帳)".to_string(),
                editor_candidates: vec![
                    ChildQuery::of(ControlKind::Document),
                    ChildQuery::of(ControlKind::Edit),
                ],
                elements: text_editor_elements(),
                recovery: RecoveryConfig {
                    directories: vec![
                        "~/AppData/Local/Packages/Microsoft.WindowsNotepad_8wekyb3d8bbwe/LocalState/TabState"
                            .to_string(),
                    ],
                    patterns: vec!["*.bin".to_string()],
                    desktop_patterns: vec![],
                },
            },
            shortcuts: Shortcuts {
                save_as: "^+s".to_string(),
                discard: "%n".to_string(),
                ..Shortcuts::default()
            },
            ..Self::spreadsheet()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, AutomationError> {
        let config: DriverConfig = serde_json::from_str(json)
            .map_err(|e| AutomationError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, AutomationError> {
        debug!("Loading driver config from {}", path.display());
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AutomationError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Load from `path`, else from `$DESKDRIVER_CONFIG`, else the spreadsheet preset.
    pub fn load(path: Option<&Path>) -> Result<Self, AutomationError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(env_path) if !env_path.is_empty() => Self::from_file(Path::new(&env_path)),
            _ => {
                info!("No config given, using the spreadsheet preset");
                Ok(Self::spreadsheet())
            }
        }
    }

    pub fn title_regex(&self) -> Result<Regex, AutomationError> {
        Regex::new(&self.app.title_pattern).map_err(|e| {
            AutomationError::Config(format!(
                "invalid title pattern '{}': {e}",
                self.app.title_pattern
            ))
        })
    }

    pub fn validate(&self) -> Result<(), AutomationError> {
        if self.app.executable.trim().is_empty() {
            return Err(AutomationError::Config("app.executable is required".into()));
        }
        self.title_regex()?;
        for candidate in &self.app.editor_candidates {
            validate_name_pattern("editor", candidate)?;
        }
        for (name, chain) in &self.app.elements {
            if chain.is_empty() {
                return Err(AutomationError::Config(format!(
                    "element '{name}' has no candidates"
                )));
            }
            for candidate in chain {
                validate_name_pattern(name, candidate)?;
            }
        }
        if self.retry.max_retries == 0 {
            return Err(AutomationError::Config(
                "retry.max_retries must be at least 1".into(),
            ));
        }
        let recovery = &self.app.recovery;
        for pattern in recovery.patterns.iter().chain(&recovery.desktop_patterns) {
            if pattern.trim().is_empty() {
                return Err(AutomationError::Config("empty recovery pattern".into()));
            }
            glob::Pattern::new(pattern).map_err(|e| {
                AutomationError::Config(format!("invalid recovery pattern '{pattern}': {e}"))
            })?;
        }
        Ok(())
    }
}

fn validate_name_pattern(owner: &str, query: &ChildQuery) -> Result<(), AutomationError> {
    if let Some(pattern) = &query.name_pattern {
        Regex::new(pattern).map_err(|e| {
            AutomationError::Config(format!("invalid {owner} name pattern '{pattern}': {e}"))
        })?;
    }
    Ok(())
}

/// Menu and save-dialog controls, matched by their English or Japanese UI names.
fn text_editor_elements() -> BTreeMap<String, Vec<ChildQuery>> {
    let named = |kind: ControlKind, pattern: &str| vec![ChildQuery::of(kind).named(pattern)];
    BTreeMap::from([
        ("menu_bar".to_string(), vec![ChildQuery::of(ControlKind::MenuBar)]),
        ("file_menu".to_string(), named(ControlKind::MenuItem, "(File|ファイル)")),
        ("exit_menu_item".to_string(), named(ControlKind::MenuItem, "(Exit|終了)")),
        (
            "save_as_menu_item".to_string(),
            named(ControlKind::MenuItem, "(Save [Aa]s|名前を付けて保存)"),
        ),
        ("save_dialog".to_string(), named(ControlKind::Window, "(名前を付けて保存|Save As)")),
        ("cancel_button".to_string(), named(ControlKind::Button, "(キャンセル|Cancel)")),
        (
            "dont_save_button".to_string(),
            named(ControlKind::Button, "(Don't [Ss]ave|保存しない)"),
        ),
    ])
}
