//! Command plans.
//!
//! A semantic operation ("select cell B2", "save as …") is first turned into an
//! ordered list of atomic input actions, then replayed against the focused window.
//! Building the plan is pure so the exact keystroke sequence can be inspected and
//! tested without a desktop.

use crate::config::Shortcuts;
use crate::errors::AutomationError;
use crate::platforms::AutomationBackend;
use crate::timing::{Phase, Sleeper, TimingProfile};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// One atomic step of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// Key chord in send-keys syntax, dispatched as-is.
    Keys(String),
    /// Literal text. Never interpreted as key syntax.
    Text { text: String, with_spaces: bool },
    /// Settle wait sized by the timing profile.
    Settle(Phase),
}

impl fmt::Display for InputAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputAction::Keys(keys) => write!(f, "keys {keys:?}"),
            InputAction::Text { text, .. } => write!(f, "text {text:?}"),
            InputAction::Settle(phase) => write!(f, "settle {phase}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandPlan {
    actions: Vec<InputAction>,
}

impl CommandPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(mut self, keys: impl Into<String>) -> Self {
        self.actions.push(InputAction::Keys(keys.into()));
        self
    }

    pub fn text(mut self, text: impl Into<String>, with_spaces: bool) -> Self {
        self.actions.push(InputAction::Text {
            text: text.into(),
            with_spaces,
        });
        self
    }

    pub fn settle(mut self, phase: Phase) -> Self {
        self.actions.push(InputAction::Settle(phase));
        self
    }

    pub fn actions(&self) -> &[InputAction] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Go To dialog, address, confirm, then escape out of any edit mode.
    pub fn select_cell(cell: &CellRef, shortcuts: &Shortcuts) -> Self {
        Self::new()
            .keys(&shortcuts.go_to)
            .settle(Phase::CellSelection)
            .text(cell.address(), false)
            .settle(Phase::CellSelection)
            .keys(&shortcuts.confirm)
            .settle(Phase::CellSelection)
            .keys(&shortcuts.cancel)
            .settle(Phase::CellSelection)
    }

    pub fn input_text(text: &str, shortcuts: &Shortcuts) -> Self {
        Self::new()
            .text(text, true)
            .settle(Phase::TextInput)
            .keys(&shortcuts.confirm)
    }

    /// `"Home>Format>AutoFit"` opens the menu accelerator then presses `HOME`, `FORMAT`,
    /// `AUTOFIT` with a settle wait after each. A path without `>` is a single keystroke.
    pub fn menu_path(path: &str, shortcuts: &Shortcuts) -> Result<Self, AutomationError> {
        if path.trim().is_empty() {
            return Err(AutomationError::invalid("menu path is required"));
        }

        let segments: Vec<String> = path
            .split('>')
            .map(|segment| segment.trim().to_uppercase())
            .collect();
        if segments.iter().any(String::is_empty) {
            return Err(AutomationError::invalid(format!(
                "menu path '{path}' has an empty segment"
            )));
        }

        let mut plan = Self::new().keys(&shortcuts.menu_open);
        for segment in segments {
            plan = plan.keys(segment).settle(Phase::MenuOperation);
        }
        Ok(plan)
    }

    /// Plain save, or save-as with `path` typed verbatim.
    pub fn save(path: Option<&str>, shortcuts: &Shortcuts) -> Self {
        match path {
            Some(path) => Self::new()
                .keys(&shortcuts.save_as)
                .settle(Phase::FileOperation)
                .text(path, true)
                .settle(Phase::TextInput)
                .keys(&shortcuts.confirm)
                .settle(Phase::FileOperation),
            None => Self::new()
                .keys(&shortcuts.save)
                .settle(Phase::FileOperation),
        }
    }

    /// Close chord, then answer the "save changes?" prompt.
    pub fn close_document(save: bool, shortcuts: &Shortcuts) -> Self {
        let answer = if save {
            &shortcuts.confirm
        } else {
            &shortcuts.discard
        };
        Self::new()
            .keys(&shortcuts.close_document)
            .settle(Phase::FileOperation)
            .keys(answer)
            .settle(Phase::DialogWait)
    }

    /// Let a dialog finish rendering, answer it, let it close.
    pub fn dialog_response(key: &str) -> Self {
        Self::new()
            .settle(Phase::DialogWait)
            .keys(key)
            .settle(Phase::DialogConfirm)
    }
}

impl fmt::Display for CommandPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, action) in self.actions.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{action}")?;
        }
        Ok(())
    }
}

/// A spreadsheet cell, by A1-style address or 1-based row and column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellRef {
    Address(String),
    Position { row: u32, column: u32 },
}

impl CellRef {
    pub fn address_of(address: &str) -> Result<Self, AutomationError> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(AutomationError::invalid("cell address is empty"));
        }
        Ok(CellRef::Address(trimmed.to_uppercase()))
    }

    pub fn at(row: u32, column: u32) -> Result<Self, AutomationError> {
        if row == 0 || column == 0 {
            return Err(AutomationError::invalid(format!(
                "row and column are 1-based, got row={row} column={column}"
            )));
        }
        Ok(CellRef::Position { row, column })
    }

    /// Accepts the loose argument shape scenario files use: an address wins, otherwise
    /// both row and column are required.
    pub fn from_parts(
        row: Option<u32>,
        column: Option<u32>,
        address: Option<&str>,
    ) -> Result<Self, AutomationError> {
        match (address, row, column) {
            (Some(address), _, _) => Self::address_of(address),
            (None, Some(row), Some(column)) => Self::at(row, column),
            _ => Err(AutomationError::invalid(
                "select_cell requires a cell address or both row and column",
            )),
        }
    }

    pub fn address(&self) -> String {
        match self {
            CellRef::Address(address) => address.clone(),
            CellRef::Position { row, column } => format!("{}{}", column_letters(*column), row),
        }
    }
}

/// 1 → `A`, 26 → `Z`, 27 → `AA`.
pub fn column_letters(mut column: u32) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(b'A' + rem as u8);
        column = (column - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Replays plans against whatever window currently holds focus.
#[derive(Clone)]
pub struct PlanExecutor {
    backend: Arc<dyn AutomationBackend>,
    timing: TimingProfile,
    sleeper: Arc<dyn Sleeper>,
}

impl PlanExecutor {
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

    /// Run every action in order, stopping at the first failed dispatch.
    pub fn execute(&self, plan: &CommandPlan) -> Result<(), AutomationError> {
        debug!("Executing plan: {}", plan);
        for (step, action) in plan.actions().iter().enumerate() {
            trace!("step {}: {}", step, action);
            let dispatched = match action {
                InputAction::Keys(keys) => self.backend.send_keys(keys),
                InputAction::Text { text, with_spaces } => {
                    self.backend.send_text(text, *with_spaces)
                }
                InputAction::Settle(phase) => {
                    self.sleeper.sleep(self.timing.get(*phase));
                    Ok(())
                }
            };
            dispatched.map_err(|e| {
                AutomationError::Transient(format!("step {step} ({action}) failed: {e}"))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(k: &str) -> InputAction {
        InputAction::Keys(k.to_string())
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(2), "B");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(52), "AZ");
        assert_eq!(column_letters(703), "AAA");
    }

    #[test]
    fn test_cell_from_parts() {
        assert_eq!(
            CellRef::from_parts(Some(2), Some(2), None).unwrap().address(),
            "B2"
        );
        assert_eq!(
            CellRef::from_parts(Some(9), None, Some("c10")).unwrap().address(),
            "C10"
        );
        let err = CellRef::from_parts(Some(2), None, None).unwrap_err();
        assert!(matches!(err, AutomationError::InvalidArgument(_)));
        assert!(CellRef::from_parts(None, None, None).is_err());
        assert!(CellRef::at(0, 3).is_err());
        assert!(CellRef::address_of("   ").is_err());
    }

    #[test]
    fn test_menu_path_segments_are_upper_cased_with_settle_between() {
        let plan = CommandPlan::menu_path("Home>Insert", &Shortcuts::default()).unwrap();
        assert_eq!(
            plan.actions(),
            &[
                keys("%"),
                keys("HOME"),
                InputAction::Settle(Phase::MenuOperation),
                keys("INSERT"),
                InputAction::Settle(Phase::MenuOperation),
            ]
        );
    }

    #[test]
    fn test_menu_path_single_key() {
        let plan = CommandPlan::menu_path("h", &Shortcuts::default()).unwrap();
        assert_eq!(
            plan.actions(),
            &[keys("%"), keys("H"), InputAction::Settle(Phase::MenuOperation)]
        );
    }

    #[test]
    fn test_menu_path_rejects_empty_segments() {
        let shortcuts = Shortcuts::default();
        assert!(CommandPlan::menu_path("", &shortcuts).is_err());
        assert!(CommandPlan::menu_path("Home>>AutoFit", &shortcuts).is_err());
        assert!(CommandPlan::menu_path("Home> ", &shortcuts).is_err());
    }

    #[test]
    fn test_save_as_types_path_verbatim() {
        let path = r"C:\Users\me\My Book {draft}.xlsx";
        let plan = CommandPlan::save(Some(path), &Shortcuts::default());
        assert!(plan.actions().contains(&InputAction::Text {
            text: path.to_string(),
            with_spaces: true
        }));
        assert_eq!(plan.actions()[0], keys("{F12}"));
    }

    #[test]
    fn test_close_document_answers_prompt() {
        let shortcuts = Shortcuts::default();
        let discard = CommandPlan::close_document(false, &shortcuts);
        assert_eq!(discard.actions()[0], keys("^w"));
        assert_eq!(discard.actions()[2], keys("n"));
        let keep = CommandPlan::close_document(true, &shortcuts);
        assert_eq!(keep.actions()[2], keys("{ENTER}"));
        assert_eq!(
            keep.actions().last(),
            Some(&InputAction::Settle(Phase::DialogWait))
        );
    }

    #[test]
    fn test_plan_display() {
        let plan = CommandPlan::dialog_response("{ESC}");
        assert_eq!(
            plan.to_string(),
            "settle dialog_wait -> keys \"{ESC}\" -> settle dialog_confirm"
        );
    }
}
