//! COM setup and control type mapping

use crate::platforms::ControlKind;
use crate::AutomationError;
use uiautomation::controls::ControlType;
use uiautomation::UIAutomation;
use windows::core::HRESULT;
use windows::Win32::System::Com::{CoInitializeEx, COINIT_MULTITHREADED};

// RPC_E_CHANGED_MODE: COM is already initialized on this thread
const COM_ALREADY_INITIALIZED: HRESULT = HRESULT(0x80010106u32 as i32);

/// Create a UIAutomation instance, initializing COM for the calling thread first.
pub(crate) fn create_ui_automation_with_com_init() -> Result<UIAutomation, AutomationError> {
    unsafe {
        let hr = CoInitializeEx(None, COINIT_MULTITHREADED);
        if hr.is_err() && hr != COM_ALREADY_INITIALIZED {
            return Err(AutomationError::PlatformError(format!(
                "Failed to initialize COM: {hr}"
            )));
        }
    }

    UIAutomation::new_direct().map_err(|e| AutomationError::PlatformError(e.to_string()))
}

pub(crate) fn to_control_type(kind: ControlKind) -> ControlType {
    match kind {
        ControlKind::Window => ControlType::Window,
        ControlKind::Pane => ControlType::Pane,
        ControlKind::Document => ControlType::Document,
        ControlKind::Edit => ControlType::Edit,
        ControlKind::MenuBar => ControlType::MenuBar,
        ControlKind::MenuItem => ControlType::MenuItem,
        ControlKind::Button => ControlType::Button,
    }
}

pub(crate) fn from_control_type(control_type: ControlType) -> Option<ControlKind> {
    match control_type {
        ControlType::Window => Some(ControlKind::Window),
        ControlType::Pane => Some(ControlKind::Pane),
        ControlType::Document => Some(ControlKind::Document),
        ControlType::Edit => Some(ControlKind::Edit),
        ControlType::MenuBar => Some(ControlKind::MenuBar),
        ControlType::MenuItem => Some(ControlKind::MenuItem),
        ControlType::Button => Some(ControlKind::Button),
        _ => None,
    }
}
