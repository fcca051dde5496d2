//! Handles the UIA backend shares across threads, and how UIA failures surface.
//!
//! `AppDriver` runs on whichever thread the caller (or the CLI's blocking pool) picks,
//! so the backend's COM objects have to be `Send + Sync`.

use crate::AutomationError;
use std::sync::Arc;
use uiautomation::UIAutomation;

/// The one `IUIAutomation` client a `WindowsBackend` searches through.
#[derive(Clone)]
pub struct SharedAutomation(pub Arc<UIAutomation>);

// SAFETY: created after COM init in the multithreaded apartment, where UIA
// interface pointers may be called from any thread.
unsafe impl Send for SharedAutomation {}
unsafe impl Sync for SharedAutomation {}

/// A found window or control, held in the backend registry under its `WindowRef.id`
/// until released.
#[derive(Clone)]
pub(crate) struct RegisteredElement(pub(crate) Arc<uiautomation::UIElement>);

// SAFETY: same apartment as `SharedAutomation`; only touched through registry lookups.
unsafe impl Send for RegisteredElement {}
unsafe impl Sync for RegisteredElement {}

/// UIA calls fail when the tree changes under a search, so these count as transient.
impl From<uiautomation::Error> for AutomationError {
    fn from(error: uiautomation::Error) -> Self {
        AutomationError::PlatformError(format!("UI Automation call failed: {error}"))
    }
}
