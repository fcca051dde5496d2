//! Synthetic keyboard input to whichever window holds focus

use crate::AutomationError;
use tracing::debug;
use uiautomation::inputs::Keyboard;

// Delay between individual key events in milliseconds
const KEY_INTERVAL_MS: u64 = 10;

pub(crate) fn send_keys(keys: &str) -> Result<(), AutomationError> {
    debug!("send_keys: {:?}", keys);
    Keyboard::new()
        .interval(KEY_INTERVAL_MS)
        .send_keys(keys)
        .map_err(|e| AutomationError::Transient(format!("Failed to send keys {keys:?}: {e}")))
}

pub(crate) fn send_text(text: &str, with_spaces: bool) -> Result<(), AutomationError> {
    let text = if with_spaces {
        text.to_string()
    } else {
        text.chars().filter(|c| *c != ' ').collect()
    };
    debug!("send_text: {} chars", text.chars().count());
    Keyboard::new()
        .interval(KEY_INTERVAL_MS)
        .send_text(&text)
        .map_err(|e| AutomationError::Transient(format!("Failed to type text: {e}")))
}
