use arboard::Clipboard;
use tracing::{debug, warn};

/// System clipboard, if one is reachable from this terminal session
pub struct ClipboardManager {
    clipboard: Option<Clipboard>,
}

impl ClipboardManager {
    pub fn new() -> Self {
        let clipboard = match Clipboard::new() {
            Ok(clipboard) => Some(clipboard),
            Err(err) => {
                warn!(error = %err, "system clipboard unavailable");
                None
            }
        };
        Self { clipboard }
    }

    /// Write `text` as-is. Returns false when there is no clipboard or the
    /// write failed.
    pub fn copy(&mut self, text: &str) -> bool {
        let Some(clipboard) = self.clipboard.as_mut() else {
            return false;
        };
        match clipboard.set_text(text) {
            Ok(()) => {
                debug!(chars = text.len(), "copied to clipboard");
                true
            }
            Err(err) => {
                warn!(error = %err, "clipboard write failed");
                false
            }
        }
    }
}

impl Default for ClipboardManager {
    fn default() -> Self {
        Self::new()
    }
}
