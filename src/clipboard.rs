//! Clipboard access for sharing the public key.

use thiserror::Error;

/// Raised when text cannot be placed on the clipboard.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("failed to copy to clipboard: {message}")]
pub struct ClipboardError {
    /// Platform error string.
    pub message: String,
}

/// Destination for text the user should paste elsewhere.
pub trait ClipboardSink {
    /// Replaces the clipboard contents with `text`.
    ///
    /// # Errors
    ///
    /// Returns [`ClipboardError`] when the platform clipboard is unavailable.
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

impl<C: ClipboardSink + ?Sized> ClipboardSink for &mut C {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        (**self).set_text(text)
    }
}

/// System clipboard backed by `arboard`.
///
/// The handle is opened lazily on first use so headless runs that never copy
/// anything do not need a display server.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl std::fmt::Debug for SystemClipboard {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SystemClipboard")
            .field("open", &self.inner.is_some())
            .finish()
    }
}

impl SystemClipboard {
    /// Creates a clipboard handle that connects on first write.
    #[must_use]
    pub const fn new() -> Self {
        Self { inner: None }
    }

    fn handle(&mut self) -> Result<&mut arboard::Clipboard, ClipboardError> {
        if self.inner.is_none() {
            let clipboard = arboard::Clipboard::new().map_err(to_clipboard_error)?;
            self.inner = Some(clipboard);
        }
        self.inner.as_mut().ok_or_else(|| ClipboardError {
            message: String::from("clipboard handle unavailable"),
        })
    }
}

impl ClipboardSink for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.handle()?
            .set_text(text.to_owned())
            .map_err(to_clipboard_error)
    }
}

fn to_clipboard_error(err: arboard::Error) -> ClipboardError {
    ClipboardError {
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryClipboard;

    fn copy_via<C: ClipboardSink>(mut sink: C, text: &str) -> Result<(), ClipboardError> {
        sink.set_text(text)
    }

    #[test]
    fn mutable_references_forward_to_the_sink() {
        let mut clipboard = MemoryClipboard::new();
        copy_via(&mut clipboard, "ssh-rsa AAAA").expect("copy should succeed");
        assert_eq!(clipboard.last().as_deref(), Some("ssh-rsa AAAA"));
    }

    #[test]
    fn error_message_names_the_clipboard() {
        let err = ClipboardError {
            message: String::from("no display"),
        };
        assert_eq!(err.to_string(), "failed to copy to clipboard: no display");
    }
}
