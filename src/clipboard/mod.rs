use std::rc::Rc;

use gtk4::gdk;
use gtk4::gdk::prelude::*;
use gtk4::glib;
use thiserror::Error;

const MIME_IMAGE_PNG: &str = "image/png";

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("failed to access default display for clipboard operations")]
    DisplayUnavailable,
    #[error("refusing to copy empty text")]
    EmptyText,
    #[error("failed to set clipboard content: {source}")]
    SetContent {
        #[source]
        source: glib::BoolError,
    },
}

pub type ClipboardResult<T> = std::result::Result<T, ClipboardError>;

/// Platform clipboard. Implementations may require the UI thread.
pub trait ClipboardBackend {
    fn set_text(&self, text: &str) -> ClipboardResult<()>;
    fn set_png(&self, png: &[u8]) -> ClipboardResult<()>;
}

impl<T: ClipboardBackend + ?Sized> ClipboardBackend for Rc<T> {
    fn set_text(&self, text: &str) -> ClipboardResult<()> {
        (**self).set_text(text)
    }

    fn set_png(&self, png: &[u8]) -> ClipboardResult<()> {
        (**self).set_png(png)
    }
}

/// Clipboard of the default GDK display. Only valid on the GTK main thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct GdkClipboard;

impl GdkClipboard {
    fn clipboard() -> ClipboardResult<gdk::Clipboard> {
        let display = gdk::Display::default().ok_or(ClipboardError::DisplayUnavailable)?;
        Ok(display.clipboard())
    }
}

impl ClipboardBackend for GdkClipboard {
    fn set_text(&self, text: &str) -> ClipboardResult<()> {
        if text.is_empty() {
            return Err(ClipboardError::EmptyText);
        }
        Self::clipboard()?.set_text(text);
        Ok(())
    }

    fn set_png(&self, png: &[u8]) -> ClipboardResult<()> {
        let provider = gdk::ContentProvider::for_bytes(
            MIME_IMAGE_PNG,
            &glib::Bytes::from_owned(png.to_vec()),
        );
        Self::clipboard()?
            .set_content(Some(&provider))
            .map_err(|source| ClipboardError::SetContent { source })
    }
}
