// crates/clipdrop-ui/src/clipboard.rs
//
// System clipboard through clipboard-rs, mapped onto the three format tags
// the handlers understand:
//
//   ContentFormat::Text   → 1
//   ContentFormat::Image  → 2   (decoded to RGBA via its PNG encoding)
//   ContentFormat::Files  → 15

use std::path::PathBuf;
use clipboard_rs::common::RustImage;
use clipboard_rs::{Clipboard, ClipboardContext, ContentFormat};
use clipdrop_core::error::{PasteError, Result};
use clipdrop_core::formats::{FormatSet, FormatTag};
use clipdrop_core::snapshot::{Bitmap, ClipboardSource};
use parking_lot::Mutex;
use tracing::debug;
use url::Url;

pub struct SystemClipboard {
    inner: Mutex<ClipboardContext>,
}

impl SystemClipboard {
    pub fn new() -> Result<Self> {
        let ctx = ClipboardContext::new().map_err(|e| PasteError::ClipboardAccess(e.to_string()))?;
        Ok(Self { inner: Mutex::new(ctx) })
    }
}

impl ClipboardSource for SystemClipboard {
    fn format_tags(&self) -> Result<FormatSet> {
        let ctx = self.inner.lock();
        let mut tags = FormatSet::new();
        if ctx.has(ContentFormat::Text) {
            tags.insert(FormatTag::TEXT);
        }
        if ctx.has(ContentFormat::Image) {
            tags.insert(FormatTag::BITMAP);
        }
        if ctx.has(ContentFormat::Files) {
            tags.insert(FormatTag::FILE_DROP);
        }
        debug!(?tags, "clipboard formats");
        Ok(tags)
    }

    fn text(&self) -> Result<Option<String>> {
        let ctx = self.inner.lock();
        if !ctx.has(ContentFormat::Text) {
            return Ok(None);
        }
        ctx.get_text()
            .map(Some)
            .map_err(|e| PasteError::ClipboardAccess(e.to_string()))
    }

    fn bitmap(&self) -> Result<Option<Bitmap>> {
        let ctx = self.inner.lock();
        if !ctx.has(ContentFormat::Image) {
            return Ok(None);
        }
        let img = ctx.get_image().map_err(|e| PasteError::ClipboardAccess(e.to_string()))?;
        let png = img.to_png().map_err(|e| PasteError::Image(e.to_string()))?;
        let rgba = image::load_from_memory(png.get_bytes())
            .map_err(|e| PasteError::Image(e.to_string()))?
            .to_rgba8();
        let (width, height) = rgba.dimensions();
        Bitmap::new(width, height, rgba.into_raw())
            .map(Some)
            .ok_or_else(|| PasteError::Image("clipboard image has an inconsistent size".into()))
    }

    fn file_list(&self) -> Result<Vec<PathBuf>> {
        let ctx = self.inner.lock();
        if !ctx.has(ContentFormat::Files) {
            return Ok(Vec::new());
        }
        let files = ctx.get_files().map_err(|e| PasteError::ClipboardAccess(e.to_string()))?;
        Ok(files.into_iter().map(|f| file_uri_to_path(&f)).collect())
    }
}

/// Linux clipboards hand out `file://` URIs; Windows and macOS give paths.
fn file_uri_to_path(entry: &str) -> PathBuf {
    if entry.starts_with("file://") {
        if let Some(path) = Url::parse(entry).ok().and_then(|u| u.to_file_path().ok()) {
            return path;
        }
    }
    PathBuf::from(entry)
}
