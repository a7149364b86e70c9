// crates/clipdrop-core/src/snapshot.rs
//
// Read-only view of the clipboard for one session.
//
// The format list is captured once, up front, and never changes for the rest
// of the session. Content is pulled lazily through the accessors; a failing
// pull is logged and reported as absent so handlers only ever see "there" or
// "not there". Only a failure to read the format list is fatal.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use crate::error::Result;
use crate::formats::{FormatSet, FormatTag};

/// Decoded clipboard bitmap, tightly packed RGBA8.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width:  u32,
    pub height: u32,
    pub rgba:   Vec<u8>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        let expected = (width as usize).checked_mul(height as usize)?.checked_mul(4)?;
        (rgba.len() == expected && width > 0 && height > 0).then_some(Self { width, height, rgba })
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitmap({}x{})", self.width, self.height)
    }
}

/// Platform clipboard reader.
pub trait ClipboardSource: Send + Sync {
    /// Fails with `ClipboardAccess` when the clipboard cannot be opened.
    fn format_tags(&self) -> Result<FormatSet>;
    fn text(&self) -> Result<Option<String>>;
    fn bitmap(&self) -> Result<Option<Bitmap>>;
    fn file_list(&self) -> Result<Vec<PathBuf>>;
}

// ── ContentSnapshot ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ContentSnapshot {
    tags:   Arc<FormatSet>,
    source: Arc<dyn ClipboardSource>,
}

impl ContentSnapshot {
    pub fn capture(source: Arc<dyn ClipboardSource>) -> Result<Self> {
        let tags = source.format_tags()?;
        tracing::info!(formats = ?tags.iter().map(|t| t.0).collect::<Vec<_>>(), "clipboard snapshot");
        Ok(Self { tags: Arc::new(tags), source })
    }

    pub fn format_tags(&self) -> &FormatSet {
        &self.tags
    }

    pub fn has(&self, tag: FormatTag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn text(&self) -> Option<String> {
        match self.source.text() {
            Ok(t) => t.filter(|s| !s.is_empty()),
            Err(e) => {
                warn!("clipboard text unavailable: {e}");
                None
            }
        }
    }

    pub fn bitmap(&self) -> Option<Bitmap> {
        match self.source.bitmap() {
            Ok(b) => b,
            Err(e) => {
                warn!("clipboard bitmap unavailable: {e}");
                None
            }
        }
    }

    pub fn file_list(&self) -> Vec<PathBuf> {
        match self.source.file_list() {
            Ok(files) => files,
            Err(e) => {
                warn!("clipboard file list unavailable: {e}");
                Vec::new()
            }
        }
    }
}

impl fmt::Debug for ContentSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentSnapshot").field("tags", &self.tags).finish()
    }
}

// ── MemoryClipboard ───────────────────────────────────────────────────────────

/// Fixed clipboard contents. Used for `--file` invocations and in tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryClipboard {
    tags:   FormatSet,
    text:   Option<String>,
    bitmap: Option<Bitmap>,
    files:  Vec<PathBuf>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.tags.insert(FormatTag::TEXT);
        self.text = Some(text.into());
        self
    }

    pub fn with_bitmap(mut self, bitmap: Bitmap) -> Self {
        self.tags.insert(FormatTag::BITMAP);
        self.bitmap = Some(bitmap);
        self
    }

    pub fn with_files<I: IntoIterator<Item = PathBuf>>(mut self, files: I) -> Self {
        self.tags.insert(FormatTag::FILE_DROP);
        self.files.extend(files);
        self
    }

    /// Advertise a tag without any content behind it.
    pub fn with_tag(mut self, tag: FormatTag) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn into_snapshot(self) -> ContentSnapshot {
        ContentSnapshot {
            tags:   Arc::new(self.tags.clone()),
            source: Arc::new(self),
        }
    }
}

impl ClipboardSource for MemoryClipboard {
    fn format_tags(&self) -> Result<FormatSet> {
        Ok(self.tags.clone())
    }

    fn text(&self) -> Result<Option<String>> {
        Ok(self.text.clone())
    }

    fn bitmap(&self) -> Result<Option<Bitmap>> {
        Ok(self.bitmap.clone())
    }

    fn file_list(&self) -> Result<Vec<PathBuf>> {
        Ok(self.files.clone())
    }
}
