// crates/clipdrop-core/src/media.rs
//
// MediaUnit: one piece of content on its way into the project.
//
// ── Lifecycle ────────────────────────────────────────────────────────────────
//
//   created by a handler    type tag + optional source path / held content
//        │
//   save(folder, codecs)
//        ├─ resolve catcher   per-unit override, else CodecTable, else UnsupportedType
//        ├─ resolve saver     same lookup
//        ├─ catch             fill `content` (read file, pull clipboard, download…)
//        ├─ sequence          next_sequence(folder)
//        └─ write             `{seq}.{ext}` via the saver
//        │
//   saved                   display_name() / destination() now succeed
//
// `repoint` swaps the unit onto a different file (an external tool's output)
// and returns it to the unsaved state so it is saved again under a fresh
// number.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use crate::error::{PasteError, Result};
use crate::sequence::next_sequence;
use crate::snapshot::{Bitmap, ContentSnapshot};

// ── TypeTag ───────────────────────────────────────────────────────────────────

/// MIME-like media type driving catcher/saver selection.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(Cow<'static, str>);

impl TypeTag {
    pub const IMAGE: TypeTag = TypeTag(Cow::Borrowed("image/png"));
    pub const TEXT:  TypeTag = TypeTag(Cow::Borrowed("text/plain"));
    pub const URL:   TypeTag = TypeTag(Cow::Borrowed("text/url"));
    pub const VIDEO: TypeTag = TypeTag(Cow::Borrowed("video/mp4"));
    pub const FILE:  TypeTag = TypeTag(Cow::Borrowed("application/octet-stream"));

    pub fn new(tag: impl Into<String>) -> Self {
        TypeTag(Cow::Owned(tag.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.0)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Content ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default)]
pub enum Content {
    #[default]
    Empty,
    Text(String),
    Bytes(Vec<u8>),
    Bitmap(Bitmap),
}

impl Content {
    pub fn is_empty(&self) -> bool {
        match self {
            Content::Empty     => true,
            Content::Text(s)   => s.is_empty(),
            Content::Bytes(b)  => b.is_empty(),
            Content::Bitmap(_) => false,
        }
    }
}

// ── Catch / save functions ────────────────────────────────────────────────────

/// Fills `media.content` (and optionally its mime) from wherever the content
/// lives.
pub trait Catcher: Send + Sync {
    fn catch(&self, media: &mut MediaUnit) -> Result<()>;
}

impl<F> Catcher for F
where
    F: Fn(&mut MediaUnit) -> Result<()> + Send + Sync,
{
    fn catch(&self, media: &mut MediaUnit) -> Result<()> {
        self(media)
    }
}

/// Persists caught content. `extension` is asked first so the sequence
/// number and the extension land in the filename together.
pub trait Saver: Send + Sync {
    fn extension(&self, media: &MediaUnit) -> String;
    fn write(&self, media: &MediaUnit, dest: &Path) -> Result<()>;
}

/// Built-in catch/save functions keyed by type tag. Built once per session
/// and shared read-only through the handler context.
#[derive(Clone, Default)]
pub struct CodecTable {
    catchers: HashMap<TypeTag, Arc<dyn Catcher>>,
    savers:   HashMap<TypeTag, Arc<dyn Saver>>,
}

impl CodecTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catcher(mut self, tag: TypeTag, catcher: impl Catcher + 'static) -> Self {
        self.catchers.insert(tag, Arc::new(catcher));
        self
    }

    pub fn with_saver(mut self, tag: TypeTag, saver: impl Saver + 'static) -> Self {
        self.savers.insert(tag, Arc::new(saver));
        self
    }

    pub fn catcher(&self, tag: &TypeTag) -> Option<Arc<dyn Catcher>> {
        self.catchers.get(tag).cloned()
    }

    pub fn saver(&self, tag: &TypeTag) -> Option<Arc<dyn Saver>> {
        self.savers.get(tag).cloned()
    }

    pub fn tags(&self) -> impl Iterator<Item = &TypeTag> {
        self.catchers.keys().filter(|t| self.savers.contains_key(*t))
    }
}

// ── MediaUnit ─────────────────────────────────────────────────────────────────

/// Name and location of a saved unit. Set as one value so the display name
/// and destination can never disagree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedFile {
    pub sequence:  u64,
    pub extension: String,
    pub path:      PathBuf,
}

impl SavedFile {
    pub fn display_name(&self) -> String {
        format!("{}.{}", self.sequence, self.extension)
    }
}

pub struct MediaUnit {
    pub content: Content,
    type_tag:    TypeTag,
    source_path: Option<PathBuf>,
    /// Real content type learned while catching (e.g. a download's header).
    mime:        Option<String>,
    clipboard:   Option<ContentSnapshot>,
    saved:       Option<SavedFile>,
    catchers:    HashMap<TypeTag, Arc<dyn Catcher>>,
    savers:      HashMap<TypeTag, Arc<dyn Saver>>,
}

impl MediaUnit {
    pub fn new(type_tag: TypeTag) -> Self {
        Self {
            content:     Content::Empty,
            type_tag,
            source_path: None,
            mime:        None,
            clipboard:   None,
            saved:       None,
            catchers:    HashMap::new(),
            savers:      HashMap::new(),
        }
    }

    pub fn from_path(type_tag: TypeTag, path: impl Into<PathBuf>) -> Self {
        let mut m = Self::new(type_tag);
        m.source_path = Some(path.into());
        m
    }

    pub fn from_text(type_tag: TypeTag, text: impl Into<String>) -> Self {
        let mut m = Self::new(type_tag);
        m.content = Content::Text(text.into());
        m
    }

    /// Let catchers re-pull content from the session clipboard.
    pub fn with_clipboard(mut self, snapshot: ContentSnapshot) -> Self {
        self.clipboard = Some(snapshot);
        self
    }

    pub fn with_catcher(mut self, tag: TypeTag, catcher: impl Catcher + 'static) -> Self {
        self.catchers.insert(tag, Arc::new(catcher));
        self
    }

    pub fn with_saver(mut self, tag: TypeTag, saver: impl Saver + 'static) -> Self {
        self.savers.insert(tag, Arc::new(saver));
        self
    }

    pub fn type_tag(&self) -> &TypeTag {
        &self.type_tag
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn mime(&self) -> Option<&str> {
        self.mime.as_deref()
    }

    pub fn set_mime(&mut self, mime: impl Into<String>) {
        self.mime = Some(mime.into());
    }

    pub fn clipboard(&self) -> Option<&ContentSnapshot> {
        self.clipboard.as_ref()
    }

    pub fn saved(&self) -> Option<&SavedFile> {
        self.saved.as_ref()
    }

    /// `{sequence}.{extension}` of the saved file.
    pub fn display_name(&self) -> Result<String> {
        self.saved.as_ref().map(SavedFile::display_name).ok_or(PasteError::NotSaved)
    }

    pub fn destination(&self) -> Result<&Path> {
        self.saved.as_ref().map(|s| s.path.as_path()).ok_or(PasteError::NotSaved)
    }

    /// Point the unit at a new file and type. Held content and the saved
    /// state are dropped; the next `save` catches from `path`.
    pub fn repoint(&mut self, type_tag: TypeTag, path: impl Into<PathBuf>) {
        let path = path.into();
        debug!(from = ?self.source_path, to = %path.display(), "repoint media unit");
        self.type_tag    = type_tag;
        self.source_path = Some(path);
        self.content     = Content::Empty;
        self.mime        = None;
        self.saved       = None;
    }

    /// Catch and write the unit into `folder` under the next sequence number.
    pub fn save(&mut self, folder: &Path, codecs: &CodecTable) -> Result<PathBuf> {
        let tag = self.type_tag.clone();
        let catcher = self
            .catchers
            .get(&tag)
            .cloned()
            .or_else(|| codecs.catcher(&tag))
            .ok_or_else(|| PasteError::UnsupportedType(tag.to_string()))?;
        let saver = self
            .savers
            .get(&tag)
            .cloned()
            .or_else(|| codecs.saver(&tag))
            .ok_or_else(|| PasteError::UnsupportedType(tag.to_string()))?;

        catcher.catch(self)?;

        fs::create_dir_all(folder).map_err(|e| PasteError::io(folder, e))?;
        let extension = saver.extension(self);
        let sequence  = next_sequence(folder).map_err(|e| PasteError::io(folder, e))?;
        let path      = folder.join(format!("{sequence}.{extension}"));
        if let Err(e) = saver.write(self, &path) {
            // A half-written file would claim the sequence number.
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed partial asset"),
                Err(rm) if rm.kind() == std::io::ErrorKind::NotFound => {}
                Err(rm) => warn!(path = %path.display(), "partial asset left behind: {rm}"),
            }
            return Err(e);
        }

        info!(media = %tag, path = %path.display(), "saved media");
        self.saved = Some(SavedFile { sequence, extension, path: path.clone() });
        Ok(path)
    }
}

impl fmt::Debug for MediaUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaUnit")
            .field("type_tag", &self.type_tag)
            .field("source_path", &self.source_path)
            .field("mime", &self.mime)
            .field("saved", &self.saved)
            .finish_non_exhaustive()
    }
}
