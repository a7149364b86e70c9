// crates/clipdrop-media/src/codecs.rs
//
// Built-in catch/save functions, one pair per media type:
//
//   image/png                 file bytes or clipboard bitmap  → .png
//   text/plain                held text or clipboard          → .txt (UTF-8)
//                             dropped file                    → verbatim copy
//   text/url                  HTTP GET                        → ext from Content-Type
//   video/mp4                 existing file                   → verbatim copy
//   application/octet-stream  existing file                   → verbatim copy
//
// Handlers can override any of these per MediaUnit.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use clipdrop_core::error::{PasteError, Result};
use clipdrop_core::media::{CodecTable, Content, MediaUnit, Saver, TypeTag};
use clipdrop_core::snapshot::Bitmap;
use tracing::debug;
use crate::fetch::Fetch;
use crate::mime::extension_for;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

pub fn builtin_codecs(fetch: Arc<dyn Fetch>) -> CodecTable {
    CodecTable::new()
        .with_catcher(TypeTag::IMAGE, catch_image)
        .with_saver(TypeTag::IMAGE, PngSaver)
        .with_catcher(TypeTag::TEXT, catch_text)
        .with_saver(TypeTag::TEXT, TextSaver)
        .with_catcher(TypeTag::URL, UrlCatcher { fetch })
        .with_saver(TypeTag::URL, BytesSaver)
        .with_catcher(TypeTag::VIDEO, catch_existing_file)
        .with_saver(TypeTag::VIDEO, CopySaver { fallback: "mp4" })
        .with_catcher(TypeTag::FILE, catch_existing_file)
        .with_saver(TypeTag::FILE, CopySaver { fallback: "bin" })
}

// ── Image ─────────────────────────────────────────────────────────────────────

fn catch_image(media: &mut MediaUnit) -> Result<()> {
    if let Some(path) = media.source_path() {
        if !path.is_file() {
            return Err(PasteError::MissingSource(path.display().to_string()));
        }
        let bytes = fs::read(path).map_err(|e| PasteError::io(path, e))?;
        media.content = Content::Bytes(bytes);
        return Ok(());
    }
    if matches!(media.content, Content::Bitmap(_) | Content::Bytes(_)) {
        return Ok(());
    }
    let bitmap = media
        .clipboard()
        .and_then(|c| c.bitmap())
        .ok_or(PasteError::NoCompatibleFormat)?;
    media.content = Content::Bitmap(bitmap);
    Ok(())
}

struct PngSaver;

impl Saver for PngSaver {
    fn extension(&self, _media: &MediaUnit) -> String {
        "png".into()
    }

    fn write(&self, media: &MediaUnit, dest: &Path) -> Result<()> {
        match &media.content {
            Content::Bitmap(bitmap) => write_png(bitmap, dest),
            Content::Bytes(bytes) if bytes.starts_with(&PNG_SIGNATURE) => {
                fs::write(dest, bytes).map_err(|e| PasteError::io(dest, e))
            }
            Content::Bytes(bytes) => {
                // JPEG/BMP/WebP sources are re-encoded so the asset matches its name.
                let decoded = image::load_from_memory(bytes)
                    .map_err(|e| PasteError::Image(format!("cannot decode image: {e}")))?
                    .to_rgba8();
                let (width, height) = decoded.dimensions();
                let bitmap = Bitmap::new(width, height, decoded.into_raw())
                    .ok_or_else(|| PasteError::Image("decoded image is empty".into()))?;
                write_png(&bitmap, dest)
            }
            _ => Err(PasteError::NoCompatibleFormat),
        }
    }
}

/// Encode an RGBA bitmap as 8-bit PNG.
pub fn write_png(bitmap: &Bitmap, dest: &Path) -> Result<()> {
    let img_err = |e: png::EncodingError| PasteError::Image(format!("PNG encode failed: {e}"));

    let file = File::create(dest).map_err(|e| PasteError::io(dest, e))?;
    let w    = &mut BufWriter::new(file);
    let mut encoder = png::Encoder::new(w, bitmap.width, bitmap.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().map_err(img_err)?;
    writer.write_image_data(&bitmap.rgba).map_err(img_err)?;
    writer.finish().map_err(img_err)?;
    debug!(path = %dest.display(), w = bitmap.width, h = bitmap.height, "PNG written");
    Ok(())
}

// ── Text ──────────────────────────────────────────────────────────────────────

fn catch_text(media: &mut MediaUnit) -> Result<()> {
    // Dropped files may be UTF-16 or Latin-1; they are copied, not decoded.
    if media.source_path().is_some() {
        return catch_existing_file(media);
    }
    if matches!(&media.content, Content::Text(t) if !t.is_empty()) {
        return Ok(());
    }
    let text = media
        .clipboard()
        .and_then(|c| c.text())
        .ok_or(PasteError::NoCompatibleFormat)?;
    media.content = Content::Text(text);
    Ok(())
}

struct TextSaver;

const TEXT_FILE: CopySaver = CopySaver { fallback: "txt" };

impl Saver for TextSaver {
    fn extension(&self, media: &MediaUnit) -> String {
        TEXT_FILE.extension(media)
    }

    fn write(&self, media: &MediaUnit, dest: &Path) -> Result<()> {
        match &media.content {
            Content::Text(text) => fs::write(dest, text.as_bytes()).map_err(|e| PasteError::io(dest, e)),
            _ if media.source_path().is_some() => TEXT_FILE.write(media, dest),
            _ => Err(PasteError::NoCompatibleFormat),
        }
    }
}

// ── URL ───────────────────────────────────────────────────────────────────────

struct UrlCatcher {
    fetch: Arc<dyn Fetch>,
}

impl clipdrop_core::media::Catcher for UrlCatcher {
    fn catch(&self, media: &mut MediaUnit) -> Result<()> {
        let raw = match &media.content {
            Content::Text(t) => t.trim().to_string(),
            _ => media
                .clipboard()
                .and_then(|c| c.text())
                .map(|t| t.trim().to_string())
                .ok_or(PasteError::NoCompatibleFormat)?,
        };
        let url = parse_web_url(&raw).ok_or_else(|| PasteError::Fetch {
            url:     raw.clone(),
            message: "not an http(s) URL".into(),
        })?;

        let fetched = self.fetch.get(url.as_str())?;
        let mime = fetched
            .content_type
            .filter(|ct| !ct.trim().is_empty())
            .or_else(|| mime_guess::from_path(url.path()).first().map(|m| m.to_string()))
            .unwrap_or_else(|| "application/octet-stream".into());
        media.set_mime(mime);
        media.content = Content::Bytes(fetched.bytes);
        Ok(())
    }
}

/// `Some` for absolute http/https URLs only.
pub fn parse_web_url(text: &str) -> Option<url::Url> {
    let url = url::Url::parse(text.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

struct BytesSaver;

impl Saver for BytesSaver {
    fn extension(&self, media: &MediaUnit) -> String {
        media.mime().map(extension_for).unwrap_or_else(|| "bin".into())
    }

    fn write(&self, media: &MediaUnit, dest: &Path) -> Result<()> {
        let Content::Bytes(bytes) = &media.content else {
            return Err(PasteError::NoCompatibleFormat);
        };
        fs::write(dest, bytes).map_err(|e| PasteError::io(dest, e))
    }
}

// ── Files ─────────────────────────────────────────────────────────────────────

/// Large media is copied at save time rather than held in memory.
fn catch_existing_file(media: &mut MediaUnit) -> Result<()> {
    match media.source_path() {
        Some(path) if path.is_file() => Ok(()),
        Some(path) => Err(PasteError::MissingSource(path.display().to_string())),
        None => Err(PasteError::MissingSource(media.type_tag().to_string())),
    }
}

struct CopySaver {
    fallback: &'static str,
}

impl Saver for CopySaver {
    fn extension(&self, media: &MediaUnit) -> String {
        media
            .source_path()
            .and_then(|p| p.extension())
            .map(|e| e.to_string_lossy().to_lowercase())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| self.fallback.to_string())
    }

    fn write(&self, media: &MediaUnit, dest: &Path) -> Result<()> {
        let src = media
            .source_path()
            .ok_or_else(|| PasteError::MissingSource(media.type_tag().to_string()))?;
        fs::copy(src, dest).map_err(|e| PasteError::io(src, e))?;
        Ok(())
    }
}
