// crates/clipdrop-media/src/handlers/paste.rs
//
// Plain paste: whatever is on the clipboard goes into the project as-is.
//
//   file drop  first file, typed by extension (image / video / text / other)
//   bitmap     encoded to PNG
//   text       a web URL is downloaded; anything else is saved as .txt

use clipdrop_core::config::{ConfigMap, ConfigStore};
use clipdrop_core::context::HandlerContext;
use clipdrop_core::error::{PasteError, Result};
use clipdrop_core::formats::{intersects, FormatSet, FormatTag};
use clipdrop_core::handler::{Handler, HandlerFactory};
use clipdrop_core::media::{MediaUnit, TypeTag};
use clipdrop_core::snapshot::ContentSnapshot;
use tracing::{info, warn};
use crate::codecs::parse_web_url;
use crate::mime::type_tag_for_path;

pub const ACCEPTS: [FormatTag; 3] = [FormatTag::TEXT, FormatTag::BITMAP, FormatTag::FILE_DROP];
const DEFAULT_LABEL: &str = "Paste";

#[derive(Default)]
pub struct PasteFactory;

impl HandlerFactory for PasteFactory {
    fn id(&self) -> &str {
        "paste"
    }

    fn default_config(&self, _ctx: &HandlerContext) -> ConfigMap {
        let mut m = ConfigMap::new();
        m.insert("label".into(), DEFAULT_LABEL.into());
        m.insert("downloadUrls".into(), true.into());
        m
    }

    fn build(&self, _ctx: &HandlerContext, config: ConfigStore) -> Result<Box<dyn Handler>> {
        Ok(Box::new(PasteHandler { config }))
    }
}

pub struct PasteHandler {
    config: ConfigStore,
}

impl Handler for PasteHandler {
    fn label(&self) -> String {
        self.config.read_str("label").unwrap_or_else(|_| DEFAULT_LABEL.into())
    }

    fn check_condition(&self, tags: &FormatSet) -> bool {
        intersects(tags, &ACCEPTS)
    }

    fn execute(&mut self, snapshot: &ContentSnapshot) -> Result<MediaUnit> {
        if snapshot.has(FormatTag::FILE_DROP) {
            let files = snapshot.file_list();
            if let Some(first) = files.first() {
                if files.len() > 1 {
                    warn!(skipped = files.len() - 1, "only the first dropped file is pasted");
                }
                let tag = type_tag_for_path(first);
                info!(file = %first.display(), media = %tag, "pasting dropped file");
                return Ok(MediaUnit::from_path(tag, first.clone()));
            }
        }

        if snapshot.has(FormatTag::BITMAP) {
            info!("pasting clipboard bitmap");
            return Ok(MediaUnit::new(TypeTag::IMAGE).with_clipboard(snapshot.clone()));
        }

        if snapshot.has(FormatTag::TEXT) {
            let text = snapshot.text().ok_or(PasteError::NoCompatibleFormat)?;
            let download = self.config.read_bool("downloadUrls").unwrap_or(true);
            if download && parse_web_url(&text).is_some() {
                info!(url = text.trim(), "pasting URL");
                return Ok(MediaUnit::from_text(TypeTag::URL, text.trim()));
            }
            info!(chars = text.chars().count(), "pasting text");
            return Ok(MediaUnit::from_text(TypeTag::TEXT, text));
        }

        Err(PasteError::NoCompatibleFormat)
    }
}
