// crates/clipdrop-core/src/handler.rs
//
// Handler contract.
//
// ── Layers ───────────────────────────────────────────────────────────────────
//
//   HandlerSource   something that can produce a factory (a built-in module,
//                   a manifest on disk). Loading may fail; discovery isolates it.
//
//   HandlerFactory  registry entry. Knows its id and default config, builds a
//                   Handler bound to the session context and its private store.
//
//   Handler         one per session. Answers applicability, install state,
//                   and turns the clipboard into a MediaUnit.
//
// UI-facing seams (InstallGuide, FocusGuard, ActionSelector) are declared here
// so the dispatcher can drive them without knowing about egui.

use std::sync::Arc;
use crate::config::{ConfigMap, ConfigStore};
use crate::context::HandlerContext;
use crate::error::Result;
use crate::formats::FormatSet;
use crate::media::MediaUnit;
use crate::snapshot::ContentSnapshot;

pub trait Handler: Send {
    /// Button text.
    fn label(&self) -> String;

    /// Pure: same tags, same answer.
    fn check_condition(&self, tags: &FormatSet) -> bool;

    fn is_installed(&self) -> bool {
        true
    }

    /// Guide the user through installing whatever the handler needs.
    fn install(&mut self, guide: &mut dyn InstallGuide) -> Result<()> {
        let _ = guide;
        Ok(())
    }

    fn execute(&mut self, snapshot: &ContentSnapshot) -> Result<MediaUnit>;
}

pub trait HandlerFactory: Send + Sync {
    fn id(&self) -> &str;

    /// Merged into the handler's store; keys already present are kept.
    fn default_config(&self, ctx: &HandlerContext) -> ConfigMap {
        let _ = ctx;
        ConfigMap::new()
    }

    fn build(&self, ctx: &HandlerContext, config: ConfigStore) -> Result<Box<dyn Handler>>;
}

pub trait HandlerSource {
    /// Name used in discovery logs and failure reports.
    fn name(&self) -> String;
    fn load(&self) -> Result<Arc<dyn HandlerFactory>>;
}

/// Install-flow dialogs.
pub trait InstallGuide {
    /// Yes/no question; `true` means the user agreed.
    fn confirm(&mut self, title: &str, message: &str) -> bool;
    fn open_url(&mut self, url: &str) -> Result<()>;
    fn notify(&mut self, title: &str, message: &str);
}

/// The selector window closes itself when it loses focus; install-flow turns
/// that off while its own dialogs are up.
pub trait FocusGuard {
    fn set_dismiss_on_focus_loss(&mut self, enabled: bool);
}

/// A button the user can press.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OfferedAction {
    pub id:        String,
    pub label:     String,
    pub installed: bool,
}

/// Blocking action picker used by `Dispatcher::run`.
pub trait ActionSelector: FocusGuard {
    /// `None` means the user dismissed the selector.
    fn choose(&mut self, actions: &[OfferedAction]) -> Option<String>;
}
