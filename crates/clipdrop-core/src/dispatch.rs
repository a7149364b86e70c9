// crates/clipdrop-core/src/dispatch.rs
//
// Session state machine.
//
//   Idle ──instantiate──▶ Discovered ──offer──▶ Offering
//                                                 │  select(id)
//                       ┌─────────────────────────┴───────────────┐
//                       ▼ not installed                            ▼ installed
//                  Installing ──(dialogs done)──▶ Offering    Executing
//                                                                  │
//                                                   Imported ◀─────┴─────▶ Failed
//   Offering ──dismiss──▶ Dismissed
//
// Execute-flow runs handler.execute → MediaUnit::save into the project asset
// folder → import into the configured bin → append to the timeline. Files
// and imported items from a partly finished execute are left in place.

use tracing::{error, info, warn};
use crate::context::HandlerContext;
use crate::error::{PasteError, Result};
use crate::handler::{ActionSelector, FocusGuard, Handler, InstallGuide, OfferedAction};
use crate::registry::{DiscoveryFailure, Registry};
use crate::workspace::{import_media, ImportReport, Workspace};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Discovered,
    Offering,
    Installing(String),
    Executing(String),
    Imported(ImportReport),
    Failed(String),
    Dismissed,
}

impl SessionState {
    pub fn is_finished(&self) -> bool {
        matches!(self, SessionState::Imported(_) | SessionState::Failed(_) | SessionState::Dismissed)
    }
}

/// Where a selection goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Install,
    Execute,
}

/// Result of `Dispatcher::select`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Install-flow finished; offer the actions again.
    Reoffer,
    Imported(ImportReport),
}

struct Instance {
    id:      String,
    handler: Box<dyn Handler>,
}

pub struct Dispatcher {
    ctx:       HandlerContext,
    workspace: Box<dyn Workspace>,
    handlers:  Vec<Instance>,
    offered:   Vec<OfferedAction>,
    state:     SessionState,
}

impl Dispatcher {
    pub fn new(ctx: HandlerContext, workspace: Box<dyn Workspace>) -> Self {
        Self {
            ctx,
            workspace,
            handlers: Vec::new(),
            offered:  Vec::new(),
            state:    SessionState::Idle,
        }
    }

    pub fn context(&self) -> &HandlerContext {
        &self.ctx
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn offered(&self) -> &[OfferedAction] {
        &self.offered
    }

    /// One instance per registry entry, all sharing the session context.
    /// A handler whose config or constructor fails is left out and reported.
    pub fn instantiate(&mut self, registry: &Registry) -> Vec<DiscoveryFailure> {
        let mut failures = Vec::new();
        self.handlers.clear();

        for (id, factory) in registry.iter() {
            let store = self.ctx.handler_config(id);
            let built = store
                .initialize(&factory.default_config(&self.ctx))
                .map_err(PasteError::from)
                .and_then(|_| factory.build(&self.ctx, store.clone()));
            match built {
                Ok(handler) => self.handlers.push(Instance { id: id.to_string(), handler }),
                Err(e) => {
                    warn!(handler = id, "handler failed to start: {e}");
                    failures.push(DiscoveryFailure { source: id.to_string(), error: e });
                }
            }
        }

        self.state = SessionState::Discovered;
        failures
    }

    /// Filter by the snapshot's format tags and return the buttons to show.
    pub fn offer(&mut self) -> &[OfferedAction] {
        let tags = self.ctx.snapshot().format_tags();
        self.offered = self
            .handlers
            .iter()
            .filter(|h| h.handler.check_condition(tags))
            .map(|h| OfferedAction {
                id:        h.id.clone(),
                label:     h.handler.label(),
                installed: h.handler.is_installed(),
            })
            .collect();
        info!(offered = ?self.offered.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(), "offering actions");
        self.state = SessionState::Offering;
        &self.offered
    }

    pub fn route(&self, id: &str) -> Result<Route> {
        let instance = self.offered_instance(id)?;
        Ok(if instance.handler.is_installed() { Route::Execute } else { Route::Install })
    }

    /// Install-flow. Focus-loss dismissal is off while the handler's dialogs
    /// are up and back on afterwards, whatever the outcome.
    pub fn install(
        &mut self,
        id:    &str,
        guide: &mut dyn InstallGuide,
        focus: &mut dyn FocusGuard,
    ) -> Result<()> {
        let idx = self.offered_index(id)?;
        self.state = SessionState::Installing(id.to_string());

        focus.set_dismiss_on_focus_loss(false);
        let result = self.handlers[idx].handler.install(guide);
        focus.set_dismiss_on_focus_loss(true);

        if let Err(e) = &result {
            warn!(handler = id, "install flow failed: {e}");
            guide.notify(e.kind(), &e.to_string());
        }
        self.offer();
        result
    }

    /// Execute-flow for an installed handler.
    pub fn execute(&mut self, id: &str) -> Result<ImportReport> {
        let idx = self.offered_index(id)?;
        if !self.handlers[idx].handler.is_installed() {
            return Err(PasteError::NotInstalled { handler: id.to_string() });
        }
        self.state = SessionState::Executing(id.to_string());

        match self.run_execute(idx) {
            Ok(report) => {
                self.state = SessionState::Imported(report.clone());
                Ok(report)
            }
            Err(e) => {
                error!(handler = id, "paste failed: {e}");
                self.state = SessionState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    fn run_execute(&mut self, idx: usize) -> Result<ImportReport> {
        let snapshot  = self.ctx.snapshot().clone();
        let mut media = self.handlers[idx].handler.execute(&snapshot)?;
        media.save(self.ctx.asset_dir(), self.ctx.codecs())?;
        let bin_name  = self.ctx.settings().bin_name.clone();
        import_media(self.workspace.as_mut(), &bin_name, &media)
    }

    /// Route and run a selection.
    pub fn select(
        &mut self,
        id:    &str,
        guide: &mut dyn InstallGuide,
        focus: &mut dyn FocusGuard,
    ) -> Result<Step> {
        match self.route(id)? {
            Route::Install => {
                // Install problems were already shown to the user; keep offering.
                let _ = self.install(id, guide, focus);
                Ok(Step::Reoffer)
            }
            Route::Execute => self.execute(id).map(Step::Imported),
        }
    }

    pub fn dismiss(&mut self) {
        info!("selector dismissed");
        self.state = SessionState::Dismissed;
    }

    /// Drive a whole session against a blocking selector. `Ok(None)` means the
    /// user dismissed without pasting.
    pub fn run<S>(&mut self, selector: &mut S, guide: &mut dyn InstallGuide) -> Result<Option<ImportReport>>
    where
        S: ActionSelector + ?Sized,
    {
        if self.state != SessionState::Offering {
            self.offer();
        }
        loop {
            let actions = self.offered.clone();
            let Some(id) = selector.choose(&actions) else {
                self.dismiss();
                return Ok(None);
            };
            // `S` may be unsized, so it cannot coerce to `dyn FocusGuard` directly.
            let mut focus = SelectorFocus(&mut *selector);
            match self.select(&id, guide, &mut focus) {
                Ok(Step::Reoffer) => continue,
                Ok(Step::Imported(report)) => return Ok(Some(report)),
                Err(e) => {
                    if !self.state.is_finished() {
                        self.state = SessionState::Failed(e.to_string());
                    }
                    return Err(e);
                }
            }
        }
    }

    fn offered_index(&self, id: &str) -> Result<usize> {
        if !self.offered.iter().any(|a| a.id == id) {
            return Err(PasteError::UnknownHandler(id.to_string()));
        }
        self.handlers
            .iter()
            .position(|h| h.id == id)
            .ok_or_else(|| PasteError::UnknownHandler(id.to_string()))
    }

    fn offered_instance(&self, id: &str) -> Result<&Instance> {
        self.offered_index(id).map(|i| &self.handlers[i])
    }
}

struct SelectorFocus<'a, S: ?Sized>(&'a mut S);

impl<S: FocusGuard + ?Sized> FocusGuard for SelectorFocus<'_, S> {
    fn set_dismiss_on_focus_loss(&mut self, enabled: bool) {
        self.0.set_dismiss_on_focus_loss(enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use crate::config::{ConfigMap, ConfigStore, RootSettings};
    use crate::error::WorkspaceError;
    use crate::formats::{FormatSet, FormatTag};
    use crate::handler::{HandlerFactory, HandlerSource};
    use crate::media::{CodecTable, Content, MediaUnit, Saver, TypeTag};
    use crate::snapshot::{ContentSnapshot, MemoryClipboard};
    use crate::workspace::{BinHandle, ItemHandle};

    // ── Fakes ────────────────────────────────────────────────────────────────

    struct Fake {
        accepts:   Vec<FormatTag>,
        installed: Arc<AtomicBool>,
        fail:      bool,
    }

    impl Handler for Fake {
        fn label(&self) -> String {
            "Fake".into()
        }
        fn check_condition(&self, tags: &FormatSet) -> bool {
            crate::formats::intersects(tags, &self.accepts)
        }
        fn is_installed(&self) -> bool {
            self.installed.load(Ordering::SeqCst)
        }
        fn install(&mut self, guide: &mut dyn InstallGuide) -> Result<()> {
            if guide.confirm("Install", "install it?") {
                self.installed.store(true, Ordering::SeqCst);
            }
            Ok(())
        }
        fn execute(&mut self, snapshot: &ContentSnapshot) -> Result<MediaUnit> {
            if self.fail {
                return Err(PasteError::tool("fake-tool", "exit status 1"));
            }
            let text = snapshot.text().ok_or(PasteError::NoCompatibleFormat)?;
            Ok(MediaUnit::from_text(TypeTag::TEXT, text))
        }
    }

    struct FakeFactory {
        id:        &'static str,
        accepts:   Vec<FormatTag>,
        installed: Arc<AtomicBool>,
        fail:      bool,
        broken:    bool,
    }

    impl FakeFactory {
        fn new(id: &'static str, accepts: &[u32]) -> Self {
            Self {
                id,
                accepts:   accepts.iter().copied().map(FormatTag).collect(),
                installed: Arc::new(AtomicBool::new(true)),
                fail:      false,
                broken:    false,
            }
        }
    }

    impl HandlerFactory for FakeFactory {
        fn id(&self) -> &str {
            self.id
        }
        fn default_config(&self, _: &HandlerContext) -> ConfigMap {
            let mut m = ConfigMap::new();
            m.insert("enabled".into(), true.into());
            m
        }
        fn build(&self, _: &HandlerContext, _: ConfigStore) -> Result<Box<dyn Handler>> {
            if self.broken {
                return Err(PasteError::Discovery { name: self.id.into(), message: "ctor".into() });
            }
            Ok(Box::new(Fake {
                accepts:   self.accepts.clone(),
                installed: self.installed.clone(),
                fail:      self.fail,
            }))
        }
    }

    fn registry(factories: Vec<FakeFactory>) -> Registry {
        struct Ready(Mutex<Option<FakeFactory>>);
        impl HandlerSource for Ready {
            fn name(&self) -> String {
                "fake".into()
            }
            fn load(&self) -> Result<Arc<dyn HandlerFactory>> {
                let f = self.0.lock().unwrap().take().unwrap();
                Ok(Arc::new(f))
            }
        }
        Registry::discover(
            factories
                .into_iter()
                .map(|f| Box::new(Ready(Mutex::new(Some(f)))) as Box<dyn HandlerSource>),
        )
        .registry
    }

    #[derive(Default, Clone)]
    struct MemWorkspace {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Workspace for MemWorkspace {
        fn current_project_name(&self) -> std::result::Result<String, WorkspaceError> {
            Ok("Reel".into())
        }
        fn get_or_create_bin(&mut self, name: &str) -> std::result::Result<BinHandle, WorkspaceError> {
            Ok(BinHandle(name.into()))
        }
        fn import_file(&mut self, _: &BinHandle, path: &Path) -> std::result::Result<(), WorkspaceError> {
            self.log.lock().unwrap().push(format!("import {}", path.display()));
            Ok(())
        }
        fn find_item_by_name(&self, _: &BinHandle, name: &str) -> std::result::Result<Option<ItemHandle>, WorkspaceError> {
            Ok(Some(ItemHandle(name.into())))
        }
        fn append_to_timeline(&mut self, item: &ItemHandle) -> std::result::Result<(), WorkspaceError> {
            self.log.lock().unwrap().push(format!("append {}", item.0));
            Ok(())
        }
    }

    struct TxtSaver;

    impl Saver for TxtSaver {
        fn extension(&self, _: &MediaUnit) -> String {
            "txt".into()
        }
        fn write(&self, media: &MediaUnit, dest: &Path) -> Result<()> {
            let Content::Text(t) = &media.content else { return Err(PasteError::NoCompatibleFormat) };
            std::fs::write(dest, t).map_err(|e| PasteError::io(dest, e))
        }
    }

    #[derive(Default)]
    struct Guide {
        answer:   bool,
        notified: Vec<String>,
    }

    impl InstallGuide for Guide {
        fn confirm(&mut self, _: &str, _: &str) -> bool {
            self.answer
        }
        fn open_url(&mut self, _: &str) -> Result<()> {
            Ok(())
        }
        fn notify(&mut self, title: &str, _: &str) {
            self.notified.push(title.into());
        }
    }

    #[derive(Default)]
    struct Script {
        picks:   Vec<Option<String>>,
        toggles: Vec<bool>,
        seen:    Vec<Vec<OfferedAction>>,
    }

    impl FocusGuard for Script {
        fn set_dismiss_on_focus_loss(&mut self, enabled: bool) {
            self.toggles.push(enabled);
        }
    }

    impl ActionSelector for Script {
        fn choose(&mut self, actions: &[OfferedAction]) -> Option<String> {
            self.seen.push(actions.to_vec());
            if self.picks.is_empty() { None } else { self.picks.remove(0) }
        }
    }

    fn session(dir: &Path, clip: MemoryClipboard, factories: Vec<FakeFactory>) -> (Dispatcher, MemWorkspace) {
        let settings = RootSettings::defaults(&dir.join("cfg"), &dir.join("docs"));
        let codecs = CodecTable::new()
            .with_catcher(TypeTag::TEXT, |_: &mut MediaUnit| -> Result<()> { Ok(()) })
            .with_saver(TypeTag::TEXT, TxtSaver);
        let ctx = HandlerContext::new(settings, dir.join("cfg"), "Reel", clip.into_snapshot(), Arc::new(codecs));
        let ws  = MemWorkspace::default();
        let mut d = Dispatcher::new(ctx, Box::new(ws.clone()));
        assert!(d.instantiate(&registry(factories)).is_empty());
        (d, ws)
    }

    // ── Tests ────────────────────────────────────────────────────────────────

    #[test]
    fn filters_by_clipboard_tags() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, _) = session(
            dir.path(),
            MemoryClipboard::new().with_tag(FormatTag::BITMAP),
            vec![FakeFactory::new("files", &[15]), FakeFactory::new("image", &[2])],
        );
        let ids: Vec<_> = d.offer().iter().map(|a| a.id.clone()).collect();
        assert_eq!(ids, vec!["image"]);
        assert_eq!(d.state(), &SessionState::Offering);
    }

    #[test]
    fn uninstalled_handler_routes_to_install_and_cannot_execute() {
        let dir = tempfile::tempdir().unwrap();
        let f = FakeFactory::new("tool", &[1]);
        f.installed.store(false, Ordering::SeqCst);
        let (mut d, ws) = session(dir.path(), MemoryClipboard::new().with_text("hi"), vec![f]);
        d.offer();

        assert_eq!(d.route("tool").unwrap(), Route::Install);
        assert!(matches!(d.execute("tool"), Err(PasteError::NotInstalled { .. })));
        assert!(ws.log.lock().unwrap().is_empty());
    }

    #[test]
    fn install_toggles_focus_dismissal_and_reoffers() {
        let dir = tempfile::tempdir().unwrap();
        let f = FakeFactory::new("tool", &[1]);
        f.installed.store(false, Ordering::SeqCst);
        let (mut d, _) = session(dir.path(), MemoryClipboard::new().with_text("hi"), vec![f]);
        d.offer();

        let mut guide  = Guide { answer: true, ..Default::default() };
        let mut script = Script::default();
        let step = d.select("tool", &mut guide, &mut script).unwrap();
        assert_eq!(step, Step::Reoffer);
        assert_eq!(script.toggles, vec![false, true]);
        assert_eq!(d.state(), &SessionState::Offering);
        assert!(d.offered()[0].installed);
        assert_eq!(d.route("tool").unwrap(), Route::Execute);
    }

    #[test]
    fn execute_saves_imports_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, ws) = session(
            dir.path(),
            MemoryClipboard::new().with_text("hello"),
            vec![FakeFactory::new("paste", &[1, 2, 15])],
        );
        let mut script = Script { picks: vec![Some("paste".into())], ..Default::default() };
        let report = d.run(&mut script, &mut Guide::default()).unwrap().unwrap();

        assert_eq!(report.name, "1.txt");
        assert_eq!(std::fs::read_to_string(&report.path).unwrap(), "hello");
        assert!(report.path.starts_with(d.context().asset_dir()));
        assert!(matches!(d.state(), SessionState::Imported(_)));
        assert_eq!(ws.log.lock().unwrap().last().unwrap(), "append 1.txt");
    }

    #[test]
    fn tool_failure_ends_session_without_saving() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = FakeFactory::new("tool", &[1]);
        f.fail = true;
        let (mut d, ws) = session(dir.path(), MemoryClipboard::new().with_text("x"), vec![f]);
        let mut script = Script { picks: vec![Some("tool".into())], ..Default::default() };

        let err = d.run(&mut script, &mut Guide::default()).unwrap_err();
        assert!(matches!(err, PasteError::ExternalTool { .. }));
        assert!(matches!(d.state(), SessionState::Failed(_)));
        assert!(!d.context().asset_dir().exists());
        assert!(ws.log.lock().unwrap().is_empty());
    }

    #[test]
    fn dismiss_ends_without_import() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, _) = session(dir.path(), MemoryClipboard::new().with_text("x"), vec![FakeFactory::new("paste", &[1])]);
        let mut script = Script::default();
        assert!(d.run(&mut script, &mut Guide::default()).unwrap().is_none());
        assert_eq!(d.state(), &SessionState::Dismissed);
        assert_eq!(script.seen.len(), 1);
    }

    #[test]
    fn broken_constructor_is_isolated() {
        let dir      = tempfile::tempdir().unwrap();
        let settings = RootSettings::defaults(&dir.path().join("cfg"), dir.path());
        let ctx = HandlerContext::new(
            settings,
            dir.path().join("cfg"),
            "Reel",
            MemoryClipboard::new().with_text("x").into_snapshot(),
            Arc::new(CodecTable::new()),
        );
        let mut broken = FakeFactory::new("broken", &[1]);
        broken.broken  = true;
        let mut d = Dispatcher::new(ctx, Box::new(MemWorkspace::default()));
        let failures = d.instantiate(&registry(vec![broken, FakeFactory::new("paste", &[1])]));

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].source, "broken");
        assert_eq!(d.offer().len(), 1);
        // defaults were merged into the surviving handler's private store
        assert!(d.context().handler_config("paste").read_bool("enabled").unwrap());
    }

    #[test]
    fn unknown_selection_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, _) = session(dir.path(), MemoryClipboard::new().with_tag(FormatTag::BITMAP), vec![FakeFactory::new("text", &[1])]);
        d.offer();
        assert!(matches!(d.route("text"), Err(PasteError::UnknownHandler(_))));
    }
}
