// crates/clipdrop-media/tests/paste_session.rs
//
// End-to-end sessions: real registry and codecs, in-memory clipboard, a
// recording workspace, and shell scripts standing in for the AI tools.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use clipdrop_core::config::{ConfigMap, ConfigStore, RootSettings};
use clipdrop_core::context::HandlerContext;
use clipdrop_core::dispatch::{Dispatcher, Route, SessionState};
use clipdrop_core::error::{PasteError, Result, WorkspaceError};
use clipdrop_core::handler::{ActionSelector, FocusGuard, InstallGuide, OfferedAction};
use clipdrop_core::registry::Registry;
use clipdrop_core::snapshot::{Bitmap, MemoryClipboard};
use clipdrop_core::workspace::{BinHandle, ItemHandle, Workspace};
use clipdrop_media::fetch::{Fetch, Fetched};
use clipdrop_media::{builtin_codecs, handler_sources};

// ── Fakes ────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Project {
    items:    Arc<Mutex<Vec<(String, PathBuf)>>>,
    timeline: Arc<Mutex<Vec<String>>>,
}

impl Workspace for Project {
    fn current_project_name(&self) -> std::result::Result<String, WorkspaceError> {
        Ok("Trailer".into())
    }
    fn get_or_create_bin(&mut self, name: &str) -> std::result::Result<BinHandle, WorkspaceError> {
        Ok(BinHandle(name.into()))
    }
    fn import_file(&mut self, bin: &BinHandle, path: &Path) -> std::result::Result<(), WorkspaceError> {
        self.items.lock().unwrap().push((bin.0.clone(), path.to_path_buf()));
        Ok(())
    }
    fn find_item_by_name(&self, _bin: &BinHandle, name: &str) -> std::result::Result<Option<ItemHandle>, WorkspaceError> {
        let items = self.items.lock().unwrap();
        Ok(items
            .iter()
            .find(|(_, p)| p.file_name().map(|f| f == name).unwrap_or(false))
            .map(|_| ItemHandle(name.into())))
    }
    fn append_to_timeline(&mut self, item: &ItemHandle) -> std::result::Result<(), WorkspaceError> {
        self.timeline.lock().unwrap().push(item.0.clone());
        Ok(())
    }
}

struct Offline;

impl Fetch for Offline {
    fn get(&self, url: &str) -> Result<Fetched> {
        Ok(Fetched {
            content_type: Some("image/gif".into()),
            bytes:        format!("GIF89a {url}").into_bytes(),
        })
    }
}

struct Pick(Vec<&'static str>);

impl FocusGuard for Pick {
    fn set_dismiss_on_focus_loss(&mut self, _enabled: bool) {}
}

impl ActionSelector for Pick {
    fn choose(&mut self, _actions: &[OfferedAction]) -> Option<String> {
        if self.0.is_empty() { None } else { Some(self.0.remove(0).to_string()) }
    }
}

struct Decline;

impl InstallGuide for Decline {
    fn confirm(&mut self, _: &str, _: &str) -> bool {
        false
    }
    fn open_url(&mut self, _: &str) -> Result<()> {
        Ok(())
    }
    fn notify(&mut self, _: &str, _: &str) {}
}

struct Env {
    _tmp:       tempfile::TempDir,
    config_dir: PathBuf,
    settings:   RootSettings,
}

fn env() -> Env {
    let tmp        = tempfile::tempdir().unwrap();
    let config_dir = tmp.path().join("config");
    let settings   = RootSettings::load_or_init(&config_dir, &tmp.path().join("Documents")).unwrap();
    Env { _tmp: tmp, config_dir, settings }
}

fn session(env: &Env, clip: MemoryClipboard) -> (Dispatcher, Project) {
    let ctx = HandlerContext::new(
        env.settings.clone(),
        &env.config_dir,
        "Trailer",
        clip.into_snapshot(),
        Arc::new(builtin_codecs(Arc::new(Offline))),
    );
    let project = Project::default();
    let mut d   = Dispatcher::new(ctx, Box::new(project.clone()));
    let found   = Registry::discover(handler_sources(&env.settings.handlers));
    assert!(found.failures.is_empty(), "{:?}", found.failures);
    assert!(d.instantiate(&found.registry).is_empty());
    (d, project)
}

fn red_square() -> Bitmap {
    Bitmap::new(4, 4, [255, 0, 0, 255].repeat(16)).unwrap()
}

fn seed_config(env: &Env, id: &str, pairs: &[(&str, &str)]) {
    let store = ConfigStore::new(clipdrop_core::config::handler_config_path(&env.config_dir, id));
    let mut doc = ConfigMap::new();
    for (k, v) in pairs {
        doc.insert((*k).into(), (*v).into());
    }
    store.create(&doc).unwrap();
}

// ── Plain paste ──────────────────────────────────────────────────────────────

#[test]
fn bitmap_paste_lands_in_project_folder_and_timeline() {
    let env = env();
    let (mut d, project) = session(&env, MemoryClipboard::new().with_bitmap(red_square()));

    let offered: Vec<_> = d.offer().iter().map(|a| a.id.clone()).collect();
    assert_eq!(offered, vec!["paste", "rembg", "upscale"]);

    let report = d.run(&mut Pick(vec!["paste"]), &mut Decline).unwrap().unwrap();
    assert_eq!(report.name, "1.png");
    assert_eq!(report.path, env.settings.assets.join("Trailer").join("1.png"));
    assert_eq!(report.bin.0, clipdrop_core::config::BIN_NAME);
    assert_eq!(*project.timeline.lock().unwrap(), vec!["1.png"]);
}

#[test]
fn second_paste_takes_next_number() {
    let env = env();
    for expected in ["1.txt", "2.txt"] {
        let (mut d, _) = session(&env, MemoryClipboard::new().with_text("lower third"));
        let report = d.run(&mut Pick(vec!["paste"]), &mut Decline).unwrap().unwrap();
        assert_eq!(report.name, expected);
    }
}

#[test]
fn url_paste_uses_downloaded_type() {
    let env = env();
    let (mut d, _) = session(&env, MemoryClipboard::new().with_text("https://media.example/x"));
    let report = d.run(&mut Pick(vec!["paste"]), &mut Decline).unwrap().unwrap();
    assert_eq!(report.name, "1.gif");
}

#[test]
fn text_only_clipboard_offers_paste_alone() {
    let env = env();
    let (mut d, _) = session(&env, MemoryClipboard::new().with_text("hi"));
    let offered: Vec<_> = d.offer().iter().map(|a| a.id.clone()).collect();
    assert_eq!(offered, vec!["paste"]);
}

#[test]
fn unsaved_project_pastes_into_shared_folder() {
    let env = env();
    let ctx = HandlerContext::new(
        env.settings.clone(),
        &env.config_dir,
        "Untitled Project",
        MemoryClipboard::new().with_text("x").into_snapshot(),
        Arc::new(builtin_codecs(Arc::new(Offline))),
    );
    assert_eq!(ctx.asset_dir(), env.settings.assets.join("_unsaved"));
}

// ── Dropped files ────────────────────────────────────────────────────────────

fn drop_paste(env: &Env, file: &Path) -> Result<clipdrop_core::workspace::ImportReport> {
    let (mut d, _) = session(env, MemoryClipboard::new().with_files([file.to_path_buf()]));
    d.run(&mut Pick(vec!["paste"]), &mut Decline).map(|r| r.expect("paste was chosen"))
}

#[test]
fn dropped_jpeg_is_reencoded_as_png() {
    let env = env();
    let src = env.settings.base_root.join("shot.jpg");
    image::RgbImage::from_pixel(5, 3, image::Rgb([0, 0, 255])).save(&src).unwrap();

    let report = drop_paste(&env, &src).unwrap();
    assert_eq!(report.name, "1.png");
    let saved = image::open(&report.path).unwrap();
    assert_eq!((saved.width(), saved.height()), (5, 3));
}

#[test]
fn dropped_svg_is_copied_under_its_own_extension() {
    let env = env();
    let src = env.settings.base_root.join("logo.svg");
    fs::write(&src, r#"<svg xmlns="http://www.w3.org/2000/svg"/>"#).unwrap();

    let report = drop_paste(&env, &src).unwrap();
    assert_eq!(report.name, "1.svg");
    assert_eq!(fs::read(&report.path).unwrap(), fs::read(&src).unwrap());
}

#[test]
fn dropped_corrupt_image_fails_without_leaving_an_asset() {
    let env = env();
    let src = env.settings.base_root.join("broken.png");
    fs::write(&src, b"definitely not pixels").unwrap();

    let err = drop_paste(&env, &src).unwrap_err();
    assert!(matches!(err, PasteError::Image(_)), "{err:?}");
    let folder = env.settings.assets.join("Trailer");
    assert!(!folder.exists() || fs::read_dir(&folder).unwrap().next().is_none());
}

#[test]
fn dropped_utf16_text_is_copied_verbatim() {
    let env = env();
    let src = env.settings.base_root.join("notes.txt");
    let bytes = [0xFF, 0xFE, b'h', 0x00, b'i', 0x00];
    fs::write(&src, bytes).unwrap();

    let report = drop_paste(&env, &src).unwrap();
    assert_eq!(report.name, "1.txt");
    assert_eq!(fs::read(&report.path).unwrap(), bytes);
}

// ── Tools ────────────────────────────────────────────────────────────────────

#[test]
fn missing_tool_routes_to_install_and_refuses_execute() {
    let env = env();
    seed_config(&env, "upscale", &[("program", "clipdrop-test-no-such-upscaler")]);
    let (mut d, project) = session(&env, MemoryClipboard::new().with_bitmap(red_square()));
    d.offer();

    assert_eq!(d.route("upscale").unwrap(), Route::Install);
    assert!(matches!(d.execute("upscale"), Err(PasteError::NotInstalled { .. })));
    assert!(project.items.lock().unwrap().is_empty());

    // declining the install guide leaves the session offering
    let report = d.run(&mut Pick(vec!["upscale"]), &mut Decline).unwrap();
    assert!(report.is_none());
    assert_eq!(d.state(), &SessionState::Dismissed);
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(path: &Path, body: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn manifest(env: &Env, id: &str, body: &str, tool_body: &str) {
        let dir = env.settings.handlers.join(id);
        script(&dir.join("tool.sh"), tool_body);
        fs::write(dir.join("handler.json"), body).unwrap();
    }

    #[test]
    fn manifest_tool_output_is_imported() {
        let env = env();
        manifest(
            &env,
            "mirror",
            r#"{ "id": "mirror", "label": "Mirror", "accepts": [2],
                 "program": "tool.sh", "args": ["{input}", "{output}"],
                 "outputSuffix": "-m" }"#,
            r#"cp "$1" "$2""#,
        );
        let (mut d, project) = session(&env, MemoryClipboard::new().with_bitmap(red_square()));

        let report = d.run(&mut Pick(vec!["mirror"]), &mut Decline).unwrap().unwrap();
        assert_eq!(report.name, "1.png");
        assert!(report.path.starts_with(env.settings.assets.join("Trailer")));
        assert!(env.settings.cache.join("Trailer").join("1-m.png").is_file());
        assert_eq!(project.timeline.lock().unwrap().len(), 1);
    }

    #[test]
    fn failing_tool_surfaces_and_saves_nothing() {
        let env = env();
        manifest(
            &env,
            "crash",
            r#"{ "id": "crash", "label": "Crash", "accepts": [2], "program": "tool.sh" }"#,
            "echo 'model not found' >&2\nexit 1",
        );
        let (mut d, project) = session(&env, MemoryClipboard::new().with_bitmap(red_square()));

        let err = d.run(&mut Pick(vec!["crash"]), &mut Decline).unwrap_err();
        let PasteError::ExternalTool { tool, message } = err else { panic!("expected tool failure") };
        assert_eq!(tool, "crash");
        assert!(message.contains("model not found"));
        assert!(!env.settings.assets.join("Trailer").exists());
        assert!(project.items.lock().unwrap().is_empty());
        assert!(matches!(d.state(), SessionState::Failed(_)));
    }

    #[test]
    fn tool_that_writes_nothing_is_a_failure() {
        let env = env();
        manifest(
            &env,
            "lazy",
            r#"{ "id": "lazy", "label": "Lazy", "accepts": [2], "program": "tool.sh" }"#,
            "exit 0",
        );
        let (mut d, _) = session(&env, MemoryClipboard::new().with_bitmap(red_square()));
        let err = d.run(&mut Pick(vec!["lazy"]), &mut Decline).unwrap_err();
        assert!(matches!(err, PasteError::ExternalTool { .. }));
    }

    #[test]
    fn stale_output_from_an_earlier_run_does_not_count() {
        let env = env();
        manifest(
            &env,
            "lazy",
            r#"{ "id": "lazy", "label": "Lazy", "accepts": [2],
                 "program": "tool.sh", "args": ["{input}", "{output}"],
                 "outputSuffix": "-m" }"#,
            "exit 0",
        );
        let stale = env.settings.cache.join("Trailer").join("1-m.png");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, b"left over").unwrap();

        let (mut d, project) = session(&env, MemoryClipboard::new().with_bitmap(red_square()));
        let err = d.run(&mut Pick(vec!["lazy"]), &mut Decline).unwrap_err();
        assert!(matches!(err, PasteError::ExternalTool { .. }), "{err:?}");
        assert!(!stale.exists());
        assert!(project.items.lock().unwrap().is_empty());
    }

    #[test]
    fn upscale_ignores_progress_on_stderr() {
        let env = env();
        script(
            &env.settings.tools.join("upscayl").join("upscayl-bin"),
            r#"echo "50.00%" >&2
while [ $# -gt 0 ]; do
  case "$1" in
    -i) in="$2"; shift 2 ;;
    -o) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
cp "$in" "$out""#,
        );
        let (mut d, _) = session(&env, MemoryClipboard::new().with_bitmap(red_square()));
        d.offer();
        assert_eq!(d.route("upscale").unwrap(), Route::Execute);

        let report = d.execute("upscale").unwrap();
        assert_eq!(report.name, "1.png");
        assert!(env.settings.cache.join("Trailer").join("1-x2.png").is_file());
    }

    fn fake_rembg_cli(env: &Env, body: &str) {
        script(&env.settings.tools.join("rembg").join("rembg"), body);
    }

    #[test]
    fn rembg_cli_gets_expanded_args_and_model_dir() {
        let env    = env();
        let models = env.settings.tools.join("rembg").join("models");
        fake_rembg_cli(
            &env,
            &format!(
                r#"[ "$1 $2 $3" = "i -m u2net" ] || {{ echo "bad args: $*" >&2; exit 2; }}
[ "$U2NET_HOME" = "{}" ] || {{ echo "bad U2NET_HOME: $U2NET_HOME" >&2; exit 3; }}
cp "$4" "$5""#,
                models.display()
            ),
        );
        let (mut d, project) = session(&env, MemoryClipboard::new().with_bitmap(red_square()));
        d.offer();
        assert_eq!(d.route("rembg").unwrap(), Route::Execute);

        let report = d.execute("rembg").unwrap();
        assert_eq!(report.name, "1.png");
        assert!(env.settings.cache.join("Trailer").join("1-rm.png").is_file());
        assert_eq!(project.timeline.lock().unwrap().len(), 1);
    }

    #[test]
    fn rembg_warning_on_stderr_fails_even_with_exit_zero() {
        let env = env();
        fake_rembg_cli(&env, "echo 'onnxruntime: CUDA unavailable' >&2\ncp \"$4\" \"$5\"");
        let (mut d, project) = session(&env, MemoryClipboard::new().with_bitmap(red_square()));
        d.offer();

        let err = d.execute("rembg").unwrap_err();
        let PasteError::ExternalTool { tool, message } = err else { panic!("expected tool failure") };
        assert_eq!(tool, "rembg");
        assert!(message.contains("CUDA unavailable"));
        assert!(project.items.lock().unwrap().is_empty());
        assert!(!env.settings.assets.join("Trailer").exists());
    }

    #[test]
    fn rembg_helper_script_runs_in_package_env() {
        let env = env();
        // a fake virtualenv whose "python" copies input to output when
        // U2NET_HOME is set
        fs::create_dir_all(env.settings.env.join("lib")).unwrap();
        script(
            &env.settings.env.join("bin").join("python"),
            r#"[ -n "$U2NET_HOME" ] || { echo "no U2NET_HOME" >&2; exit 9; }
cp "$2" "$3""#,
        );
        let helper = env.settings.base_root.join("cutout.py");
        fs::write(&helper, "# helper").unwrap();
        seed_config(&env, "rembg", &[("helperScript", helper.to_str().unwrap())]);

        let (mut d, _) = session(&env, MemoryClipboard::new().with_bitmap(red_square()));
        d.offer();
        assert_eq!(d.route("rembg").unwrap(), Route::Execute);

        let report = d.execute("rembg").unwrap();
        assert_eq!(report.name, "1.png");
        assert!(env.settings.cache.join("Trailer").join("1-rm.png").is_file());
        assert!(env.settings.tools.join("rembg").join("cutout.py").is_file());
    }
}
