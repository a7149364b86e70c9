#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod clipboard;
mod guide;
mod helpers;
mod paths;
mod theme;
mod workspace;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use anyhow::{Context as _, Result};
use clap::Parser;
use clipdrop_core::config::RootSettings;
use clipdrop_core::context::HandlerContext;
use clipdrop_core::dispatch::{Dispatcher, SessionState};
use clipdrop_core::registry::Registry;
use clipdrop_core::snapshot::{ContentSnapshot, MemoryClipboard};
use clipdrop_core::workspace::Workspace;
use clipdrop_media::{builtin_codecs, handler_sources, UreqFetch};
use parking_lot::Mutex;
use tracing::{error, info, warn};
use crate::clipboard::SystemClipboard;
use crate::guide::{TerminalGuide, TerminalSelector};
use crate::workspace::ProjectWorkspace;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Paste the clipboard into a video project, optionally through an AI tool.
#[derive(Parser, Debug)]
#[command(name = "clipdrop", version, about)]
struct Cli {
    /// Project file to import into (created if missing). Without it pastes
    /// go to the shared `_unsaved` folder of an untitled project.
    #[arg(long)]
    project: Option<PathBuf>,

    /// Folder holding config.json and handlers/.
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Paste these files as a file drop instead of reading the clipboard.
    #[arg(long = "file", value_name = "PATH")]
    files: Vec<PathBuf>,

    /// Prompt on the terminal instead of opening the selector window.
    #[arg(long)]
    headless: bool,

    /// Print the actions on offer for the current clipboard and exit.
    #[arg(long)]
    list: bool,

    /// Mirror the log to stderr.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    helpers::log::init(cli.verbose);
    info!(version = env!("CARGO_PKG_VERSION"), "clipdrop starting");

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("clipdrop: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config_dir = cli.config_dir.clone().unwrap_or_else(paths::default_config_dir);
    let settings = RootSettings::load_or_init(&config_dir, &paths::documents_dir())
        .with_context(|| format!("loading config from {}", config_dir.display()))?;

    let workspace = match &cli.project {
        Some(path) => ProjectWorkspace::open(path)
            .with_context(|| format!("opening project {}", path.display()))?,
        None => ProjectWorkspace::untitled(),
    };
    let project_name = workspace.current_project_name()?;

    let snapshot = if cli.files.is_empty() {
        let source = SystemClipboard::new().context("opening the clipboard")?;
        ContentSnapshot::capture(Arc::new(source)).context("reading the clipboard")?
    } else {
        MemoryClipboard::new().with_files(cli.files.clone()).into_snapshot()
    };

    let discovery = Registry::discover(handler_sources(&settings.handlers));
    let codecs    = Arc::new(builtin_codecs(Arc::new(UreqFetch)));
    let ctx       = HandlerContext::new(settings, &config_dir, &project_name, snapshot, codecs);

    let mut dispatcher = Dispatcher::new(ctx, Box::new(workspace));
    let mut failures = discovery.failures;
    failures.extend(dispatcher.instantiate(&discovery.registry));
    for f in &failures {
        warn!(source = %f.source, "handler unavailable: {}", f.error);
    }

    if cli.list {
        for action in dispatcher.offer() {
            let note = if action.installed { "" } else { "  (not installed)" };
            println!("{:<12} {}{note}", action.id, action.label);
        }
        return Ok(ExitCode::SUCCESS);
    }

    if cli.headless {
        return Ok(match dispatcher.run(&mut TerminalSelector, &mut TerminalGuide) {
            Ok(Some(report)) => {
                println!("{}", report.path.display());
                ExitCode::SUCCESS
            }
            Ok(None) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{e}");
                eprintln!("{}: {e}", e.kind());
                ExitCode::FAILURE
            }
        });
    }

    run_window(dispatcher, failures.len())
}

fn run_window(mut dispatcher: Dispatcher, failures: usize) -> Result<ExitCode> {
    // Offer before opening so the window can be sized to the buttons.
    let rows       = dispatcher.offer().len();
    let dispatcher = Arc::new(Mutex::new(dispatcher));

    let native_options = eframe::NativeOptions {
        centered: true,
        viewport: egui::ViewportBuilder::default()
            .with_title("ClipDrop")
            .with_inner_size(app::window_size(rows))
            .with_decorations(false)
            .with_resizable(false)
            .with_always_on_top(),
        ..Default::default()
    };

    let shared = Arc::clone(&dispatcher);
    eframe::run_native(
        "ClipDrop",
        native_options,
        Box::new(move |cc| Ok(Box::new(app::SelectorApp::new(cc, shared, failures)))),
    )
    .map_err(|e| anyhow::anyhow!("selector window failed: {e}"))?;

    let state = dispatcher.lock().state().clone();
    Ok(exit_code(&state))
}

/// A handler still marked as running means its worker died.
fn exit_code(state: &SessionState) -> ExitCode {
    match state {
        SessionState::Imported(report) => {
            info!(path = %report.path.display(), "done");
            ExitCode::SUCCESS
        }
        SessionState::Failed(_) => ExitCode::FAILURE,
        SessionState::Executing(id) => {
            error!(handler = %id, "handler did not finish");
            ExitCode::FAILURE
        }
        _ => ExitCode::SUCCESS,
    }
}
