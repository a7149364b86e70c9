// src/app.rs (clipdrop-ui)
//
// The action selector: a small always-on-top window with one button per
// offered action.
//
//   Choosing  buttons, 1-9 keys, Esc or losing focus dismisses
//   Working   execute-flow runs on a worker thread; Cancel kills the tool
//   Finished  window closes; the dispatcher's final state is the outcome
//
// Install-flow runs on the UI thread because its dialogs are modal anyway.

use std::sync::Arc;
use std::time::{Duration, Instant};
use clipdrop_core::context::CancelToken;
use clipdrop_core::dispatch::{Dispatcher, Route};
use clipdrop_core::error::{PasteError, Result};
use clipdrop_core::handler::{FocusGuard, OfferedAction};
use clipdrop_core::workspace::ImportReport;
use crossbeam_channel::{Receiver, TryRecvError};
use eframe::egui;
use parking_lot::Mutex;
use tracing::{error, info, warn};
use crate::guide::RfdGuide;
use crate::theme::{self, configure_style};

const NUMBER_KEYS: [egui::Key; 9] = [
    egui::Key::Num1, egui::Key::Num2, egui::Key::Num3,
    egui::Key::Num4, egui::Key::Num5, egui::Key::Num6,
    egui::Key::Num7, egui::Key::Num8, egui::Key::Num9,
];

const WINDOW_WIDTH: f32 = 300.0;
const ROW_HEIGHT:   f32 = 36.0;

/// Focus-loss dismissal. `seen_focus` guards against closing before the
/// window has been focused once (and again after install dialogs).
#[derive(Default)]
struct FocusFlag {
    dismiss:    bool,
    seen_focus: bool,
}

impl FocusGuard for FocusFlag {
    fn set_dismiss_on_focus_loss(&mut self, enabled: bool) {
        self.dismiss    = enabled;
        self.seen_focus = false;
    }
}

enum Phase {
    Choosing,
    Working {
        label:   String,
        started: Instant,
        rx:      Receiver<Result<ImportReport>>,
    },
    Finished,
}

// ── App ───────────────────────────────────────────────────────────────────────

pub struct SelectorApp {
    dispatcher:  Arc<Mutex<Dispatcher>>,
    actions:     Vec<OfferedAction>,
    cancel:      CancelToken,
    destination: String,
    /// Handlers that failed to load, shown as a footnote.
    failures:    usize,
    guide:       RfdGuide,
    focus:       FocusFlag,
    phase:       Phase,
}

impl SelectorApp {
    pub fn new(cc: &eframe::CreationContext<'_>, dispatcher: Arc<Mutex<Dispatcher>>, failures: usize) -> Self {
        cc.egui_ctx.options_mut(|o| {
            o.theme_preference = egui::ThemePreference::Dark;
        });
        configure_style(&cc.egui_ctx);

        let (actions, cancel, destination) = {
            let d = dispatcher.lock();
            let actions = d.offered().to_vec();
            let ctx = d.context();
            (actions, ctx.cancel().clone(), ctx.asset_dir().display().to_string())
        };

        let mut focus = FocusFlag::default();
        focus.set_dismiss_on_focus_loss(true);

        Self {
            dispatcher,
            actions,
            cancel,
            destination,
            failures,
            guide: RfdGuide,
            focus,
            phase: Phase::Choosing,
        }
    }

    fn close(&mut self, ctx: &egui::Context) {
        self.phase = Phase::Finished;
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }

    fn dismiss(&mut self, ctx: &egui::Context) {
        self.dispatcher.lock().dismiss();
        self.close(ctx);
    }

    fn fail(&mut self, ctx: &egui::Context, err: &PasteError) {
        error!("{err}");
        self.guide.error(err);
        self.close(ctx);
    }

    fn select(&mut self, ctx: &egui::Context, action: OfferedAction) {
        let route = self.dispatcher.lock().route(&action.id);
        match route {
            Err(e) => self.fail(ctx, &e),
            Ok(Route::Install) => {
                let mut d = self.dispatcher.lock();
                // Problems were already shown by the install flow.
                let _ = d.install(&action.id, &mut self.guide, &mut self.focus);
                self.actions = d.offered().to_vec();
            }
            Ok(Route::Execute) => self.spawn_execute(ctx, action),
        }
    }

    fn spawn_execute(&mut self, ctx: &egui::Context, action: OfferedAction) {
        let (tx, rx)   = crossbeam_channel::bounded(1);
        let dispatcher = Arc::clone(&self.dispatcher);
        let repaint    = ctx.clone();
        let id         = action.id.clone();

        let spawned = std::thread::Builder::new()
            .name("clipdrop-execute".into())
            .spawn(move || {
                let result = dispatcher.lock().execute(&id);
                let _ = tx.send(result);
                repaint.request_repaint();
            });

        match spawned {
            Ok(_) => {
                info!(action = %action.id, "execute started");
                self.phase = Phase::Working { label: action.label, started: Instant::now(), rx };
            }
            Err(e) => self.fail(ctx, &PasteError::io("clipdrop-execute", e)),
        }
    }

    fn poll_worker(&mut self, ctx: &egui::Context) {
        let Phase::Working { rx, .. } = &self.phase else { return };
        match rx.try_recv() {
            Ok(Ok(report)) => {
                info!(name = %report.name, "paste finished");
                self.close(ctx);
            }
            Ok(Err(e)) => self.fail(ctx, &e),
            Err(TryRecvError::Empty) => ctx.request_repaint_after(Duration::from_millis(100)),
            Err(TryRecvError::Disconnected) => {
                warn!("execute worker ended without a result");
                self.fail(ctx, &PasteError::tool("clipdrop-execute", "stopped without a result"));
            }
        }
    }

    fn check_focus(&mut self, ctx: &egui::Context) {
        match ctx.input(|i| i.viewport().focused) {
            Some(true) => self.focus.seen_focus = true,
            Some(false) if self.focus.seen_focus && self.focus.dismiss => {
                info!("selector lost focus");
                self.dismiss(ctx);
            }
            _ => {}
        }
    }

    fn choosing_ui(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        ui.label(egui::RichText::new("Paste clipboard as").strong().color(theme::ACCENT));
        ui.label(egui::RichText::new(&self.destination).size(11.0).weak());
        ui.add_space(4.0);

        if self.actions.is_empty() {
            ui.label("Nothing on the clipboard can be pasted.");
            if ui.button("Close").clicked() {
                self.dismiss(ctx);
            }
            return;
        }

        let mut picked = None;
        for (i, action) in self.actions.iter().enumerate() {
            let mut text = egui::RichText::new(format!("{}  {}", i + 1, action.label));
            if !action.installed {
                text = text.color(theme::NOT_INSTALLED);
            }
            let button = ui.add_sized([ui.available_width(), ROW_HEIGHT - 6.0], egui::Button::new(text));
            let button = if action.installed {
                button
            } else {
                button.on_hover_text("Not installed. Click for setup instructions.")
            };
            if button.clicked() {
                picked = Some(action.clone());
            }
        }
        for (i, key) in NUMBER_KEYS.iter().enumerate() {
            if ctx.input(|inp| inp.key_pressed(*key)) {
                if let Some(action) = self.actions.get(i) {
                    picked = Some(action.clone());
                }
            }
        }

        if self.failures > 0 {
            ui.add_space(4.0);
            ui.label(
                egui::RichText::new(format!("{} handler(s) failed to load, see the log", self.failures))
                    .size(11.0)
                    .color(theme::ERROR),
            );
        }

        if let Some(action) = picked {
            self.select(ctx, action);
        } else if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.dismiss(ctx);
        }
    }

    fn working_ui(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let Phase::Working { label, started, .. } = &self.phase else { return };
        let elapsed = started.elapsed().as_secs();
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label(format!("{label}…"));
        });
        ui.label(egui::RichText::new(format!("{elapsed}s")).size(11.0).weak());
        ui.add_space(4.0);

        let cancelled = self.cancel.is_cancelled();
        let clicked = ui
            .add_enabled(!cancelled, egui::Button::new(if cancelled { "Cancelling…" } else { "Cancel" }))
            .clicked();
        if clicked || ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            info!("cancel requested");
            self.cancel.cancel();
        }
    }
}

/// Window height for `n` action rows.
pub fn window_height(n: usize) -> f32 {
    84.0 + ROW_HEIGHT * n.max(1) as f32
}

pub fn window_size(n: usize) -> [f32; 2] {
    [WINDOW_WIDTH, window_height(n)]
}

impl eframe::App for SelectorApp {
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if matches!(self.phase, Phase::Working { .. }) {
            info!("window closed while a tool was running; cancelling");
            self.cancel.cancel();
        }
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_worker(ctx);

        egui::CentralPanel::default().show(ctx, |ui| match self.phase {
            Phase::Choosing       => self.choosing_ui(ctx, ui),
            Phase::Working { .. } => self.working_ui(ctx, ui),
            Phase::Finished       => {}
        });

        if matches!(self.phase, Phase::Choosing) {
            self.check_focus(ctx);
        }
    }
}
