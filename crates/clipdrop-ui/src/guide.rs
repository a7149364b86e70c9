// crates/clipdrop-ui/src/guide.rs
//
// User-facing side of install flows and error reporting.
//
//   RfdGuide          native message boxes + system browser (GUI sessions)
//   TerminalGuide     stdin/stderr prompts (--headless)
//   TerminalSelector  numbered action menu on stdin (--headless)

use std::io::{self, BufRead, Write};
use clipdrop_core::error::{PasteError, Result};
use clipdrop_core::handler::{ActionSelector, FocusGuard, InstallGuide, OfferedAction};
use rfd::{MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};
use tracing::{debug, info, warn};

fn open_in_browser(url: &str) -> Result<()> {
    info!(%url, "opening browser");
    webbrowser::open(url).map_err(|e| PasteError::io(url, e))
}

// ── Native dialogs ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RfdGuide;

impl RfdGuide {
    pub fn error(&self, err: &PasteError) {
        MessageDialog::new()
            .set_level(MessageLevel::Error)
            .set_title(err.kind())
            .set_description(err.to_string())
            .set_buttons(MessageButtons::Ok)
            .show();
    }
}

impl InstallGuide for RfdGuide {
    fn confirm(&mut self, title: &str, message: &str) -> bool {
        let answer = MessageDialog::new()
            .set_level(MessageLevel::Warning)
            .set_title(title)
            .set_description(message)
            .set_buttons(MessageButtons::YesNo)
            .show();
        answer == MessageDialogResult::Yes
    }

    fn open_url(&mut self, url: &str) -> Result<()> {
        open_in_browser(url)
    }

    fn notify(&mut self, title: &str, message: &str) {
        MessageDialog::new()
            .set_level(MessageLevel::Info)
            .set_title(title)
            .set_description(message)
            .set_buttons(MessageButtons::Ok)
            .show();
    }
}

// ── Terminal ─────────────────────────────────────────────────────────────────

fn read_line() -> Option<String> {
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

#[derive(Default)]
pub struct TerminalGuide;

impl InstallGuide for TerminalGuide {
    fn confirm(&mut self, title: &str, message: &str) -> bool {
        eprintln!("\n{title}\n{message}");
        eprint!("[y/N] ");
        let _ = io::stderr().flush();
        matches!(read_line().as_deref(), Some("y" | "Y" | "yes"))
    }

    fn open_url(&mut self, url: &str) -> Result<()> {
        eprintln!("{url}");
        if let Err(e) = open_in_browser(url) {
            warn!("browser did not open: {e}");
        }
        Ok(())
    }

    fn notify(&mut self, title: &str, message: &str) {
        eprintln!("\n{title}\n{message}");
    }
}

/// No window, so there is no focus to lose.
#[derive(Default)]
pub struct TerminalSelector;

impl FocusGuard for TerminalSelector {
    fn set_dismiss_on_focus_loss(&mut self, enabled: bool) {
        debug!(enabled, "focus dismissal (ignored in terminal)");
    }
}

impl ActionSelector for TerminalSelector {
    fn choose(&mut self, actions: &[OfferedAction]) -> Option<String> {
        if actions.is_empty() {
            eprintln!("Nothing on the clipboard can be pasted.");
            return None;
        }
        loop {
            eprintln!();
            for (i, a) in actions.iter().enumerate() {
                let note = if a.installed { "" } else { "  (not installed)" };
                eprintln!("  {}. {}{note}", i + 1, a.label);
            }
            eprint!("Paste as [1-{}, empty to cancel]: ", actions.len());
            let _ = io::stderr().flush();

            let line = read_line()?;
            if line.is_empty() || line.eq_ignore_ascii_case("q") {
                return None;
            }
            match pick(actions, &line) {
                Some(id) => return Some(id),
                None => eprintln!("'{line}' is not one of the choices"),
            }
        }
    }
}

/// A 1-based index or an action id.
fn pick(actions: &[OfferedAction], input: &str) -> Option<String> {
    if let Ok(n) = input.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| actions.get(i)).map(|a| a.id.clone());
    }
    actions.iter().find(|a| a.id == input).map(|a| a.id.clone())
}
