// crates/clipdrop-core/src/lib.rs
//
// Pure paste-session data and control flow: clipboard snapshot, media units,
// handler contract, registry, dispatcher and the host workspace contract.
// No egui, no network, no child processes. Those live in clipdrop-media and
// clipdrop-ui behind the traits declared here.

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod formats;
pub mod handler;
pub mod media;
pub mod registry;
pub mod sequence;
pub mod snapshot;
pub mod state;
pub mod workspace;

pub use error::{ConfigError, PasteError, Result, WorkspaceError};
pub use formats::{FormatSet, FormatTag};
