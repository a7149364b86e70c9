// crates/clipdrop-core/src/error.rs
//
// Error taxonomy for a paste session. Every failure ends the session at the
// dispatcher boundary; nothing here is retried.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = PasteError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PasteError {
    /// The clipboard holds nothing the selected handler can work with.
    #[error("clipboard holds no content this action can use")]
    NoCompatibleFormat,

    /// No catcher or no saver is registered for the media unit's type tag.
    #[error("no catcher/saver registered for media type '{0}'")]
    UnsupportedType(String),

    #[error("'{handler}' is not installed")]
    NotInstalled { handler: String },

    /// Non-zero exit, stderr output, timeout or cancellation of a child tool.
    #[error("{tool} failed: {message}")]
    ExternalTool { tool: String, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("clipboard access failed: {0}")]
    ClipboardAccess(String),

    #[error("'{0}' media needs a source file but none exists")]
    MissingSource(String),

    #[error("download of {url} failed: {message}")]
    Fetch { url: String, message: String },

    #[error("image error: {0}")]
    Image(String),

    #[error("{path}: {source}")]
    Io {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("no offered action named '{0}'")]
    UnknownHandler(String),

    /// Display name or destination queried before a successful save.
    #[error("media unit has not been saved yet")]
    NotSaved,

    #[error("handler source '{name}' failed to load: {message}")]
    Discovery { name: String, message: String },
}

impl PasteError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PasteError::Io { path: path.into(), source }
    }

    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        PasteError::ExternalTool { tool: tool.into(), message: message.into() }
    }

    /// Short title for dialogs and log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            PasteError::NoCompatibleFormat => "No compatible format",
            PasteError::UnsupportedType(_) => "Unsupported type",
            PasteError::NotInstalled { .. } => "Not installed",
            PasteError::ExternalTool { .. } => "External tool failure",
            PasteError::Config(e) if e.is_integrity() => "Config integrity error",
            PasteError::Config(_)          => "Config error",
            PasteError::ClipboardAccess(_) => "Clipboard access error",
            PasteError::MissingSource(_)   => "Missing source",
            PasteError::Fetch { .. }       => "Download failed",
            PasteError::Image(_)           => "Image error",
            PasteError::Io { .. }          => "File error",
            PasteError::Workspace(_)       => "Import failed",
            PasteError::UnknownHandler(_)  => "Unknown action",
            PasteError::NotSaved           => "Not saved",
            PasteError::Discovery { .. }   => "Handler failed to load",
        }
    }
}

// ── Config ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Create-only config refused to overwrite an existing document.
    #[error("config already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("option '{key}' missing from {path}")]
    MissingOption { key: String, path: PathBuf },

    #[error("option '{key}' in {path} is invalid: {message}")]
    InvalidOption { key: String, path: PathBuf, message: String },

    #[error("{path}: {source}")]
    Io {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} is not a valid config document: {source}")]
    Json {
        path:   PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Overwrite attempts and missing/invalid options, as opposed to plain I/O
    /// or parse failures.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            ConfigError::AlreadyExists(_)
                | ConfigError::MissingOption { .. }
                | ConfigError::InvalidOption { .. }
        )
    }
}

// ── Workspace ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("'{name}' was imported but not found in bin '{bin}'")]
    ItemNotFound { name: String, bin: String },

    #[error("host rejected {path}: {message}")]
    Rejected { path: PathBuf, message: String },

    #[error("unknown bin '{0}'")]
    UnknownBin(String),

    #[error("{path}: {source}")]
    Io {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("project file {path} is malformed: {source}")]
    Json {
        path:   PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
