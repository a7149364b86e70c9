// crates/clipdrop-core/src/config.rs
//
// JSON configuration documents.
//
// ── Layout ───────────────────────────────────────────────────────────────────
//
//   {config_dir}/config.json                  root settings (RootSettings)
//   {config_dir}/handlers/{id}/config.json    one private store per handler
//
// Every document is a single JSON object. The store keeps no in-memory copy:
// reads go to disk and point updates rewrite the whole document, so two
// stores pointed at the same file never disagree about what is on disk.
//
// Root config is create-only. `create` refuses to touch an existing file and
// leaves its bytes unchanged. `initialize` fills in keys that are missing
// from an existing document and never overwrites a value the user set.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use crate::error::ConfigError;

pub type ConfigMap = serde_json::Map<String, Value>;

pub const ROOT_NAME:                 &str = "ClipDrop";
pub const BIN_NAME:                  &str = "__ClipDrop__";
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64  = 600;

pub fn root_config_path(config_dir: &Path) -> PathBuf {
    config_dir.join("config.json")
}

pub fn handlers_dir(config_dir: &Path) -> PathBuf {
    config_dir.join("handlers")
}

pub fn handler_config_path(config_dir: &Path, handler_id: &str) -> PathBuf {
    handlers_dir(config_dir).join(handler_id).join("config.json")
}

// ── ConfigStore ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write `doc` as a brand-new document. Fails with `AlreadyExists` if the
    /// file is already there; the existing bytes are not touched.
    pub fn create(&self, doc: &ConfigMap) -> Result<(), ConfigError> {
        self.ensure_parent()?;
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(ConfigError::AlreadyExists(self.path.clone()));
            }
            Err(e) => return Err(self.io_err(e)),
        };
        let bytes = self.encode(doc)?;
        file.write_all(&bytes).map_err(|e| self.io_err(e))?;
        info!(path = %self.path.display(), "created config");
        Ok(())
    }

    /// Create the document from `defaults` if absent, otherwise add whichever
    /// default keys it lacks. Returns the resulting document.
    pub fn initialize(&self, defaults: &ConfigMap) -> Result<ConfigMap, ConfigError> {
        if !self.exists() {
            match self.create(defaults) {
                Ok(()) => return Ok(defaults.clone()),
                // Lost a race with another writer; fall through to the merge.
                Err(ConfigError::AlreadyExists(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let mut doc = self.load()?;
        let mut added = Vec::new();
        for (key, value) in defaults {
            if !doc.contains_key(key) {
                doc.insert(key.clone(), value.clone());
                added.push(key.as_str());
            }
        }
        if !added.is_empty() {
            debug!(path = %self.path.display(), ?added, "merged default options");
            self.store(&doc)?;
        }
        Ok(doc)
    }

    pub fn load(&self) -> Result<ConfigMap, ConfigError> {
        let bytes = fs::read(&self.path).map_err(|e| self.io_err(e))?;
        let value: Value = serde_json::from_slice(&bytes).map_err(|e| self.json_err(e))?;
        match value {
            Value::Object(map) => Ok(map),
            other => Err(ConfigError::InvalidOption {
                key:     "<root>".into(),
                path:    self.path.clone(),
                message: format!("expected an object, found {}", type_name(&other)),
            }),
        }
    }

    pub fn read_option(&self, key: &str) -> Result<Value, ConfigError> {
        self.load()?
            .remove(key)
            .ok_or_else(|| ConfigError::MissingOption { key: key.into(), path: self.path.clone() })
    }

    pub fn read_str(&self, key: &str) -> Result<String, ConfigError> {
        match self.read_option(key)? {
            Value::String(s) => Ok(s),
            other => Err(self.invalid(key, format!("expected a string, found {}", type_name(&other)))),
        }
    }

    pub fn read_path(&self, key: &str) -> Result<PathBuf, ConfigError> {
        self.read_str(key).map(PathBuf::from)
    }

    pub fn read_u64(&self, key: &str) -> Result<u64, ConfigError> {
        let value = self.read_option(key)?;
        value
            .as_u64()
            .ok_or_else(|| self.invalid(key, format!("expected an unsigned integer, found {}", type_name(&value))))
    }

    pub fn read_bool(&self, key: &str) -> Result<bool, ConfigError> {
        let value = self.read_option(key)?;
        value
            .as_bool()
            .ok_or_else(|| self.invalid(key, format!("expected a boolean, found {}", type_name(&value))))
    }

    /// Read-modify-write of the whole document. The document must exist.
    pub fn write_option(&self, key: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
        let mut doc = self.load()?;
        doc.insert(key.to_string(), value.into());
        self.store(&doc)
    }

    fn store(&self, doc: &ConfigMap) -> Result<(), ConfigError> {
        let bytes = self.encode(doc)?;
        fs::write(&self.path, bytes).map_err(|e| self.io_err(e))
    }

    fn encode(&self, doc: &ConfigMap) -> Result<Vec<u8>, ConfigError> {
        serde_json::to_vec_pretty(doc).map_err(|e| self.json_err(e))
    }

    fn ensure_parent(&self) -> Result<(), ConfigError> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                fs::create_dir_all(dir).map_err(|e| ConfigError::Io { path: dir.to_path_buf(), source: e })
            }
            _ => Ok(()),
        }
    }

    fn io_err(&self, source: std::io::Error) -> ConfigError {
        ConfigError::Io { path: self.path.clone(), source }
    }

    fn json_err(&self, source: serde_json::Error) -> ConfigError {
        ConfigError::Json { path: self.path.clone(), source }
    }

    fn invalid(&self, key: &str, message: String) -> ConfigError {
        ConfigError::InvalidOption { key: key.into(), path: self.path.clone(), message }
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null      => "null",
        Value::Bool(_)   => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_)  => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Root settings ─────────────────────────────────────────────────────────────

/// Snapshot of the root config handed to every handler through the context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootSettings {
    pub root_name:         String,
    pub bin_name:          String,
    /// User documents folder everything else hangs off.
    pub base:              PathBuf,
    pub base_root:         PathBuf,
    /// Shared package environment used by tool handlers.
    pub env:               PathBuf,
    pub assets:            PathBuf,
    pub cache:             PathBuf,
    /// Where helper scripts and downloaded tool binaries live.
    pub tools:             PathBuf,
    pub handlers:          PathBuf,
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

fn default_tool_timeout() -> u64 {
    DEFAULT_TOOL_TIMEOUT_SECS
}

impl RootSettings {
    /// Defaults derived from the documents folder `base`.
    pub fn defaults(config_dir: &Path, base: &Path) -> Self {
        let base_root = base.join(ROOT_NAME);
        Self {
            root_name:         ROOT_NAME.into(),
            bin_name:          BIN_NAME.into(),
            base:              base.to_path_buf(),
            env:               base_root.join("env"),
            assets:            base_root.join("assets"),
            cache:             base_root.join("cache"),
            tools:             base_root.join("tools"),
            handlers:          handlers_dir(config_dir),
            base_root,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
        }
    }

    pub fn to_map(&self) -> ConfigMap {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => ConfigMap::new(),
        }
    }

    pub fn from_map(map: ConfigMap, path: &Path) -> Result<Self, ConfigError> {
        serde_json::from_value(Value::Object(map))
            .map_err(|e| ConfigError::Json { path: path.to_path_buf(), source: e })
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs.max(1))
    }

    /// Bootstrap: create the root config on first run, fill in options added
    /// since, then create the folders it names.
    pub fn load_or_init(config_dir: &Path, base: &Path) -> Result<Self, ConfigError> {
        let store    = ConfigStore::new(root_config_path(config_dir));
        let defaults = Self::defaults(config_dir, base).to_map();
        let doc      = store.initialize(&defaults)?;
        let settings = Self::from_map(doc, store.path())?;

        for dir in [&settings.base_root, &settings.assets, &settings.cache, &settings.tools, &settings.handlers] {
            fs::create_dir_all(dir).map_err(|e| ConfigError::Io { path: dir.clone(), source: e })?;
        }
        Ok(settings)
    }
}
