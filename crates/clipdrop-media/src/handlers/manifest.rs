// crates/clipdrop-media/src/handlers/manifest.rs
//
// Disk-declared tool handlers. Any `{handlers_dir}/<dir>/handler.json` adds
// an external-tool action without recompiling:
//
//   {
//     "id":           "grayscale",
//     "label":        "Grayscale",
//     "accepts":      [2],
//     "program":      "magick",
//     "args":         ["{input}", "-colorspace", "Gray", "{output}"],
//     "env":          { "MAGICK_THREAD_LIMIT": "2" },
//     "outputSuffix": "-gray",
//     "docsUrl":      "https://imagemagick.org/script/download.php",
//     "config":       { }
//   }
//
// `config` seeds the handler's private store; its string/number values are
// available as `{key}` placeholders next to `{input}` and `{output}`.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use clipdrop_core::config::{ConfigMap, ConfigStore};
use clipdrop_core::context::{prepend_path, HandlerContext};
use clipdrop_core::error::{PasteError, Result};
use clipdrop_core::formats::{intersects, FormatSet, FormatTag};
use clipdrop_core::handler::{Handler, HandlerFactory, HandlerSource, InstallGuide};
use clipdrop_core::media::{MediaUnit, TypeTag};
use clipdrop_core::snapshot::ContentSnapshot;
use serde::Deserialize;
use tracing::{debug, info, warn};
use super::tool::{config_vars, resolve_program, run_recipe, stage_input, ToolRecipe};

pub const MANIFEST_FILE: &str = "handler.json";

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id:                  String,
    pub label:               String,
    pub accepts:             Vec<FormatTag>,
    pub program:             String,
    #[serde(default = "default_args")]
    pub args:                Vec<String>,
    #[serde(default)]
    pub env:                 BTreeMap<String, String>,
    #[serde(default = "default_suffix")]
    pub output_suffix:       String,
    #[serde(default)]
    pub output_extension:    Option<String>,
    #[serde(default)]
    pub output_type:         Option<String>,
    #[serde(default)]
    pub docs_url:            Option<String>,
    #[serde(default = "default_true")]
    pub stderr_is_failure:   bool,
    #[serde(default)]
    pub config:              ConfigMap,
}

fn default_args() -> Vec<String> {
    vec!["{input}".into(), "{output}".into()]
}

fn default_suffix() -> String {
    "-out".into()
}

fn default_true() -> bool {
    true
}

impl Manifest {
    pub fn parse(bytes: &[u8], path: &Path) -> Result<Self> {
        let m: Manifest = serde_json::from_slice(bytes).map_err(|e| discovery(path, e.to_string()))?;
        m.validate(path)?;
        Ok(m)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let id_ok = !self.id.is_empty()
            && self.id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !id_ok {
            return Err(discovery(path, format!("invalid id '{}' (use letters, digits, '-' or '_')", self.id)));
        }
        if self.accepts.is_empty() {
            return Err(discovery(path, "'accepts' lists no format tags".into()));
        }
        if self.program.trim().is_empty() {
            return Err(discovery(path, "'program' is empty".into()));
        }
        if self.output_suffix.is_empty() {
            return Err(discovery(path, "'outputSuffix' must not be empty".into()));
        }
        Ok(())
    }
}

fn discovery(path: &Path, message: String) -> PasteError {
    PasteError::Discovery { name: path.display().to_string(), message }
}

/// One source per `handler.json` found one level below `dir`. A missing
/// folder yields no sources.
pub fn scan(dir: &Path) -> Vec<Box<dyn HandlerSource>> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            debug!(dir = %dir.display(), "no manifest handlers: {e}");
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path().join(MANIFEST_FILE))
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    paths
        .into_iter()
        .map(|path| Box::new(ManifestSource { path }) as Box<dyn HandlerSource>)
        .collect()
}

pub struct ManifestSource {
    path: PathBuf,
}

impl HandlerSource for ManifestSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Arc<dyn HandlerFactory>> {
        let bytes    = fs::read(&self.path).map_err(|e| PasteError::io(&self.path, e))?;
        let manifest = Manifest::parse(&bytes, &self.path)?;
        let dir      = self.path.parent().map(Path::to_path_buf).unwrap_or_default();
        info!(id = %manifest.id, path = %self.path.display(), "loaded manifest handler");
        Ok(Arc::new(ManifestFactory { manifest, dir }))
    }
}

pub struct ManifestFactory {
    manifest: Manifest,
    dir:      PathBuf,
}

impl HandlerFactory for ManifestFactory {
    fn id(&self) -> &str {
        &self.manifest.id
    }

    fn default_config(&self, _ctx: &HandlerContext) -> ConfigMap {
        let mut m = self.manifest.config.clone();
        m.entry("label").or_insert_with(|| self.manifest.label.clone().into());
        m
    }

    fn build(&self, ctx: &HandlerContext, config: ConfigStore) -> Result<Box<dyn Handler>> {
        Ok(Box::new(ManifestHandler {
            ctx:      ctx.clone(),
            manifest: self.manifest.clone(),
            dir:      self.dir.clone(),
            config,
        }))
    }
}

pub struct ManifestHandler {
    ctx:      HandlerContext,
    manifest: Manifest,
    dir:      PathBuf,
    config:   ConfigStore,
}

impl ManifestHandler {
    fn program(&self) -> Option<PathBuf> {
        resolve_program(&self.manifest.program, &[self.dir.clone(), self.dir.join("bin")])
    }
}

impl Handler for ManifestHandler {
    fn label(&self) -> String {
        self.config.read_str("label").unwrap_or_else(|_| self.manifest.label.clone())
    }

    fn check_condition(&self, tags: &FormatSet) -> bool {
        intersects(tags, &self.manifest.accepts)
    }

    fn is_installed(&self) -> bool {
        self.program().is_some()
    }

    fn install(&mut self, guide: &mut dyn InstallGuide) -> Result<()> {
        let title = format!("{} is not installed", self.manifest.label);
        match &self.manifest.docs_url {
            Some(url) => {
                let message = format!(
                    "'{}' was not found in {} or on PATH.\n\nOpen {url}?",
                    self.manifest.program,
                    self.dir.display()
                );
                if guide.confirm(&title, &message) {
                    guide.open_url(url)?;
                }
            }
            None => {
                let message = format!(
                    "'{}' was not found in {} or on PATH.",
                    self.manifest.program,
                    self.dir.display()
                );
                guide.notify(&title, &message);
            }
        }
        Ok(())
    }

    fn execute(&mut self, snapshot: &ContentSnapshot) -> Result<MediaUnit> {
        let program = self
            .program()
            .ok_or_else(|| PasteError::NotInstalled { handler: self.manifest.id.clone() })?;

        let mut recipe = ToolRecipe::new(self.manifest.id.clone(), program, self.manifest.args.clone());
        recipe.vars = config_vars(&self.config);
        recipe.vars.push(("handlerDir".into(), self.dir.clone().into_os_string()));
        recipe.env = self
            .manifest
            .env
            .iter()
            .map(|(k, v)| (k.clone(), OsString::from(v)))
            .collect();
        if !recipe.env.iter().any(|(k, _)| k == "PATH") {
            recipe.env.push(("PATH".into(), prepend_path(&self.dir)));
        }
        recipe.output_suffix     = self.manifest.output_suffix.clone();
        recipe.output_extension  = self.manifest.output_extension.clone();
        recipe.output_type       = self.manifest.output_type.clone().map(TypeTag::new);
        recipe.stderr_is_failure = self.manifest.stderr_is_failure;

        let staged = stage_input(&self.ctx, snapshot, &self.manifest.accepts)?;
        if self.manifest.accepts.contains(&FormatTag::FILE_DROP) && snapshot.file_list().len() > 1 {
            warn!(id = %self.manifest.id, "only the first dropped file is processed");
        }
        run_recipe(&self.ctx, &recipe, staged)
    }
}
