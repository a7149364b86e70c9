// crates/clipdrop-media/src/handlers/rembg.rs
//
// Background removal for clipboard bitmaps via rembg.
//
// Two ways to run it, picked by the `helperScript` option:
//   - empty (default): the `rembg` CLI found in the shared package env, the
//     tool folder or on PATH, driven by the `args` template
//   - a script path: the script is copied into the tool folder once and run
//     with the package env's Python as `<script> <input> <output>`
//
// Models are cached under `modelsDir`, handed to rembg as U2NET_HOME.

use std::ffi::OsString;
use std::path::PathBuf;
use clipdrop_core::config::{ConfigMap, ConfigStore};
use clipdrop_core::context::HandlerContext;
use clipdrop_core::error::{PasteError, Result};
use clipdrop_core::formats::{intersects, FormatSet, FormatTag};
use clipdrop_core::handler::{Handler, HandlerFactory, InstallGuide};
use clipdrop_core::media::{MediaUnit, TypeTag};
use clipdrop_core::snapshot::ContentSnapshot;
use serde_json::json;
use tracing::info;
use super::tool::{config_vars, resolve_program, run_recipe, stage_input, stage_script, string_list, ToolRecipe};

const ACCEPTS:       [FormatTag; 1] = [FormatTag::BITMAP];
const DEFAULT_LABEL: &str = "Remove Background";
const DOCS_URL:      &str = "https://github.com/danielgatis/rembg#installation";

#[derive(Default)]
pub struct RembgFactory;

impl HandlerFactory for RembgFactory {
    fn id(&self) -> &str {
        "rembg"
    }

    fn default_config(&self, ctx: &HandlerContext) -> ConfigMap {
        let tool_dir = ctx.tools_dir().join("rembg");
        let mut m = ConfigMap::new();
        m.insert("label".into(), DEFAULT_LABEL.into());
        m.insert("program".into(), "rembg".into());
        m.insert("args".into(), json!(["i", "-m", "{model}", "{input}", "{output}"]));
        m.insert("model".into(), "u2net".into());
        m.insert("modelsDir".into(), tool_dir.join("models").to_string_lossy().into_owned().into());
        m.insert("toolDir".into(), tool_dir.to_string_lossy().into_owned().into());
        m.insert("helperScript".into(), "".into());
        m.insert("docsUrl".into(), DOCS_URL.into());
        m
    }

    fn build(&self, ctx: &HandlerContext, config: ConfigStore) -> Result<Box<dyn Handler>> {
        Ok(Box::new(RembgHandler { ctx: ctx.clone(), config }))
    }
}

pub struct RembgHandler {
    ctx:    HandlerContext,
    config: ConfigStore,
}

impl RembgHandler {
    fn tool_dir(&self) -> PathBuf {
        self.config
            .read_path("toolDir")
            .unwrap_or_else(|_| self.ctx.tools_dir().join("rembg"))
    }

    fn helper_script(&self) -> Option<PathBuf> {
        self.config
            .read_str("helperScript")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        vec![self.ctx.env().bin_dir(), self.tool_dir()]
    }

    fn recipe(&self) -> Result<ToolRecipe> {
        let models = self.config.read_path("modelsDir")?;
        let mut env = self.ctx.env().env_vars();
        env.push(("U2NET_HOME".into(), OsString::from(models)));

        let mut recipe = match self.helper_script() {
            Some(script) => {
                let staged = stage_script(&script, &self.tool_dir())?;
                let python = self.ctx.env().python();
                let mut r = ToolRecipe::new(
                    "rembg",
                    python,
                    vec!["{script}".into(), "{input}".into(), "{output}".into()],
                );
                r.vars.push(("script".into(), staged.into_os_string()));
                r
            }
            None => {
                let program = self.config.read_str("program")?;
                let path = resolve_program(&program, &self.search_dirs())
                    .ok_or_else(|| PasteError::NotInstalled { handler: "rembg".into() })?;
                ToolRecipe::new("rembg", path, string_list(&self.config, "args")?)
            }
        };
        recipe.vars.extend(config_vars(&self.config));
        recipe.env               = env;
        recipe.output_suffix     = "-rm".into();
        recipe.output_extension  = Some("png".into());
        recipe.output_type       = Some(TypeTag::IMAGE);
        recipe.stderr_is_failure = true;
        Ok(recipe)
    }
}

impl Handler for RembgHandler {
    fn label(&self) -> String {
        self.config.read_str("label").unwrap_or_else(|_| DEFAULT_LABEL.into())
    }

    fn check_condition(&self, tags: &FormatSet) -> bool {
        intersects(tags, &ACCEPTS)
    }

    fn is_installed(&self) -> bool {
        match self.helper_script() {
            Some(_) => self.ctx.env().is_present(),
            None => self
                .config
                .read_str("program")
                .ok()
                .and_then(|p| resolve_program(&p, &self.search_dirs()))
                .is_some(),
        }
    }

    fn install(&mut self, guide: &mut dyn InstallGuide) -> Result<()> {
        let docs = self.config.read_str("docsUrl").unwrap_or_else(|_| DOCS_URL.into());
        let message = format!(
            "Background removal needs rembg.\n\n\
             Install it into the shared environment at\n{}\n\
             or anywhere on PATH, then paste again.\n\n\
             Open the installation guide?",
            self.ctx.env().root().display()
        );
        if guide.confirm("Remove Background is not installed", &message) {
            guide.open_url(&docs)?;
        }
        Ok(())
    }

    fn execute(&mut self, snapshot: &ContentSnapshot) -> Result<MediaUnit> {
        let recipe = self.recipe()?;
        let staged = stage_input(&self.ctx, snapshot, &ACCEPTS)?;
        info!("removing background");
        run_recipe(&self.ctx, &recipe, staged)
    }
}
