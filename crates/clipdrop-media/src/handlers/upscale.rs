// crates/clipdrop-media/src/handlers/upscale.rs
//
// AI upscaling of clipboard bitmaps via upscayl-bin (Real-ESRGAN, ncnn).
// upscayl-bin prints progress on stderr, so only the exit code decides
// success here.

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
use super::tool::{config_vars, resolve_program, run_recipe, stage_input, string_list, ToolRecipe};

const ACCEPTS:  [FormatTag; 1] = [FormatTag::BITMAP];
const DOCS_URL: &str = "https://github.com/upscayl/upscayl-ncnn/releases";

#[derive(Default)]
pub struct UpscaleFactory;

impl HandlerFactory for UpscaleFactory {
    fn id(&self) -> &str {
        "upscale"
    }

    fn default_config(&self, ctx: &HandlerContext) -> ConfigMap {
        let tool_dir = ctx.tools_dir().join("upscayl");
        let mut m = ConfigMap::new();
        m.insert("program".into(), "upscayl-bin".into());
        m.insert(
            "args".into(),
            json!(["-i", "{input}", "-o", "{output}", "-n", "{model}", "-s", "{scale}", "-m", "{modelsDir}"]),
        );
        m.insert("model".into(), "realesrgan-x4plus".into());
        m.insert("scale".into(), 2.into());
        m.insert("modelsDir".into(), tool_dir.join("models").to_string_lossy().into_owned().into());
        m.insert("toolDir".into(), tool_dir.to_string_lossy().into_owned().into());
        m.insert("docsUrl".into(), DOCS_URL.into());
        m
    }

    fn build(&self, ctx: &HandlerContext, config: ConfigStore) -> Result<Box<dyn Handler>> {
        Ok(Box::new(UpscaleHandler { ctx: ctx.clone(), config }))
    }
}

pub struct UpscaleHandler {
    ctx:    HandlerContext,
    config: ConfigStore,
}

impl UpscaleHandler {
    fn scale(&self) -> u64 {
        self.config.read_u64("scale").unwrap_or(2).clamp(2, 4)
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        let tool_dir = self
            .config
            .read_path("toolDir")
            .unwrap_or_else(|_| self.ctx.tools_dir().join("upscayl"));
        vec![tool_dir.clone(), tool_dir.join("bin")]
    }

    fn program(&self) -> Option<PathBuf> {
        let name = self.config.read_str("program").ok()?;
        resolve_program(&name, &self.search_dirs())
    }
}

impl Handler for UpscaleHandler {
    fn label(&self) -> String {
        self.config
            .read_str("label")
            .unwrap_or_else(|_| format!("Upscale x{}", self.scale()))
    }

    fn check_condition(&self, tags: &FormatSet) -> bool {
        intersects(tags, &ACCEPTS)
    }

    fn is_installed(&self) -> bool {
        self.program().is_some()
    }

    fn install(&mut self, guide: &mut dyn InstallGuide) -> Result<()> {
        let docs = self.config.read_str("docsUrl").unwrap_or_else(|_| DOCS_URL.into());
        let dir  = self.search_dirs().into_iter().next().unwrap_or_default();
        let message = format!(
            "Upscaling needs upscayl-bin and its models.\n\n\
             Unpack a release into\n{}\n\
             (or put upscayl-bin on PATH), then paste again.\n\n\
             Open the download page?",
            dir.display()
        );
        if guide.confirm("Upscale is not installed", &message) {
            guide.open_url(&docs)?;
        }
        Ok(())
    }

    fn execute(&mut self, snapshot: &ContentSnapshot) -> Result<MediaUnit> {
        let program = self
            .program()
            .ok_or_else(|| PasteError::NotInstalled { handler: "upscale".into() })?;
        let mut recipe = ToolRecipe::new("upscayl", program, string_list(&self.config, "args")?);
        recipe.vars              = config_vars(&self.config);
        recipe.vars.retain(|(k, _)| k != "scale");
        recipe.vars.push(("scale".into(), self.scale().to_string().into()));
        recipe.output_suffix     = format!("-x{}", self.scale());
        recipe.output_extension  = Some("png".into());
        recipe.output_type       = Some(TypeTag::IMAGE);
        recipe.stderr_is_failure = false;

        let staged = stage_input(&self.ctx, snapshot, &ACCEPTS)?;
        info!(scale = self.scale(), "upscaling image");
        run_recipe(&self.ctx, &recipe, staged)
    }
}
