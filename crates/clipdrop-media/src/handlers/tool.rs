// crates/clipdrop-media/src/handlers/tool.rs
//
// Shared plumbing for handlers that shell out:
//
//   stage_input   clipboard → file the tool can read (cache folder, or the
//                 dropped file itself)
//   ToolRecipe    program + argument template + env + output naming
//   run_recipe    run it, check the output exists, repoint the MediaUnit
//
// The repointed unit is then saved into the project asset folder by the
// dispatcher like any other paste.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use clipdrop_core::config::ConfigStore;
use clipdrop_core::context::HandlerContext;
use clipdrop_core::error::{PasteError, Result};
use clipdrop_core::formats::FormatTag;
use clipdrop_core::media::{MediaUnit, TypeTag};
use clipdrop_core::snapshot::ContentSnapshot;
use serde_json::Value;
use tracing::{debug, info, warn};
use crate::mime::type_tag_for_path;
use crate::process::{expand_args, find_executable, ToolInvocation};

/// Which clipboard content a tool reads, in order of preference.
pub fn stage_input(ctx: &HandlerContext, snapshot: &ContentSnapshot, accepts: &[FormatTag]) -> Result<MediaUnit> {
    for tag in accepts {
        if !snapshot.has(*tag) {
            continue;
        }
        match *tag {
            FormatTag::FILE_DROP => {
                if let Some(first) = snapshot.file_list().into_iter().next() {
                    return Ok(MediaUnit::from_path(type_tag_for_path(&first), first));
                }
            }
            FormatTag::BITMAP => {
                let mut media = MediaUnit::new(TypeTag::IMAGE).with_clipboard(snapshot.clone());
                media.save(ctx.cache_dir(), ctx.codecs())?;
                return Ok(media);
            }
            FormatTag::TEXT => {
                if let Some(text) = snapshot.text() {
                    let mut media = MediaUnit::from_text(TypeTag::TEXT, text);
                    media.save(ctx.cache_dir(), ctx.codecs())?;
                    return Ok(media);
                }
            }
            _ => {}
        }
    }
    Err(PasteError::NoCompatibleFormat)
}

/// The file a staged unit lives in.
pub fn input_path(media: &MediaUnit) -> Result<PathBuf> {
    if let Ok(dest) = media.destination() {
        return Ok(dest.to_path_buf());
    }
    media
        .source_path()
        .map(Path::to_path_buf)
        .ok_or_else(|| PasteError::MissingSource(media.type_tag().to_string()))
}

/// `{dir}/{input stem}{suffix}.{ext}`.
pub fn output_path(dir: &Path, input: &Path, suffix: &str, extension: Option<&str>) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext  = extension
        .map(str::to_string)
        .or_else(|| input.extension().map(|e| e.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "bin".into());
    dir.join(format!("{stem}{suffix}.{ext}"))
}

/// Every string/number/bool option of a handler's store, usable as `{key}`
/// in argument templates.
pub fn config_vars(store: &ConfigStore) -> Vec<(String, OsString)> {
    let doc = match store.load() {
        Ok(doc) => doc,
        Err(e) => {
            warn!("handler config unreadable: {e}");
            return Vec::new();
        }
    };
    doc.into_iter()
        .filter_map(|(k, v)| {
            let s = match v {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b)   => b.to_string(),
                _ => return None,
            };
            Some((k, OsString::from(s)))
        })
        .collect()
}

pub fn string_list(store: &ConfigStore, key: &str) -> Result<Vec<String>> {
    let value = store.read_option(key)?;
    let items = value.as_array().ok_or_else(|| clipdrop_core::ConfigError::InvalidOption {
        key:     key.into(),
        path:    store.path().to_path_buf(),
        message: "expected a list of strings".into(),
    })?;
    Ok(items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
}

pub fn resolve_program(program: &str, search: &[PathBuf]) -> Option<PathBuf> {
    find_executable(program, search)
}

// ── Recipe ────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct ToolRecipe {
    /// Name used in errors and logs.
    pub tool:              String,
    pub program:           PathBuf,
    pub args:              Vec<String>,
    /// Placeholder values besides `{input}` and `{output}`.
    pub vars:              Vec<(String, OsString)>,
    pub env:               Vec<(String, OsString)>,
    pub output_suffix:     String,
    pub output_extension:  Option<String>,
    pub output_type:       Option<TypeTag>,
    pub stderr_is_failure: bool,
}

impl ToolRecipe {
    pub fn new(tool: impl Into<String>, program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            tool:              tool.into(),
            program:           program.into(),
            args,
            vars:              Vec::new(),
            env:               Vec::new(),
            output_suffix:     "-out".into(),
            output_extension:  None,
            output_type:       None,
            stderr_is_failure: true,
        }
    }
}

/// Run `recipe` on the staged `media` and point it at the tool's output.
pub fn run_recipe(ctx: &HandlerContext, recipe: &ToolRecipe, mut media: MediaUnit) -> Result<MediaUnit> {
    let input = input_path(&media)?;
    let out_dir = ctx.cache_dir();
    fs::create_dir_all(out_dir).map_err(|e| PasteError::io(out_dir, e))?;
    let output = output_path(out_dir, &input, &recipe.output_suffix, recipe.output_extension.as_deref());

    let mut vars: Vec<(&str, &std::ffi::OsStr)> = recipe
        .vars
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_os_str()))
        .collect();
    vars.push(("input", input.as_os_str()));
    vars.push(("output", output.as_os_str()));
    let args = expand_args(&recipe.args, &vars);
    debug!(tool = %recipe.tool, input = %input.display(), output = %output.display(), "tool recipe expanded");

    // Output names repeat across sessions; only a file this run wrote counts.
    match fs::remove_file(&output) {
        Ok(()) => debug!(output = %output.display(), "stale tool output removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(PasteError::io(&output, e)),
    }

    ToolInvocation::new(recipe.tool.clone(), recipe.program.clone())
        .args(args)
        .envs(recipe.env.iter().cloned())
        .current_dir(out_dir)
        .timeout(ctx.tool_timeout())
        .cancel(ctx.cancel().clone())
        .stderr_is_failure(recipe.stderr_is_failure)
        .run()?;

    if !output.is_file() {
        return Err(PasteError::tool(
            recipe.tool.clone(),
            format!("finished but wrote no {}", output.display()),
        ));
    }

    let tag = recipe.output_type.clone().unwrap_or_else(|| type_tag_for_path(&output));
    info!(tool = %recipe.tool, output = %output.display(), "tool output ready");
    media.repoint(tag, output);
    Ok(media)
}

/// Copy a helper script into `dir` unless a copy is already there.
pub fn stage_script(script: &Path, dir: &Path) -> Result<PathBuf> {
    let name = script
        .file_name()
        .ok_or_else(|| PasteError::MissingSource(script.display().to_string()))?;
    let staged = dir.join(name);
    if staged.is_file() {
        return Ok(staged);
    }
    if !script.is_file() {
        return Err(PasteError::MissingSource(script.display().to_string()));
    }
    fs::create_dir_all(dir).map_err(|e| PasteError::io(dir, e))?;
    fs::copy(script, &staged).map_err(|e| PasteError::io(script, e))?;
    info!(script = %staged.display(), "helper script staged");
    Ok(staged)
}
