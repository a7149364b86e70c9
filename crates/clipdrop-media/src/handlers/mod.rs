// crates/clipdrop-media/src/handlers/mod.rs
//
// Built-in handlers plus the manifest scanner.
//
// ╔══════════════════════════════════════════════════════════════╗
// ║  HOW TO ADD A HANDLER: one line, everything else is automatic ║
// ╚══════════════════════════════════════════════════════════════╝
//
//   1. Create `handlers/my_handler.rs` with a `Default` factory that
//      implements `HandlerFactory` and a `Handler` it builds.
//
//   2. Add ONE line to `declare_handlers!` below:
//        my_handler::MyHandlerFactory,
//
// Discovery, config seeding, filtering and the selector button all pick it
// up. Tools that need no code can be declared on disk instead; see
// `manifest.rs`.

use std::path::Path;
use std::sync::Arc;
use clipdrop_core::error::Result;
use clipdrop_core::handler::{HandlerFactory, HandlerSource};

pub mod manifest;
pub mod tool;

// ── Drop-in registration ──────────────────────────────────────────────────────

macro_rules! declare_handlers {
    ( $( $module:ident :: $factory:ident ),* $(,)? ) => {
        $( pub mod $module; )*

        fn builtin_factories() -> Vec<Arc<dyn HandlerFactory>> {
            vec![ $( Arc::new($module::$factory::default()) ),* ]
        }
    };
}

declare_handlers! {
    paste::PasteFactory,
    rembg::RembgFactory,
    upscale::UpscaleFactory,
}

struct BuiltinSource(Arc<dyn HandlerFactory>);

impl HandlerSource for BuiltinSource {
    fn name(&self) -> String {
        format!("builtin:{}", self.0.id())
    }

    fn load(&self) -> Result<Arc<dyn HandlerFactory>> {
        Ok(self.0.clone())
    }
}

/// Built-ins first, then one source per manifest under `handlers_dir`.
/// Built-ins therefore win any id clash.
pub fn handler_sources(handlers_dir: &Path) -> Vec<Box<dyn HandlerSource>> {
    let mut sources: Vec<Box<dyn HandlerSource>> = builtin_factories()
        .into_iter()
        .map(|f| Box::new(BuiltinSource(f)) as Box<dyn HandlerSource>)
        .collect();
    sources.extend(manifest::scan(handlers_dir));
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipdrop_core::registry::Registry;

    #[test]
    fn builtins_register_alphabetically() {
        let dir   = tempfile::tempdir().unwrap();
        let found = Registry::discover(handler_sources(dir.path()));
        assert_eq!(found.registry.ids().collect::<Vec<_>>(), vec!["paste", "rembg", "upscale"]);
        assert!(found.failures.is_empty());
    }

    #[test]
    fn manifest_cannot_shadow_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("paste");
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(
            sub.join(manifest::MANIFEST_FILE),
            r#"{ "id": "paste", "label": "Evil", "accepts": [1], "program": "sh" }"#,
        )
        .unwrap();

        let found = Registry::discover(handler_sources(dir.path()));
        assert_eq!(found.registry.len(), 3);
        assert_eq!(found.failures.len(), 1);
    }

    #[test]
    fn broken_manifest_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("broken");
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join(manifest::MANIFEST_FILE), "{ nope").unwrap();

        let found = Registry::discover(handler_sources(dir.path()));
        assert_eq!(found.registry.len(), 3);
        assert_eq!(found.failures.len(), 1);
        assert!(found.failures[0].source.contains("broken"));
    }
}
