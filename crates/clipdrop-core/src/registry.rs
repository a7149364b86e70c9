// crates/clipdrop-core/src/registry.rs
//
// Handler registry, built once per invocation by `Registry::discover` and
// never mutated afterwards. Ordered by id so the offered buttons come out in
// the same order every time.
//
// A source that fails to load is logged and reported in `Discovery::failures`;
// the remaining sources still register. An id can register only once: the
// first source wins and later duplicates are reported as failures.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use crate::error::PasteError;
use crate::handler::{HandlerFactory, HandlerSource};

#[derive(Debug)]
pub struct DiscoveryFailure {
    pub source: String,
    pub error:  PasteError,
}

pub struct Discovery {
    pub registry: Registry,
    pub failures: Vec<DiscoveryFailure>,
}

#[derive(Clone, Default)]
pub struct Registry {
    entries: BTreeMap<String, Arc<dyn HandlerFactory>>,
}

impl Registry {
    pub fn discover<I>(sources: I) -> Discovery
    where
        I: IntoIterator<Item = Box<dyn HandlerSource>>,
    {
        let mut entries: BTreeMap<String, Arc<dyn HandlerFactory>> = BTreeMap::new();
        let mut failures = Vec::new();

        for source in sources {
            let name = source.name();
            match source.load() {
                Ok(factory) => {
                    let id = factory.id().to_string();
                    if entries.contains_key(&id) {
                        warn!(source = %name, %id, "duplicate handler id ignored");
                        failures.push(DiscoveryFailure {
                            source: name.clone(),
                            error:  PasteError::Discovery {
                                name,
                                message: format!("handler id '{id}' is already registered"),
                            },
                        });
                        continue;
                    }
                    entries.insert(id, factory);
                }
                Err(error) => {
                    warn!(source = %name, "handler source failed to load: {error}");
                    failures.push(DiscoveryFailure { source: name, error });
                }
            }
        }

        info!(
            handlers = ?entries.keys().collect::<Vec<_>>(),
            failed   = failures.len(),
            "handler discovery finished"
        );
        Discovery { registry: Registry { entries }, failures }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn HandlerFactory>> {
        self.entries.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn HandlerFactory>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
