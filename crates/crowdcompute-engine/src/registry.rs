use crowdcompute_common::Plugin;
use std::collections::HashMap;
use std::sync::Arc;

/// In-process `job_type -> plugin` mapping (`spec.md` §2 component 2).
///
/// Both binaries build their own registry at startup: the coordinator needs
/// plugins that implement `tasking`/`on_complete`, the worker needs only
/// `execute` — each registers the subset it actually uses, the same way the
/// prototype's `coordinator/main.py` and `worker/main.py` only import the
/// plugin modules they need.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: HashMap<&'static str, Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.insert(plugin.job_type(), plugin);
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(job_type).cloned()
    }

    pub fn job_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.plugins.keys().copied()
    }
}

impl FromIterator<Arc<dyn Plugin>> for PluginRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Plugin>>>(iter: I) -> Self {
        let mut registry = Self::new();
        for plugin in iter {
            registry.register(plugin);
        }
        registry
    }
}
