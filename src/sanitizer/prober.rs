use std::collections::HashSet;

use crate::core::{log, LogLevel};

/// The modules the sandbox interpreter implements itself.
pub const NATIVE_MODULES: [&str; 3] = ["os", "sys", "io"];

/// Decides whether an import target can really be loaded in the sandbox. Only the root package is
/// consulted: if `a` is available, `a.b.c` is assumed to be as well.
pub trait AvailabilityProber {
    fn is_available(&self, root_module: &str) -> bool;

    fn is_path_available(&self, module_path: &str) -> bool {
        let root = root_of(module_path);
        let available = !root.is_empty() && self.is_available(root);
        log(LogLevel::Trace, || {
            format!("Probed module {module_path}: available={available}")
        });
        available
    }
}

impl<F> AvailabilityProber for F
where
    F: Fn(&str) -> bool,
{
    fn is_available(&self, root_module: &str) -> bool {
        self(root_module)
    }
}

/// The default prober: the native modules plus any configured extras.
#[derive(Debug, Clone, Default)]
pub struct HostModules {
    extra: HashSet<String>,
}

impl HostModules {
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extra: extra.into_iter().map(Into::into).collect(),
        }
    }
}

impl AvailabilityProber for HostModules {
    fn is_available(&self, root_module: &str) -> bool {
        NATIVE_MODULES.contains(&root_module) || self.extra.contains(root_module)
    }
}

pub fn root_of(module_path: &str) -> &str {
    module_path.split('.').next().unwrap_or_default()
}
