use std::any::TypeId;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::{type_ident, MethodDescriptor, MethodTable, Suite, SuiteDescriptor};
use crate::symbols::SourceIndex;

/// Resolves a suite's test methods into declaration order.
///
/// Method tables are name-ordered; declaration order is recovered from
/// positions given at registration or found by scanning the declaring file.
/// Descriptors are cached per suite type, source indexes per path.
pub struct MethodOrderResolver {
    source_root: Option<PathBuf>,
    descriptors: Mutex<HashMap<TypeId, Arc<SuiteDescriptor>>>,
    sources: Mutex<HashMap<String, Option<Arc<SourceIndex>>>>,
}

impl MethodOrderResolver {
    pub fn new(source_root: Option<PathBuf>) -> Self {
        Self {
            source_root,
            descriptors: Mutex::new(HashMap::new()),
            sources: Mutex::new(HashMap::new()),
        }
    }

    /// Ordered descriptor for suite `S`, computed on first use.
    pub fn resolve<S: Suite>(&self, table: &MethodTable<S>) -> Arc<SuiteDescriptor> {
        let key = TypeId::of::<S>();
        if let Some(found) = self.lock_descriptors().get(&key) {
            return Arc::clone(found);
        }

        let descriptor = Arc::new(self.build_descriptor(table));
        // A racing resolver may have inserted first; keep whichever landed.
        Arc::clone(self.lock_descriptors().entry(key).or_insert(descriptor))
    }

    fn build_descriptor<S: Suite>(&self, table: &MethodTable<S>) -> SuiteDescriptor {
        let type_name = type_ident::<S>();
        let index = table.source_file().and_then(|file| self.source_index(file));

        let candidates = table
            .entries()
            .map(|(name, entry)| {
                let declared = index.as_ref().and_then(|idx| idx.find(type_name, name));
                let position = entry.position.or(declared.map(|d| d.position));
                let exported = declared.map_or(true, |d| d.is_pub);
                MethodDescriptor::new(name, position, exported)
            })
            .collect();

        let methods = order_methods(candidates);
        for method in methods.iter().filter(|m| m.position.is_none()) {
            tracing::warn!(
                "No declaration position for {}.{}; running it after positioned methods",
                S::name(),
                method.name
            );
        }
        tracing::debug!("Resolved {} methods for suite {}", methods.len(), S::name());

        SuiteDescriptor {
            name: S::name().to_string(),
            type_name: type_name.to_string(),
            methods,
        }
    }

    /// Parsed index of `file`, or `None` if no candidate path is readable.
    fn source_index(&self, file: &str) -> Option<Arc<SourceIndex>> {
        let mut sources = self.sources.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = sources.get(file) {
            return cached.clone();
        }

        let loaded = self
            .candidate_paths(file)
            .into_iter()
            .find(|path| path.is_file())
            .and_then(|path| match SourceIndex::load(&path) {
                Ok(index) => Some(Arc::new(index)),
                Err(e) => {
                    tracing::warn!("Failed to index {}: {}", path.display(), e);
                    None
                }
            });
        if loaded.is_none() {
            tracing::warn!("{}", crate::Error::SourceUnavailable { file: file.to_string() });
        }

        sources.insert(file.to_string(), loaded.clone());
        loaded
    }

    fn candidate_paths(&self, file: &str) -> Vec<PathBuf> {
        let given = Path::new(file);
        let mut paths = vec![given.to_path_buf()];
        if given.is_absolute() {
            return paths;
        }

        if let Some(root) = &self.source_root {
            paths.push(root.join(given));
        }
        let manifest_dirs = [
            std::env::var_os("CARGO_MANIFEST_DIR").map(PathBuf::from),
            Some(PathBuf::from(env!("CARGO_MANIFEST_DIR"))),
        ];
        for dir in manifest_dirs.into_iter().flatten() {
            // file!() is relative to the workspace root, which may sit above
            // the package directory.
            for ancestor in dir.ancestors() {
                paths.push(ancestor.join(given));
            }
        }
        paths
    }

    fn lock_descriptors(&self) -> std::sync::MutexGuard<'_, HashMap<TypeId, Arc<SuiteDescriptor>>> {
        self.descriptors.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MethodOrderResolver {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Stable sort into declaration order: ascending (line, column), with
/// unpositioned methods after all positioned ones in their incoming order.
pub fn order_methods(mut methods: Vec<MethodDescriptor>) -> Vec<MethodDescriptor> {
    methods.sort_by(|a, b| match (a.position, b.position) {
        (Some(pa), Some(pb)) => pa.cmp(&pb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    methods
}
