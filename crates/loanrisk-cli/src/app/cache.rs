use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;

use loanrisk_classifiers::artifacts::ModelBundle;

type Loader = Box<dyn Fn() -> Result<ModelBundle>>;

/// Lazily loaded model bundle, reused across predictions of a session.
pub struct ModelCache {
    loader: Loader,
    bundle: Option<ModelBundle>,
    loads: usize,
}

impl ModelCache {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<ModelBundle> + 'static,
    {
        Self {
            loader: Box::new(loader),
            bundle: None,
            loads: 0,
        }
    }

    /// Cache over the bundle persisted in `dir`.
    pub fn from_dir<P: Into<PathBuf>>(dir: P) -> Self {
        let dir = dir.into();
        Self::new(move || ModelBundle::load(&dir))
    }

    /// The cached bundle, loading it on first use.
    pub fn get(&mut self) -> Result<&ModelBundle> {
        if self.bundle.is_none() {
            let start = Instant::now();
            let bundle = (self.loader)()?;
            self.loads += 1;
            log::info!(
                "model loaded ({} trees, {} features) in {:?}",
                bundle.model.n_trees(),
                bundle.schema.len(),
                start.elapsed()
            );
            self.bundle = Some(bundle);
        }
        self.bundle
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("model cache is empty after loading"))
    }

    /// Drop the cached bundle; the next `get` reloads it.
    pub fn invalidate(&mut self) {
        if self.bundle.take().is_some() {
            log::debug!("model cache invalidated");
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.bundle.is_some()
    }

    /// Number of times the loader has run.
    pub fn load_count(&self) -> usize {
        self.loads
    }
}
