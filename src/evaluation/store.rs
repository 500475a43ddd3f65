//! Read access to finalized runs.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::run::AnalysisRun;
use crate::{Error, Result};

/// Source of finalized runs for the evaluator.
pub trait RunStore: Send + Sync {
    /// Load one run.
    ///
    /// # Errors
    /// `NotFound` for unknown ids, `UpstreamUnavailable` when the backing
    /// store cannot be read.
    fn load_run(&self, run_id: &str) -> Result<AnalysisRun>;
}

impl<S: RunStore + ?Sized> RunStore for Arc<S> {
    fn load_run(&self, run_id: &str) -> Result<AnalysisRun> {
        (**self).load_run(run_id)
    }
}

impl<S: RunStore + ?Sized> RunStore for &S {
    fn load_run(&self, run_id: &str) -> Result<AnalysisRun> {
        (**self).load_run(run_id)
    }
}

/// Runs held in memory, keyed by run id.
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    runs: RwLock<HashMap<String, Arc<AnalysisRun>>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a run.
    pub fn insert(&self, run: AnalysisRun) {
        self.runs.write().insert(run.run_id.clone(), Arc::new(run));
    }

    pub fn remove(&self, run_id: &str) -> Option<Arc<AnalysisRun>> {
        self.runs.write().remove(run_id)
    }

    pub fn len(&self) -> usize {
        self.runs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.read().is_empty()
    }
}

impl RunStore for InMemoryRunStore {
    fn load_run(&self, run_id: &str) -> Result<AnalysisRun> {
        self.runs
            .read()
            .get(run_id)
            .map(|run| run.as_ref().clone())
            .ok_or_else(|| Error::NotFound(format!("run '{}'", run_id)))
    }
}

/// Runs stored as `<run_id>.json` files in one directory.
#[derive(Debug, Clone)]
pub struct JsonDirRunStore {
    dir: PathBuf,
}

impl JsonDirRunStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, run_id: &str) -> Result<PathBuf> {
        let valid = !run_id.is_empty()
            && run_id != "."
            && run_id != ".."
            && !run_id.contains(['/', '\\']);
        if !valid {
            return Err(Error::InvalidInput(format!("invalid run id '{}'", run_id)));
        }
        Ok(self.dir.join(format!("{}.json", run_id)))
    }

    /// Write a run as pretty-printed JSON, replacing any existing file.
    pub fn save(&self, run: &AnalysisRun) -> Result<()> {
        let path = self.path_for(&run.run_id)?;
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(run)?;
        fs::write(&path, json)?;
        debug!(run_id = %run.run_id, path = %path.display(), "saved run");
        Ok(())
    }
}

impl RunStore for JsonDirRunStore {
    fn load_run(&self, run_id: &str) -> Result<AnalysisRun> {
        let path = self.path_for(run_id)?;
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(Error::NotFound(format!("run '{}'", run_id)));
            }
            Err(e) => {
                return Err(Error::UpstreamUnavailable(format!(
                    "failed to read '{}': {}",
                    path.display(),
                    e
                )));
            }
        };
        serde_json::from_str(&contents).map_err(|e| {
            Error::UpstreamUnavailable(format!("corrupt run record '{}': {}", path.display(), e))
        })
    }
}
