use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use parking_lot::RwLock;
use crate::error::DetectError;
use crate::Result;

/// Ordered class names. Index `i` names class id `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    names: Vec<String>,
}

impl LabelSet {
    /// Reads one class name per line. Lines are kept verbatim apart from the line terminator.
    ///
    /// # Returns
    ///
    /// `DetectError::LabelLoad` if the file is missing, unreadable, or holds no names.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let file = fs::File::open(path).map_err(|e| DetectError::label_load(&shown, e))?;

        let mut names = Vec::new();
        for line in BufReader::new(file).lines() {
            names.push(line.map_err(|e| DetectError::label_load(&shown, e))?);
        }

        if names.iter().all(|n| n.trim().is_empty()) {
            return Err(DetectError::label_load(&shown, "file contains no class names"));
        }
        log::debug!("Loaded {} labels from {}", names.len(), shown);
        Ok(Self { names })
    }

    pub fn from_names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Result<Self> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(DetectError::label_load("<memory>", "no class names given"));
        }
        Ok(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, class_id: usize) -> Option<&str> {
        self.names.get(class_id).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(String::as_str)
    }
}

/// Shared handle to the current `LabelSet`.
///
/// Readers take a snapshot with `current()` and keep it for the whole frame. A reload swaps the
/// inner `Arc`, so a snapshot already handed out stays valid until dropped.
#[derive(Debug, Clone)]
pub struct LabelStore {
    inner: Arc<RwLock<Arc<LabelSet>>>,
}

impl LabelStore {
    pub fn new(labels: LabelSet) -> Self {
        Self { inner: Arc::new(RwLock::new(Arc::new(labels))) }
    }

    pub fn current(&self) -> Arc<LabelSet> {
        self.inner.read().clone()
    }

    /// Loads `path` and publishes it. On failure the previous set stays in place.
    pub fn reload<P: AsRef<Path>>(&self, path: P) -> Result<Arc<LabelSet>> {
        let fresh = LabelSet::load(path)?;
        Ok(self.replace(fresh))
    }

    pub fn replace(&self, labels: LabelSet) -> Arc<LabelSet> {
        let fresh = Arc::new(labels);
        *self.inner.write() = fresh.clone();
        fresh
    }
}
