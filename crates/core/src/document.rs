//! The score model persisted as a JSON document.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::store::ScoreModel;

/// A score model bound to the file it lives in.
#[derive(Debug)]
pub struct ScoreboardDocument {
    path: PathBuf,
    model: ScoreModel,
    serial: u64,
}

impl ScoreboardDocument {
    /// Empty document that will be saved at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            model: ScoreModel::new(),
            serial: 0,
        }
    }

    /// Read the document at `path`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = fs::read(&path)
            .with_context(|| format!("failed to read score document {}", path.display()))?;
        let model: ScoreModel = serde_json::from_slice(&data)
            .with_context(|| format!("failed to parse score document {}", path.display()))?;
        debug!(
            "loaded {} tables and {} scoreboards from {}",
            model.tables().len(),
            model.scoreboards().len(),
            path.display()
        );
        Ok(Self {
            path,
            model,
            serial: 0,
        })
    }

    /// Read the document at `path`, or start an empty one if there is no file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            Self::load(path)
        } else {
            info!("starting new score document at {}", path.display());
            Ok(Self::new(path))
        }
    }

    /// Write the document, replacing the previous file atomically.
    pub fn save(&self) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;

        let data = serde_json::to_vec_pretty(&self.model).context("failed to encode scores")?;
        let mut file = NamedTempFile::new_in(parent)
            .with_context(|| format!("failed to create temporary file in {}", parent.display()))?;
        file.write_all(&data)
            .context("failed to write score document")?;
        file.persist(&self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        debug!("saved score document to {}", self.path.display());
        Ok(())
    }

    /// Location on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The model.
    pub fn model(&self) -> &ScoreModel {
        &self.model
    }

    /// The model, for applying changes. Call [`Self::mark_changed`] afterwards.
    pub fn model_mut(&mut self) -> &mut ScoreModel {
        &mut self.model
    }

    /// Count an applied change.
    pub fn mark_changed(&mut self) {
        self.serial += 1;
    }

    /// Number of changes applied since the document was opened.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// There are changes that have not been saved.
    pub fn is_dirty(&self) -> bool {
        self.serial > 0
    }
}
