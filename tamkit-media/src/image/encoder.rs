use crate::Image;
use anyhow::{Context, Result};
use std::path::Path;

impl Image {
    /// Encodes by file extension (png, jpg, ...).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.inner
            .save(path)
            .with_context(|| format!("Failed to save image {}", path.display()))?;

        Ok(())
    }
}
