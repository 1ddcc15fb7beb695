use anyhow::{Context, Result};
use ndarray::Array2;
use ndarray_npy::write_npy;
use std::path::Path;

/// Writes a `(height, width)` float mask as a `.npy` array.
pub fn save_mask_npy(path: impl AsRef<Path>, mask: &Array2<f32>) -> Result<()> {
    let path = path.as_ref();
    write_npy(path, mask).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_npy::read_npy;

    #[test]
    fn written_array_reads_back() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("mask.npy");
        let mask = array![[0.5f32, -2.0], [1.0, 3.5]];

        save_mask_npy(&path, &mask)?;
        let back: Array2<f32> = read_npy(&path)?;

        assert_eq!(back, mask);
        Ok(())
    }
}
