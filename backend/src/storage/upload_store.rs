use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp", "tif", "tiff"];

/// Persists uploaded images on local disk under content-addressed names.
///
/// Client-supplied filenames only contribute an allowlisted extension, so they
/// can never escape the upload directory or overwrite a different upload.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    max_size: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Empty upload")]
    Empty,
    #[error("File too large: {size} bytes exceeds {limit}")]
    FileTooLarge { size: usize, limit: usize },
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>, max_size: usize) -> Self {
        Self {
            root: root.into(),
            max_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_dir(&self) -> Result<(), UploadStoreError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn calculate_image_hash(image_data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(image_data);
        hex::encode(hasher.finalize())
    }

    /// Lower-cased extension of the client filename, if it is an allowlisted image type.
    pub fn extract_file_extension(file_name: &str) -> Option<String> {
        let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
        let (stem, ext) = base.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        let ext = ext.to_ascii_lowercase();
        ALLOWED_EXTENSIONS
            .contains(&ext.as_str())
            .then_some(ext)
    }

    pub fn storage_name(image_data: &[u8], file_name: Option<&str>) -> String {
        let hash = Self::calculate_image_hash(image_data);
        let ext = file_name
            .and_then(Self::extract_file_extension)
            .unwrap_or_else(|| "bin".to_string());
        format!("{}.{}", hash, ext)
    }

    pub fn validate_image_size(&self, image_data: &[u8]) -> Result<(), UploadStoreError> {
        if image_data.is_empty() {
            return Err(UploadStoreError::Empty);
        }
        if image_data.len() > self.max_size {
            return Err(UploadStoreError::FileTooLarge {
                size: image_data.len(),
                limit: self.max_size,
            });
        }
        Ok(())
    }

    /// Writes the upload and returns its path. Identical content maps to the same file.
    pub fn save(
        &self,
        image_data: &[u8],
        file_name: Option<&str>,
    ) -> Result<PathBuf, UploadStoreError> {
        self.validate_image_size(image_data)?;
        self.ensure_dir()?;

        let path = self.root.join(Self::storage_name(image_data, file_name));
        if !path.exists() {
            fs::write(&path, image_data)?;
        }
        Ok(path)
    }
}
