use async_trait::async_trait;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs as tokio_fs;
use tracing::debug;
use uuid::Uuid;

use super::{
    format_image_id, is_valid_segment, ImageData, ImageError, ImageHost, ImageId, ImageType,
    StoredImage,
};

/// Keeps images on disk under `<root>/<folder>/<public_id>.<ext>` and serves
/// them from `/images/<id>`.
#[derive(Clone, Debug)]
pub struct LocalImageHost {
    root: PathBuf,
    folder: String,
}

impl LocalImageHost {
    pub fn new(root: impl Into<PathBuf>, folder: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            folder: folder.into(),
        }
    }

    fn folder_dir(&self, folder: &str) -> PathBuf {
        self.root.join(folder)
    }

    /// The file currently stored for `public_id`, whatever its extension.
    async fn existing_file(dir: &Path, public_id: &str) -> Option<PathBuf> {
        for kind in ImageType::ALL {
            let path = dir.join(format!("{public_id}.{}", kind.extension()));
            if tokio_fs::try_exists(&path).await.unwrap_or(false) {
                return Some(path);
            }
        }
        None
    }

    /// Removes every stored variant of `public_id` except the one at `keep`.
    async fn remove_existing(
        dir: &Path,
        public_id: &str,
        keep: Option<&Path>,
    ) -> Result<bool, ImageError> {
        let mut removed = false;
        for kind in ImageType::ALL {
            let path = dir.join(format!("{public_id}.{}", kind.extension()));
            if keep == Some(path.as_path()) {
                continue;
            }
            match tokio_fs::remove_file(&path).await {
                Ok(()) => removed = true,
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl ImageHost for LocalImageHost {
    async fn upload(
        &self,
        image: &ImageData,
        public_id: Option<&str>,
    ) -> Result<String, ImageError> {
        let public_id = match public_id {
            Some(id) if is_valid_segment(id) => id.to_owned(),
            Some(id) => return Err(ImageError::Host(format!("Invalid public id: {id}"))),
            None => Uuid::new_v4().simple().to_string(),
        };

        let dir = self.folder_dir(&self.folder);
        tokio_fs::create_dir_all(&dir).await?;

        // The previous file stays in place until the new one is complete.
        let path = dir.join(format!("{public_id}.{}", image.kind.extension()));
        let staging = dir.join(format!(".{public_id}.{}.tmp", Uuid::new_v4().simple()));
        tokio_fs::write(&staging, &image.bytes).await?;
        if let Err(err) = tokio_fs::rename(&staging, &path).await {
            let _ = tokio_fs::remove_file(&staging).await;
            return Err(err.into());
        }
        Self::remove_existing(&dir, &public_id, Some(&path)).await?;
        debug!(path = %path.display(), "Stored image");

        Ok(format_image_id(
            Utc::now().timestamp(),
            &self.folder,
            &public_id,
        ))
    }

    async fn delete(&self, id: &str) -> Result<(), ImageError> {
        let Some(id) = ImageId::parse(id) else {
            return Err(ImageError::Host(format!("Invalid image id: {id}")));
        };
        let removed =
            Self::remove_existing(&self.folder_dir(id.folder), id.public_id, None).await?;
        if !removed {
            debug!(public_id = id.public_id, "Image was already gone");
        }
        Ok(())
    }

    fn url(&self, id: &str) -> String {
        format!("/images/{id}")
    }

    async fn open(&self, id: &str) -> Result<Option<StoredImage>, ImageError> {
        let Some(id) = ImageId::parse(id) else {
            return Ok(None);
        };
        let Some(path) = Self::existing_file(&self.folder_dir(id.folder), id.public_id).await
        else {
            return Ok(None);
        };

        let content_type = mime_guess::from_path(&path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_owned();
        let file = tokio_fs::File::open(&path).await?;

        Ok(Some(StoredImage { content_type, file }))
    }
}
