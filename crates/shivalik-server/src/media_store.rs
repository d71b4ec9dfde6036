use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServerError;

/// Resolve `name` under `base`, refusing anything that would step outside it.
fn ensure_within(base: &Path, name: &str) -> Result<PathBuf, ServerError> {
    let mut resolved = base.to_path_buf();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(c) => resolved.push(c),
            _ => {
                return Err(ServerError::BadRequest(
                    "Path traversal detected".to_string(),
                ));
            }
        }
    }
    if resolved.parent() != Some(base) {
        return Err(ServerError::BadRequest(
            "Path traversal detected".to_string(),
        ));
    }
    Ok(resolved)
}

/// Profile pictures on local disk, one file per upload named by a fresh UUID.
#[derive(Debug, Clone)]
pub struct MediaStore {
    base_path: PathBuf,
    base_url: String,
    max_size: usize,
}

impl MediaStore {
    pub async fn new(
        base_path: PathBuf,
        base_url: impl Into<String>,
        max_size: usize,
    ) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::Media(format!(
                "Failed to create media directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Media store initialized");

        Ok(Self {
            base_path,
            base_url: base_url.into(),
            max_size,
        })
    }

    /// Store `data` under a fresh id. Use [`MediaStore::uri_for`] for its public URI.
    pub async fn store(&self, data: &[u8]) -> Result<Uuid, ServerError> {
        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty upload".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::TooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let id = Uuid::new_v4();
        let path = ensure_within(&self.base_path, &id.to_string())?;

        fs::write(&path, data)
            .await
            .map_err(|e| ServerError::Media(format!("Failed to write media {id}: {e}")))?;

        debug!(id = %id, size = data.len(), "Stored media");
        Ok(id)
    }

    pub async fn get(&self, id: Uuid) -> Result<Vec<u8>, ServerError> {
        let path = ensure_within(&self.base_path, &id.to_string())?;

        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ServerError::NotFound("Media"))
            }
            Err(e) => Err(ServerError::Media(format!("Failed to read media {id}: {e}"))),
        }
    }

    pub async fn remove(&self, id: Uuid) -> Result<(), ServerError> {
        let path = ensure_within(&self.base_path, &id.to_string())?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(id = %id, "Removed media");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ServerError::NotFound("Media")),
            Err(e) => Err(ServerError::Media(format!("Failed to remove media {id}: {e}"))),
        }
    }

    pub fn uri_for(&self, id: Uuid) -> String {
        format!("{}/{}", self.base_url, id)
    }
}
