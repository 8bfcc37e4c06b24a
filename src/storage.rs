use std::path::Path;

use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unsupported image extension")]
    UnsupportedExtension,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn extension_of(file_name: &str) -> Result<String, StorageError> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or(StorageError::UnsupportedExtension)
}

/// Writes an uploaded recipe image under `media_root/recipes/` with a fresh
/// uuid name and returns the path relative to the media root.
#[instrument(name = "Storing recipe image", skip(media_root, data))]
pub async fn save_recipe_image(
    media_root: &Path,
    file_name: &str,
    data: &[u8],
) -> Result<String, StorageError> {
    let ext = extension_of(file_name)?;
    let relative = format!("recipes/{}.{}", Uuid::new_v4(), ext);

    let target = media_root.join(&relative);
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, data).await?;

    Ok(relative)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saves_image_under_media_root() {
        let media_root = tempfile::tempdir().unwrap();
        let relative = save_recipe_image(media_root.path(), "photo.PNG", b"not-a-real-png")
            .await
            .unwrap();

        assert!(relative.starts_with("recipes/"));
        assert!(relative.ends_with(".png"));

        let stored = std::fs::read(media_root.path().join(&relative)).unwrap();
        assert_eq!(stored, b"not-a-real-png");
    }

    #[tokio::test]
    async fn rejects_non_image_extension() {
        let media_root = tempfile::tempdir().unwrap();
        let result = save_recipe_image(media_root.path(), "payload.exe", b"data").await;
        assert!(matches!(result, Err(StorageError::UnsupportedExtension)));
    }

    #[tokio::test]
    async fn rejects_missing_extension() {
        let media_root = tempfile::tempdir().unwrap();
        let result = save_recipe_image(media_root.path(), "photo", b"data").await;
        assert!(matches!(result, Err(StorageError::UnsupportedExtension)));
    }

    #[test]
    fn distinct_uploads_get_distinct_names() {
        // extension_of only normalizes; uniqueness comes from the uuid part.
        assert_eq!(extension_of("a.JPeG").unwrap(), "jpeg");
        assert_eq!(extension_of("dir.name/a.jpg").unwrap(), "jpg");
    }
}
