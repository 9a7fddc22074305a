//! Product image lifecycle: multipart uploads land in `<root>/temp/` under a
//! generated unique name, then get relocated into `<root>/<category_id>/`
//! before the filename is persisted. Only the bare filename is stored; the
//! public URL is rebuilt from base URL + first category at response time.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{info, warn};
use uuid::Uuid;

pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif"];
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Write an in-flight upload into the temp directory under a unique name,
/// keeping the original extension.
pub async fn save_temp_upload(
    uploads_root: &Path,
    original_name: Option<&str>,
    data: &[u8],
) -> anyhow::Result<PathBuf> {
    let temp_dir = uploads_root.join("temp");
    tokio::fs::create_dir_all(&temp_dir)
        .await
        .context("create temp upload directory")?;

    let ext = original_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    let filename = format!("image-{}{}", Uuid::new_v4(), ext);

    let path = temp_dir.join(filename);
    tokio::fs::write(&path, data)
        .await
        .with_context(|| format!("write temp upload {}", path.display()))?;
    Ok(path)
}

/// Move a temp upload into the category-scoped directory, preserving its
/// generated name. Returns the bare filename that gets stored on the row.
/// Failure here aborts the enclosing create/update.
pub async fn move_image(
    uploads_root: &Path,
    temp_path: &Path,
    category_id: i64,
) -> anyhow::Result<String> {
    let category_dir = uploads_root.join(category_id.to_string());
    tokio::fs::create_dir_all(&category_dir)
        .await
        .with_context(|| format!("create category directory {}", category_dir.display()))?;

    let filename = temp_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("temp upload has no filename"))?
        .to_string();

    let dest = category_dir.join(&filename);
    tokio::fs::rename(temp_path, &dest)
        .await
        .with_context(|| {
            format!(
                "move image {} -> {}",
                temp_path.display(),
                dest.display()
            )
        })?;

    info!(from = %temp_path.display(), to = %dest.display(), "moved image");
    Ok(filename)
}

/// Best-effort deletion. A missing file (or any other failure) is logged and
/// swallowed: removing a product must not fail because its image is already
/// gone.
pub async fn delete_image(uploads_root: &Path, category_id: i64, filename: &str) {
    let path = uploads_root.join(category_id.to_string()).join(filename);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => info!(path = %path.display(), "deleted image"),
        Err(e) => warn!(error = %e, path = %path.display(), "failed to delete image"),
    }
}

/// Absolute URL for a stored image, keyed by the product's first category.
pub fn public_image_url(base_url: &str, categories: &[i64], filename: &str) -> Option<String> {
    categories
        .first()
        .map(|category_id| format!("{}/uploads/{}/{}", base_url, category_id, filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_root() -> PathBuf {
        std::env::temp_dir().join(format!("storefront-img-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn temp_upload_then_move_lands_in_category_dir() {
        let root = scratch_root();

        let temp = save_temp_upload(&root, Some("photo.png"), b"fake-png")
            .await
            .expect("save temp");
        assert!(temp.exists());
        assert!(temp.starts_with(root.join("temp")));
        assert_eq!(temp.extension().and_then(|e| e.to_str()), Some("png"));

        let filename = move_image(&root, &temp, 2).await.expect("move image");
        assert!(!temp.exists(), "temp file should be gone after move");
        let dest = root.join("2").join(&filename);
        assert!(dest.exists(), "image should live under category 2");
        assert_eq!(
            filename,
            temp.file_name().unwrap().to_str().unwrap(),
            "generated name is preserved by the move"
        );

        tokio::fs::remove_dir_all(&root).await.ok();
    }

    #[tokio::test]
    async fn save_temp_upload_without_extension() {
        let root = scratch_root();
        let temp = save_temp_upload(&root, None, b"data").await.expect("save");
        assert!(temp.extension().is_none());
        tokio::fs::remove_dir_all(&root).await.ok();
    }

    #[tokio::test]
    async fn delete_image_swallows_missing_file() {
        let root = scratch_root();
        // Nothing was ever written here; this must not panic or error.
        delete_image(&root, 9, "does-not-exist.png").await;
    }

    #[tokio::test]
    async fn delete_image_removes_existing_file() {
        let root = scratch_root();
        let temp = save_temp_upload(&root, Some("a.jpg"), b"jpeg").await.unwrap();
        let filename = move_image(&root, &temp, 4).await.unwrap();
        assert!(root.join("4").join(&filename).exists());

        delete_image(&root, 4, &filename).await;
        assert!(!root.join("4").join(&filename).exists());

        tokio::fs::remove_dir_all(&root).await.ok();
    }

    #[test]
    fn public_url_uses_first_category() {
        let url = public_image_url("http://localhost:3000", &[2, 7], "a.png");
        assert_eq!(
            url.as_deref(),
            Some("http://localhost:3000/uploads/2/a.png")
        );
    }

    #[test]
    fn public_url_is_none_without_categories() {
        assert!(public_image_url("http://localhost:3000", &[], "a.png").is_none());
    }
}
