//! Asset inventory — enumerates an influencer's image files and computes
//! which are still unconsumed.
//!
//! The listing is re-enumerated fresh on every call (never cached across
//! requests) and sorted lexicographically by filename so allocation order is
//! deterministic. A missing influencer directory is "zero assets", not an
//! error: exhaustion handling, not failure handling, owns that case.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

/// Lists the influencer's inventory as served asset paths, e.g.
/// `/assets/influencers/ava-sky/img001.png`.
pub async fn list_available_images(
    assets_root: &Path,
    influencer_id: &str,
) -> Result<Vec<String>, std::io::Error> {
    let dir = assets_root.join(influencer_id);
    let mut entries = match fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if has_image_extension(&name) {
            files.push(name);
        }
    }
    files.sort();

    Ok(files
        .into_iter()
        .map(|name| format!("/assets/influencers/{influencer_id}/{name}"))
        .collect())
}

/// Filters out already-consumed images, preserving the inventory order.
pub fn available_unconsumed(images: &[String], used: &HashSet<String>) -> Vec<String> {
    images
        .iter()
        .filter(|src| !used.contains(*src))
        .cloned()
        .collect()
}

fn has_image_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    #[tokio::test]
    async fn test_listing_is_sorted_and_filtered() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("ava-sky");
        std::fs::create_dir(&dir).unwrap();
        touch(&dir, "b.png");
        touch(&dir, "a.jpg");
        touch(&dir, "c.WEBP");
        touch(&dir, "notes.txt");
        touch(&dir, "noext");

        let images = list_available_images(root.path(), "ava-sky").await.unwrap();
        assert_eq!(
            images,
            vec![
                "/assets/influencers/ava-sky/a.jpg",
                "/assets/influencers/ava-sky/b.png",
                "/assets/influencers/ava-sky/c.WEBP",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty_not_error() {
        let root = tempfile::tempdir().unwrap();
        let images = list_available_images(root.path(), "nobody").await.unwrap();
        assert!(images.is_empty());
    }

    #[tokio::test]
    async fn test_subdirectories_are_ignored() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("ava-sky");
        std::fs::create_dir_all(dir.join("raw.png")).unwrap(); // a directory, not a file
        touch(&dir, "a.png");

        let images = list_available_images(root.path(), "ava-sky").await.unwrap();
        assert_eq!(images, vec!["/assets/influencers/ava-sky/a.png"]);
    }

    #[tokio::test]
    async fn test_listing_is_reenumerated_fresh() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("ava-sky");
        std::fs::create_dir(&dir).unwrap();
        touch(&dir, "a.png");

        let first = list_available_images(root.path(), "ava-sky").await.unwrap();
        assert_eq!(first.len(), 1);

        touch(&dir, "b.png");
        let second = list_available_images(root.path(), "ava-sky").await.unwrap();
        assert_eq!(second.len(), 2, "new files must appear on the next call");
    }

    #[test]
    fn test_available_unconsumed_preserves_order() {
        let images = vec![
            "/assets/influencers/ava-sky/a.png".to_string(),
            "/assets/influencers/ava-sky/b.png".to_string(),
            "/assets/influencers/ava-sky/c.png".to_string(),
        ];
        let used: HashSet<String> = ["/assets/influencers/ava-sky/b.png".to_string()]
            .into_iter()
            .collect();

        let unconsumed = available_unconsumed(&images, &used);
        assert_eq!(
            unconsumed,
            vec![
                "/assets/influencers/ava-sky/a.png",
                "/assets/influencers/ava-sky/c.png",
            ]
        );
    }

    #[test]
    fn test_available_unconsumed_all_used_is_empty() {
        let images = vec!["/assets/influencers/ava-sky/a.png".to_string()];
        let used: HashSet<String> = images.iter().cloned().collect();
        assert!(available_unconsumed(&images, &used).is_empty());
    }
}
