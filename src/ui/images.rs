/// Image cache for resolved note images
/// Turns display URLs into iced image handles, fetching each URL once
/// per listing until it loads
use iced::widget::image::Handle;
use std::collections::HashMap;

use crate::state::data::{ImageRef, Note};

#[derive(Debug, Clone)]
enum Slot {
    Loading,
    Ready(Handle),
    Failed,
}

#[derive(Debug, Default)]
pub struct ImageCache {
    slots: HashMap<String, Slot>,
}

impl ImageCache {
    /// URLs of resolved images that have not been requested yet.
    /// They are marked as loading, so each URL is returned only once.
    pub fn request_missing(&mut self, notes: &[Note]) -> Vec<String> {
        let mut missing = Vec::new();
        for url in notes.iter().filter_map(|n| n.image.as_ref().and_then(ImageRef::url)) {
            if !self.slots.contains_key(url) {
                self.slots.insert(url.to_string(), Slot::Loading);
                missing.push(url.to_string());
            }
        }
        missing
    }

    pub fn insert(&mut self, url: String, result: Result<Vec<u8>, String>) {
        let slot = match result {
            Ok(bytes) => Slot::Ready(Handle::from_bytes(bytes)),
            Err(e) => {
                log::warn!("⚠️  Failed to load image {}: {}", url, e);
                Slot::Failed
            }
        };
        self.slots.insert(url, slot);
    }

    /// Forget failed fetches so the next `request_missing` tries them again.
    /// Called when a fresh listing arrives: an upload may have landed since.
    pub fn retry_failed(&mut self) {
        self.slots.retain(|_, slot| !matches!(slot, Slot::Failed));
    }

    /// Handle for a loaded image; None while loading or after a failure
    pub fn handle(&self, url: &str) -> Option<&Handle> {
        match self.slots.get(url) {
            Some(Slot::Ready(handle)) => Some(handle),
            _ => None,
        }
    }

    pub fn is_loading(&self, url: &str) -> bool {
        matches!(self.slots.get(url), Some(Slot::Loading))
    }
}

/// Load the bytes behind a display URL (file:// or http(s)://)
pub async fn fetch(url: String) -> Result<Vec<u8>, String> {
    let parsed = url::Url::parse(&url).map_err(|e| format!("Invalid URL: {}", e))?;

    if parsed.scheme() == "file" {
        let path = parsed
            .to_file_path()
            .map_err(|_| format!("Not a local path: {}", url))?;
        return tokio::fs::read(&path)
            .await
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e));
    }

    let response = reqwest::get(parsed)
        .await
        .map_err(|e| format!("Request failed: {}", e))?;
    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| format!("Failed to read body: {}", e))?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::NoteId;

    fn note(id: &str, image: Option<ImageRef>) -> Note {
        Note {
            id: NoteId::Remote(id.into()),
            name: id.into(),
            description: String::new(),
            image,
            created_at: None,
        }
    }

    #[test]
    fn test_failed_url_is_requested_again_after_retry() {
        let notes = vec![
            note("1", Some(ImageRef::Resolved { key: "a".into(), url: "https://x/a".into() })),
            note("2", Some(ImageRef::Unresolved("b".into()))),
            note("3", None),
        ];
        let mut cache = ImageCache::default();

        assert_eq!(cache.request_missing(&notes), vec!["https://x/a".to_string()]);
        assert!(cache.is_loading("https://x/a"));
        assert!(cache.request_missing(&notes).is_empty());

        cache.insert("https://x/a".into(), Err("HTTP 404".into()));
        assert!(cache.handle("https://x/a").is_none());
        assert!(!cache.is_loading("https://x/a"));
        // No refetch loop on every message, only after the next listing.
        assert!(cache.request_missing(&notes).is_empty());

        cache.retry_failed();
        assert_eq!(cache.request_missing(&notes), vec!["https://x/a".to_string()]);
        assert!(cache.is_loading("https://x/a"));
    }

    #[test]
    fn test_retry_keeps_loaded_images() {
        let notes = vec![note(
            "1",
            Some(ImageRef::Resolved { key: "a".into(), url: "https://x/a".into() }),
        )];
        let mut cache = ImageCache::default();
        cache.request_missing(&notes);
        cache.insert("https://x/a".into(), Ok(vec![1, 2, 3]));

        cache.retry_failed();
        assert!(cache.handle("https://x/a").is_some());
        assert!(cache.request_missing(&notes).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, [7u8, 8, 9]).unwrap();
        let url = url::Url::from_file_path(&path).unwrap().to_string();

        assert_eq!(fetch(url).await, Ok(vec![7, 8, 9]));
        assert!(fetch("file:///definitely/missing.png".into()).await.is_err());
    }
}
