//! In-memory object URLs for transient renditions

use std::collections::HashMap;

const BLOB_SCHEME: &str = "blob:gradepea/";

#[derive(Clone, Debug, PartialEq)]
pub struct Blob {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Registry handing out revocable `blob:` URLs
#[derive(Debug, Default)]
pub struct BlobRegistry {
    next_id: u64,
    live: HashMap<String, Blob>,
}

impl BlobRegistry {
    pub fn create(&mut self, blob: Blob) -> String {
        self.next_id += 1;
        let url = format!("{BLOB_SCHEME}{}", self.next_id);
        self.live.insert(url.clone(), blob);
        url
    }

    /// Release `url`. Returns false if it was not live.
    pub fn revoke(&mut self, url: &str) -> bool {
        self.live.remove(url).is_some()
    }

    pub fn get(&self, url: &str) -> Option<&Blob> {
        self.live.get(url)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

pub fn is_blob_url(url: &str) -> bool {
    url.starts_with(BLOB_SCHEME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_revoke() {
        let mut registry = BlobRegistry::default();
        let blob = Blob { mime_type: "image/jpeg".into(), bytes: vec![1] };
        let a = registry.create(blob.clone());
        let b = registry.create(blob);
        assert_ne!(a, b);
        assert!(is_blob_url(&a));
        assert_eq!(registry.live_count(), 2);
        assert!(registry.revoke(&a));
        assert!(!registry.revoke(&a));
        assert!(registry.get(&a).is_none());
        assert_eq!(registry.get(&b).map(|b| b.bytes.len()), Some(1));
    }
}
