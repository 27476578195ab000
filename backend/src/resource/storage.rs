//! Public URLs for stored files

/// Maps a stored relative path to a publicly fetchable URL.
pub trait UrlResolver: Send + Sync {
    fn url(&self, path: &str) -> String;
}

impl<F> UrlResolver for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn url(&self, path: &str) -> String {
        self(path)
    }
}

/// Files served from a public base URL, e.g. `/storage` or a CDN origin
#[derive(Debug, Clone)]
pub struct PublicStorage {
    base_url: String,
}

impl PublicStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl UrlResolver for PublicStorage {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_storage_joins_paths() {
        let storage = PublicStorage::new("http://cdn.test/storage/");
        assert_eq!(
            storage.url("/learning-materials/intro.pdf"),
            "http://cdn.test/storage/learning-materials/intro.pdf"
        );
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |path: &str| format!("s3://bucket/{path}");
        assert_eq!(resolver.url("a.png"), "s3://bucket/a.png");
    }
}
