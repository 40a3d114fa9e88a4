//! Shared key validation for storage backends.
//!
//! Objects are addressed by `(bucket, path)`; the path never starts with `/`
//! and never contains a `..` segment. All backends validate through here.

use crate::traits::{StorageError, StorageResult};

pub fn validate_key(bucket: &str, path: &str) -> StorageResult<()> {
    if bucket.is_empty() || bucket.contains('/') || bucket.contains('\\') || bucket == ".." {
        return Err(StorageError::InvalidKey(format!("invalid bucket '{}'", bucket)));
    }
    if path.is_empty() || path.starts_with('/') || path.contains('\\') {
        return Err(StorageError::InvalidKey(format!("invalid path '{}'", path)));
    }
    if path.split('/').any(|segment| segment == ".." || segment == ".") {
        return Err(StorageError::InvalidKey(
            "Storage key contains relative segments".to_string(),
        ));
    }
    Ok(())
}

/// Split `path?query` into the object path and the raw query string.
pub fn split_query(path: &str) -> (&str, Option<&str>) {
    match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    }
}

/// Percent-encode each path segment, keeping `/` separators and any query suffix.
pub fn encode_path(path: &str) -> String {
    let (path, query) = split_query(path);
    let encoded = path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    match query {
        Some(query) => format!("{}?{}", encoded, query),
        None => encoded,
    }
}

/// Last path segment, used as a filename when a backend has none recorded.
pub fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("media", "a/b.jpg").is_ok());
        assert!(validate_key("", "a").is_err());
        assert!(validate_key("me/dia", "a").is_err());
        assert!(validate_key("media", "").is_err());
        assert!(validate_key("media", "/etc/passwd").is_err());
        assert!(validate_key("media", "a/../../etc").is_err());
        assert!(validate_key("media", "a\\b").is_err());
    }

    #[test]
    fn test_encode_path_keeps_query() {
        assert_eq!(encode_path("a b/c.jpg"), "a%20b/c.jpg");
        assert_eq!(encode_path("a/c.jpg?w=10&h=20"), "a/c.jpg?w=10&h=20");
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("a/b/c.png"), "c.png");
        assert_eq!(last_segment("c.png"), "c.png");
    }
}
