//! Path helpers shared by the write and read sides of the router.

use std::collections::BTreeMap;

const SEPARATOR: char = '/';

/// Normalize a storage path so it neither starts nor ends with `/`.
///
/// Every backend receives paths in this form; a backend with other
/// requirements converts on its own side.
pub fn normalize_path(path: &str) -> &str {
    path.trim_matches(SEPARATOR)
}

/// Extension of `filename`: the text after the last `.` of its last path
/// component, or an empty string when there is none.
pub fn extension_of(filename: &str) -> &str {
    let name = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename);
    match name.rfind('.') {
        Some(index) => &name[index + 1..],
        None => "",
    }
}

/// Filename used for content-addressed uploads: `hash.ext`, or `hash` alone
/// when the original file had no extension.
pub fn content_addressed_filename(hash: &str, extension: &str) -> String {
    if extension.is_empty() {
        hash.to_string()
    } else {
        format!("{}.{}", hash, extension)
    }
}

/// Put thumbnail parameters at the front of `path`'s query string.
///
/// Parameters already on the path are kept after the thumbnail ones, so a
/// backend or CDN that honours only the first occurrence of a key sees the
/// thumbnail value.
pub fn append_thumbnail_parameters(path: &str, parameters: &BTreeMap<String, String>) -> String {
    if parameters.is_empty() {
        return path.to_string();
    }

    let params = parameters
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    match path.split_once('?') {
        Some((base, "")) => format!("{}?{}", base, params),
        Some((base, existing)) => format!("{}?{}&{}", base, params, existing),
        None => format!("{}?{}", path, params),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_separators() {
        assert_eq!(normalize_path("/a/b/"), "a/b");
        assert_eq!(normalize_path("a/b"), "a/b");
        assert_eq!(normalize_path("//a//"), "a");
        assert_eq!(normalize_path("/"), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for path in ["", "/", "//", "a", "/a", "a/", "/a/b/", "//x//y//", "a?b=/"] {
            let once = normalize_path(path);
            assert_eq!(normalize_path(once), once);
            assert!(!once.starts_with('/'));
            assert!(!once.ends_with('/'));
        }
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a.jpg"), "jpg");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of("dir.v2/README"), "");
        assert_eq!(extension_of("trailing."), "");
    }

    #[test]
    fn test_content_addressed_filename() {
        assert_eq!(content_addressed_filename("abc", "png"), "abc.png");
        assert_eq!(content_addressed_filename("abc", ""), "abc");
    }

    #[test]
    fn test_thumbnail_parameters_come_first() {
        let mut params = BTreeMap::new();
        params.insert("h".to_string(), "64".to_string());
        params.insert("w".to_string(), "64".to_string());

        assert_eq!(append_thumbnail_parameters("a/b.jpg", &params), "a/b.jpg?h=64&w=64");
        assert_eq!(
            append_thumbnail_parameters("a/b.jpg?w=800&v=2", &params),
            "a/b.jpg?h=64&w=64&w=800&v=2"
        );
        assert_eq!(append_thumbnail_parameters("a/b.jpg?", &params), "a/b.jpg?h=64&w=64");
    }

    #[test]
    fn test_empty_thumbnail_parameters_leave_path_alone() {
        assert_eq!(
            append_thumbnail_parameters("a/b.jpg?v=1", &BTreeMap::new()),
            "a/b.jpg?v=1"
        );
    }
}
