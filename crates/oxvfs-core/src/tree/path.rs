//! Slash-separated path handling.

use super::TreeError;

/// Split a path into its name segments.
///
/// Empty segments and `.` are dropped, so `"/a//b/./c/"` yields
/// `["a", "b", "c"]` and both `""` and `"/"` yield nothing. `..` is kept and
/// later fails to resolve since no node may carry that name.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect()
}

/// Split a path into its parent segments and final name.
///
/// Returns `None` for paths naming the root.
pub fn split_parent(path: &str) -> Option<(Vec<&str>, &str)> {
    let mut segments = split_path(path);
    let name = segments.pop()?;
    Some((segments, name))
}

/// Check that `name` can be used as a single path segment.
pub fn validate_name(name: &str) -> Result<(), TreeError> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name == "." || name == ".." {
        "name is reserved"
    } else if name.contains('/') {
        "name contains '/'"
    } else if name.contains('\0') {
        "name contains a NUL byte"
    } else {
        return Ok(());
    };
    Err(TreeError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path_ignores_empty_and_dot_segments() {
        assert_eq!(split_path("/a//b/./c/"), vec!["a", "b", "c"]);
        assert!(split_path("").is_empty());
        assert!(split_path("/").is_empty());
        assert!(split_path("/./.").is_empty());
        assert_eq!(split_path("relative/x"), vec!["relative", "x"]);
    }

    #[test]
    fn test_split_parent() {
        assert_eq!(split_parent("/a/b/c"), Some((vec!["a", "b"], "c")));
        assert_eq!(split_parent("c"), Some((vec![], "c")));
        assert_eq!(split_parent("/"), None);
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("notes.txt").is_ok());
        assert!(validate_name(".hidden").is_ok());
        for bad in ["", ".", "..", "a/b", "nul\0"] {
            assert!(
                matches!(validate_name(bad), Err(TreeError::InvalidName { .. })),
                "{bad:?} should be rejected"
            );
        }
    }
}
