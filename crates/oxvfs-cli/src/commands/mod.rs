pub mod cat;
pub mod info;
pub mod init;
pub mod ls;
pub mod mkdir;
pub mod mv;
pub mod rm;
pub mod tree;
pub mod write;

/// Normalize a store path to start with `/`.
pub fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
