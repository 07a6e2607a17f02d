//! Small CLI-only helpers.

/// Expand a leading `~/` to the user's home directory.
pub fn expand_path(path: &str) -> String {
    if path.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_tilde_prefixed_paths() {
        std::env::set_var("HOME", "/home/tester");
        assert_eq!(expand_path("~/data"), "/home/tester/data");
        assert_eq!(expand_path("/abs/data"), "/abs/data");
    }
}
