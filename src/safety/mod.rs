use std::path::{Component, Path};

/// A generated file name may only name a location below the project root.
pub fn path_is_safe(name: &str) -> bool {
    if name.trim().is_empty() {
        return false;
    }
    // Windows drive letters are not seen as prefixes on *nix.
    if name.len() >= 2 && name.as_bytes()[1] == b':' {
        return false;
    }
    Path::new(name)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// `name` joined to `root` stays under `root` without touching the filesystem.
pub fn within_root(root: &Path, name: &str) -> bool {
    if !path_is_safe(name) {
        return false;
    }
    let joined = root.join(name);
    joined.starts_with(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_are_safe() {
        assert!(path_is_safe("src/main.rs"));
        assert!(path_is_safe("./README.md"));
        assert!(path_is_safe(".github/workflows/ci.yml"));
    }

    #[test]
    fn escapes_are_rejected() {
        assert!(!path_is_safe("../etc/passwd"));
        assert!(!path_is_safe("src/../../x"));
        assert!(!path_is_safe("/etc/passwd"));
        assert!(!path_is_safe("C:/Windows/system.ini"));
        assert!(!path_is_safe(""));
        assert!(!path_is_safe("   "));
    }

    #[test]
    fn within_root_follows_path_rules() {
        let root = Path::new("/tmp/out");
        assert!(within_root(root, "a/b.txt"));
        assert!(!within_root(root, "../b.txt"));
    }
}
