use colored::Colorize;
use std::cmp::Ordering;

/// A node of the display tree, derived from file names only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    File { name: String, path: String },
    Folder { name: String, path: String, children: Vec<TreeNode> },
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::File { name, .. } | TreeNode::Folder { name, .. } => name,
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &str {
        match self {
            TreeNode::File { path, .. } | TreeNode::Folder { path, .. } => path,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, TreeNode::Folder { .. })
    }
}

/// Build the hierarchy for a flat list of paths split on `/` or `\`.
/// Folders come before files; names sort case-insensitively.
pub fn build<S: AsRef<str>>(paths: &[S]) -> Vec<TreeNode> {
    let mut roots: Vec<TreeNode> = Vec::new();
    for p in paths {
        let segments: Vec<&str> = p
            .as_ref()
            .split(|c| c == '/' || c == '\\')
            .filter(|s| !s.is_empty())
            .collect();
        if !segments.is_empty() {
            insert(&mut roots, &segments, "");
        }
    }
    sort(&mut roots);
    roots
}

fn insert(level: &mut Vec<TreeNode>, segments: &[&str], parent: &str) {
    let name = segments[0];
    let path = if parent.is_empty() { name.to_string() } else { format!("{parent}/{name}") };

    if segments.len() == 1 {
        let exists = level
            .iter()
            .any(|n| !n.is_folder() && n.name() == name);
        if !exists {
            level.push(TreeNode::File { name: name.to_string(), path });
        }
        return;
    }

    let idx = match level.iter().position(|n| n.is_folder() && n.name() == name) {
        Some(i) => i,
        None => {
            level.push(TreeNode::Folder { name: name.to_string(), path: path.clone(), children: Vec::new() });
            level.len() - 1
        }
    };
    if let TreeNode::Folder { children, .. } = &mut level[idx] {
        insert(children, &segments[1..], &path);
    }
}

fn sort(level: &mut [TreeNode]) {
    level.sort_by(|a, b| match (a.is_folder(), b.is_folder()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a
            .name()
            .to_lowercase()
            .cmp(&b.name().to_lowercase())
            .then_with(|| a.name().cmp(b.name())),
    });
    for n in level.iter_mut() {
        if let TreeNode::Folder { children, .. } = n {
            sort(children);
        }
    }
}

/// (folders, files)
pub fn count(nodes: &[TreeNode]) -> (usize, usize) {
    nodes.iter().fold((0, 0), |(d, f), n| match n {
        TreeNode::File { .. } => (d, f + 1),
        TreeNode::Folder { children, .. } => {
            let (cd, cf) = count(children);
            (d + 1 + cd, f + cf)
        }
    })
}

/// Box-drawing rendering, one node per line. Folders end with `/`.
pub fn render(nodes: &[TreeNode]) -> String {
    let mut out = String::new();
    render_level(nodes, "", &mut out);
    out
}

fn render_level(nodes: &[TreeNode], prefix: &str, out: &mut String) {
    for (i, n) in nodes.iter().enumerate() {
        let last = i + 1 == nodes.len();
        let branch = if last { "└── " } else { "├── " };
        match n {
            TreeNode::File { name, .. } => {
                out.push_str(&format!("{prefix}{branch}{name}\n"));
            }
            TreeNode::Folder { name, children, .. } => {
                out.push_str(&format!("{prefix}{branch}{}\n", format!("{name}/").blue().bold()));
                let next = format!("{prefix}{}", if last { "    " } else { "│   " });
                render_level(children, &next, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_folders() {
        let nodes = build(&["src/main.rs", "Cargo.toml", "src/ui/app.rs", "README.md"]);
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].name(), "src");
        assert_eq!(nodes[1].name(), "Cargo.toml");
        assert_eq!(nodes[2].name(), "README.md");
        match &nodes[0] {
            TreeNode::Folder { children, path, .. } => {
                assert_eq!(path, "src");
                assert_eq!(children[0].path(), "src/ui");
                assert_eq!(children[1].path(), "src/main.rs");
            }
            other => panic!("expected folder, got {other:?}"),
        }
        assert_eq!(count(&nodes), (2, 4));
    }

    #[test]
    fn backslashes_and_empty_segments() {
        let nodes = build(&["app\\page.tsx", "/app//layout.tsx", ""]);
        assert_eq!(nodes.len(), 1);
        assert_eq!(count(&nodes), (1, 2));
    }

    #[test]
    fn file_and_folder_with_same_name() {
        let nodes = build(&["docs", "docs/index.md"]);
        assert_eq!(nodes.len(), 2);
        assert!(nodes[0].is_folder());
        assert!(!nodes[1].is_folder());
    }

    #[test]
    fn duplicate_paths_collapse() {
        let nodes = build(&["a.txt", "a.txt"]);
        assert_eq!(count(&nodes), (0, 1));
    }

    #[test]
    fn render_draws_branches() {
        colored::control::set_override(false);
        let nodes = build(&["src/lib.rs", "src/main.rs", "Cargo.toml"]);
        let expected = "\
├── src/
│   ├── lib.rs
│   └── main.rs
└── Cargo.toml
";
        assert_eq!(render(&nodes), expected);
    }
}
