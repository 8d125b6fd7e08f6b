use colored::Colorize;
use std::collections::{HashMap, HashSet};

use crate::safety::path_is_safe;
use crate::wire::FileEntry;

/// Normalize names and drop entries that cannot be placed in a project.
/// - Backslashes become `/`, leading `./` and `/` are stripped
/// - Empty names and names escaping the root are dropped
/// - Duplicate names are kept but reported
/// - A name that is also a folder of another name loses to the later entry
pub fn sanitize(files: Vec<FileEntry>) -> (Vec<FileEntry>, Vec<String>) {
    let mut warnings = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(files.len());

    for f in files {
        let name = normalize_name(&f.name);
        if name.is_empty() {
            warnings.push(format!("dropped file with empty name ({} bytes)", f.content.len()));
            continue;
        }
        if !path_is_safe(&name) {
            warnings.push(format!("dropped file with unsafe path {}", f.name));
            continue;
        }
        if !seen.insert(name.clone()) {
            warnings.push(format!("duplicate file {} (the last copy is archived)", name));
        }
        out.push(FileEntry { name, content: f.content });
    }

    let out = drop_shadowed(out, &mut warnings);
    (out, warnings)
}

/// "a", "a/b" for "a/b/c".
fn folder_prefixes(name: &str) -> impl Iterator<Item = &str> {
    name.match_indices('/').map(move |(i, _)| &name[..i])
}

/// Walk from the end so the later of two conflicting entries survives.
fn drop_shadowed(files: Vec<FileEntry>, warnings: &mut Vec<String>) -> Vec<FileEntry> {
    let mut kept_files: HashSet<String> = HashSet::new();
    let mut kept_folders: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(files.len());

    for f in files.into_iter().rev() {
        if kept_folders.contains(&f.name) {
            warnings.push(format!("dropped file {} (a later file uses it as a folder)", f.name));
            continue;
        }
        if let Some(p) = folder_prefixes(&f.name).find(|p| kept_files.contains(*p)) {
            warnings.push(format!("dropped file {} (a later file is named {})", f.name, p));
            continue;
        }
        kept_folders.extend(folder_prefixes(&f.name).map(str::to_string));
        kept_files.insert(f.name.clone());
        out.push(f);
    }
    out.reverse();
    out
}

/// Names that are both a file and the folder of another file.
pub fn path_conflicts(files: &[FileEntry]) -> Vec<String> {
    let names: HashSet<&str> = files.iter().map(|f| f.name.as_str()).collect();
    let mut conflicts: Vec<String> = files
        .iter()
        .flat_map(|f| folder_prefixes(&f.name))
        .filter(|p| names.contains(p))
        .map(str::to_string)
        .collect();
    conflicts.sort();
    conflicts.dedup();
    conflicts
}

pub fn normalize_name(raw: &str) -> String {
    let mut s = raw.trim().replace('\\', "/");
    loop {
        if let Some(rest) = s.strip_prefix("./") {
            s = rest.to_string();
        } else if let Some(rest) = s.strip_prefix('/') {
            s = rest.to_string();
        } else {
            break;
        }
    }
    // collapse "a//b" and "a/./b"
    s.split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// The set as it ends up on disk or in an archive: a later duplicate replaces
/// the earlier one in place.
pub fn dedupe_last_wins(files: &[FileEntry]) -> Vec<FileEntry> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut out: Vec<FileEntry> = Vec::with_capacity(files.len());
    for f in files {
        match index.get(f.name.as_str()) {
            Some(&i) => out[i].content = f.content.clone(),
            None => {
                index.insert(f.name.as_str(), out.len());
                out.push(f.clone());
            }
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
    pub unchanged: usize,
}

impl SetDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// What changed between two consecutive file sets, in the order of `new`
/// (removed paths in the order of `old`).
pub fn diff_sets(old: &[FileEntry], new: &[FileEntry]) -> SetDiff {
    let old = dedupe_last_wins(old);
    let new = dedupe_last_wins(new);
    let before: HashMap<&str, &str> = old.iter().map(|f| (f.name.as_str(), f.content.as_str())).collect();
    let after: HashSet<&str> = new.iter().map(|f| f.name.as_str()).collect();

    let mut diff = SetDiff::default();
    for f in &new {
        match before.get(f.name.as_str()) {
            None => diff.added.push(f.name.clone()),
            Some(prev) if *prev != f.content => diff.changed.push(f.name.clone()),
            Some(_) => diff.unchanged += 1,
        }
    }
    for f in &old {
        if !after.contains(f.name.as_str()) {
            diff.removed.push(f.name.clone());
        }
    }
    diff
}

/// Above this many LCS cells the middle section falls back to a pairwise walk.
const LCS_MAX_CELLS: usize = 1_000_000;

/// Colored line diff; stops after `max_lines` output lines.
pub fn short_diff(old: &str, new: &str, max_lines: usize) -> String {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();

    // common prefix and suffix never show up
    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let a = &a[prefix..a.len() - suffix];
    let b = &b[prefix..b.len() - suffix];

    let ops = if a.len().saturating_mul(b.len()) <= LCS_MAX_CELLS {
        lcs_ops(a, b)
    } else {
        walk_ops(a, b)
    };

    let mut out: Vec<String> = Vec::new();
    for op in &ops {
        if out.len() >= max_lines {
            out.push("... (diff truncated)".dimmed().to_string());
            break;
        }
        match op {
            Op::Del(l) => out.push(format!("- {l}").red().to_string()),
            Op::Ins(l) => out.push(format!("+ {l}").green().to_string()),
        }
    }
    out.join("\n")
}

enum Op<'a> {
    Del(&'a str),
    Ins(&'a str),
}

fn lcs_ops<'a>(a: &[&'a str], b: &[&'a str]) -> Vec<Op<'a>> {
    let n = a.len();
    let m = b.len();
    let mut dp = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i][j] = if a[i] == b[j] {
                1 + dp[i + 1][j + 1]
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }

    let (mut i, mut j) = (0usize, 0usize);
    let mut ops = Vec::new();
    while i < n && j < m {
        if a[i] == b[j] {
            i += 1;
            j += 1;
        } else if dp[i + 1][j] >= dp[i][j + 1] {
            ops.push(Op::Del(a[i]));
            i += 1;
        } else {
            ops.push(Op::Ins(b[j]));
            j += 1;
        }
    }
    ops.extend(a[i..].iter().map(|l| Op::Del(*l)));
    ops.extend(b[j..].iter().map(|l| Op::Ins(*l)));
    ops
}

fn walk_ops<'a>(a: &[&'a str], b: &[&'a str]) -> Vec<Op<'a>> {
    let mut ops = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    while i < a.len() || j < b.len() {
        if i < a.len() && j < b.len() && a[i] == b[j] {
            i += 1;
            j += 1;
            continue;
        }
        if i < a.len() {
            ops.push(Op::Del(a[i]));
            i += 1;
        }
        if j < b.len() {
            ops.push(Op::Ins(b[j]));
            j += 1;
        }
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(name: &str, content: &str) -> FileEntry {
        FileEntry::new(name, content)
    }

    #[test]
    fn sanitize_normalizes_and_drops() {
        let (out, warnings) = sanitize(vec![
            f("./src\\App.tsx", "app"),
            f("/index.html", "<html>"),
            f("", "orphan"),
            f("../secrets.env", "x"),
            f("src//lib/./util.ts", "u"),
        ]);
        let names: Vec<&str> = out.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["src/App.tsx", "index.html", "src/lib/util.ts"]);
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn duplicates_are_kept_with_warning() {
        let (out, warnings) = sanitize(vec![f("a.txt", "1"), f("./a.txt", "2")]);
        assert_eq!(out.len(), 2);
        assert!(warnings[0].contains("duplicate file a.txt"));
        let deduped = dedupe_last_wins(&out);
        assert_eq!(deduped, vec![f("a.txt", "2")]);
    }

    #[test]
    fn dedupe_keeps_first_position() {
        let out = dedupe_last_wins(&[f("a", "1"), f("b", "2"), f("a", "3")]);
        assert_eq!(out, vec![f("a", "3"), f("b", "2")]);
    }

    #[test]
    fn diff_sets_reports_each_kind() {
        let old = vec![f("a", "1"), f("b", "2"), f("c", "3")];
        let new = vec![f("a", "1"), f("b", "22"), f("d", "4")];
        let d = diff_sets(&old, &new);
        assert_eq!(d.added, vec!["d".to_string()]);
        assert_eq!(d.removed, vec!["c".to_string()]);
        assert_eq!(d.changed, vec!["b".to_string()]);
        assert_eq!(d.unchanged, 1);
        assert!(!d.is_empty());
        assert!(diff_sets(&old, &old).is_empty());
    }

    #[test]
    fn short_diff_marks_lines() {
        colored::control::set_override(false);
        let d = short_diff("a\nb\nc", "a\nB\nc", 10);
        assert_eq!(d, "- b\n+ B");
        let long = short_diff("", &"x\n".repeat(50), 5);
        assert!(long.ends_with("... (diff truncated)"));
        assert_eq!(long.lines().count(), 6);
    }

    #[test]
    fn short_diff_inserted_line_does_not_shift_the_rest() {
        colored::control::set_override(false);
        let d = short_diff("a\nb\nc\nd", "a\nnew\nb\nc\nd", 10);
        assert_eq!(d, "+ new");
        let d = short_diff("a\nb\nc\nd", "a\nc\nd", 10);
        assert_eq!(d, "- b");
    }

    #[test]
    fn file_shadowed_by_later_folder_is_dropped() {
        let (out, warnings) = sanitize(vec![f("docs", "plain"), f("docs/index.md", "# Docs")]);
        assert_eq!(out, vec![f("docs/index.md", "# Docs")]);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("dropped file docs"));
    }

    #[test]
    fn folder_shadowed_by_later_file_is_dropped() {
        let (out, warnings) = sanitize(vec![
            f("src/lib/a.ts", "a"),
            f("src/main.ts", "m"),
            f("src/lib", "file now"),
        ]);
        let names: Vec<&str> = out.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["src/main.ts", "src/lib"]);
        assert!(warnings[0].contains("a later file is named src/lib"));
    }

    #[test]
    fn conflicts_are_listed_once() {
        let files = vec![f("docs", "x"), f("docs/a.md", "a"), f("docs/b.md", "b"), f("other", "o")];
        assert_eq!(path_conflicts(&files), vec!["docs".to_string()]);
        assert!(path_conflicts(&[f("docs/a.md", "a"), f("docsx", "b")]).is_empty());
    }
}
