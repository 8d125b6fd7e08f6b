use colored::Colorize;
use humansize::{format_size, DECIMAL};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::time::Duration;

use crate::files::{short_diff, SetDiff};
use crate::tree;
use crate::wire::FileEntry;

/// A line typed in the interactive loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Prompt(String),
    Tree,
    Show(String),
    Save(Option<String>),
    Write(String),
    Image(String),
    Undo,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(cmd) = line.strip_prefix(':') else {
        return Input::Prompt(line.to_string());
    };
    let (name, arg) = match cmd.split_once(char::is_whitespace) {
        Some((n, a)) => (n, a.trim()),
        None => (cmd, ""),
    };
    match (name, arg.is_empty()) {
        ("q" | "quit" | "exit", _) => Input::Quit,
        ("tree", _) => Input::Tree,
        ("undo", _) => Input::Undo,
        ("help" | "h", _) => Input::Help,
        ("save", true) => Input::Save(None),
        ("save", false) => Input::Save(Some(arg.to_string())),
        ("show", false) => Input::Show(arg.to_string()),
        ("write", false) => Input::Write(arg.to_string()),
        ("image", false) => Input::Image(arg.to_string()),
        _ => Input::Unknown(line.to_string()),
    }
}

pub fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  <text>          send a prompt (the current files are sent along)");
    println!("  :image <path>   attach a screenshot to the next prompt");
    println!("  :tree           show the current file tree");
    println!("  :show <path>    print one file");
    println!("  :save [path]    write the archive (default: --out)");
    println!("  :write <dir>    write the files into a directory");
    println!("  :undo           go back to the previous file set");
    println!("  :quit           leave");
}

/// Read one line from stdin; `None` on EOF.
pub fn read_line(prompt: &str) -> Option<String> {
    print!("{} ", prompt.cyan().bold());
    let _ = io::stdout().flush();
    let mut s = String::new();
    match io::stdin().lock().read_line(&mut s) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(s),
    }
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

pub fn show_tree(files: &[FileEntry]) {
    if files.is_empty() {
        println!("(no files yet)");
        return;
    }
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    let nodes = tree::build(&names);
    print!("{}", tree::render(&nodes));
}

pub fn print_files_dashboard(files: &[FileEntry]) {
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    let (folders, count) = tree::count(&tree::build(&names));
    let bytes: usize = files.iter().map(|f| f.content.len()).sum();
    println!(
        "\n{}",
        "┏━━━━━━━━━━━━━━━━━━━━━━━━ Scaffold ━━━━━━━━━━━━━━━━━━━━━━━━┓".bold()
    );
    println!(
        "  {}: {}   {}: {}   {}: {}",
        "Files".green().bold(), count,
        "Folders".blue().bold(), folders,
        "Size".bold(), format_size(bytes, DECIMAL)
    );
    println!("{}", "┗━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━┛".bold());
}

pub fn print_diff(diff: &SetDiff, old: &[FileEntry], new: &[FileEntry], verbose: bool) {
    if diff.is_empty() {
        println!("{}", "(no file changes)".dimmed());
        return;
    }
    for p in &diff.added {
        println!("{} {}", "[ADDED]".green().bold(), p);
    }
    for p in &diff.changed {
        println!("{} {}", "[CHANGED]".yellow().bold(), p);
        if verbose {
            let before = old.iter().rev().find(|f| &f.name == p).map(|f| f.content.as_str()).unwrap_or("");
            let after = new.iter().rev().find(|f| &f.name == p).map(|f| f.content.as_str()).unwrap_or("");
            println!("{}", indent(&short_diff(before, after, 40), 4));
        }
    }
    for p in &diff.removed {
        println!("{} {}", "[REMOVED]".red().bold(), p);
    }
}

pub fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!("\n{}", "Sanitizer warnings:".yellow().bold());
    for w in warnings {
        println!(" - {}", w);
    }
}

pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "error:".red().bold(), err);
}

pub fn show_file(files: &[FileEntry], name: &str) -> bool {
    match files.iter().rev().find(|f| f.name == name) {
        Some(f) => {
            println!("{}", format!("── {} ──", f.name).bold());
            println!("{}", f.content);
            true
        }
        None => false,
    }
}

fn indent(s: &str, n: usize) -> String {
    let pad = " ".repeat(n);
    s.lines()
        .map(|l| format!("{}{}", pad, l))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_and_commands() {
        assert_eq!(parse_input("  build a blog \n"), Input::Prompt("build a blog".into()));
        assert_eq!(parse_input(""), Input::Empty);
        assert_eq!(parse_input(":q"), Input::Quit);
        assert_eq!(parse_input(":tree"), Input::Tree);
        assert_eq!(parse_input(":save"), Input::Save(None));
        assert_eq!(parse_input(":save out/site.zip"), Input::Save(Some("out/site.zip".into())));
        assert_eq!(parse_input(":show src/main.rs"), Input::Show("src/main.rs".into()));
        assert_eq!(parse_input(":image  shot.png "), Input::Image("shot.png".into()));
        assert_eq!(parse_input(":show"), Input::Unknown(":show".into()));
        assert_eq!(parse_input(":frobnicate"), Input::Unknown(":frobnicate".into()));
    }

    #[test]
    fn indent_pads_each_line() {
        assert_eq!(indent("a\nb", 2), "  a\n  b");
    }
}
