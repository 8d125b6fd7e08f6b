use crate::wire::FileEntry;

fn output_contract() -> &'static str {
r#"Output Contract (MANDATORY):
- Respond with exactly one JSON object: {"files": [{"name": "<relative path>", "content": "<full file contents>"}]}.
- No markdown, no code fences, no commentary before or after the JSON.
- `name` is a relative path with forward slashes (e.g. `src/components/Header.tsx`). Never absolute, never `..`.
- `content` is the COMPLETE file. Never elide with "..." or "rest unchanged".
- Each path appears at most once."#
}

fn scaffold_conventions() -> &'static str {
r#"Scaffold Conventions:
- Produce a project that installs and runs as-is: include the manifest (package.json, Cargo.toml, pyproject.toml, ...) with every dependency the code imports.
- Include a README.md with setup and run instructions.
- Include configuration the toolchain needs (tsconfig, bundler config, .gitignore).
- Prefer a small, conventional layout for the chosen stack over a bespoke one.
- Use realistic content and names taken from the user's domain; no lorem ipsum.
- No secrets, lockfiles, binary assets or build output."#
}

pub fn system_prompt() -> String {
    format!(
"You are a senior software engineer who generates complete project scaffolds.
Given a description (and possibly a screenshot of the desired UI), you return every file of a working project.

{output_contract}

{scaffold_conventions}",
        output_contract = output_contract(),
        scaffold_conventions = scaffold_conventions()
    )
}

/// The user turn. When a file set already exists the model is asked to
/// return the whole updated set, unchanged files included.
pub fn user_prompt(prompt: &str, current_files: &[FileEntry]) -> String {
    if current_files.is_empty() {
        return format!(
"Create a new project.

Request:
{prompt}"
        );
    }

    let mut list = String::new();
    for f in current_files {
        list.push_str(" - ");
        list.push_str(&f.name);
        list.push('\n');
    }

    format!(
"Update the existing project below. Return the COMPLETE resulting file set: every file that should exist afterwards, including the ones you did not change. Omitting a file deletes it.

Request:
{prompt}

Existing files:
{list}
Current contents (JSON):
{files_json}",
        files_json = files_context(current_files)
    )
}

pub fn files_context(current_files: &[FileEntry]) -> String {
    serde_json::to_string(&serde_json::json!({ "files": current_files }))
        .unwrap_or_else(|_| "{\"files\":[]}".to_string())
}

pub fn developer_note(has_image: bool) -> String {
    let mut note = String::from(
        "Output exactly one JSON object matching the schema; no markdown/code fences.",
    );
    if has_image {
        note.push_str(
            " A screenshot is attached: reproduce its layout, sections, copy and color scheme as closely as the stack allows.",
        );
    }
    note
}
