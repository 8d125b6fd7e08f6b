use anyhow::Context;
use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cli::{Args, ProviderKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schema_version: String,
    pub root: String,
    pub provider: ProviderKind,
    pub model: Option<String>,
    pub timeout_secs: u64,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub gemini_url: String,
    pub openai_url: String,
    pub anthropic_url: String,
    pub anthropic_version: String,
    pub ollama_url: String,
    /// Files larger than this are skipped when seeding from a directory.
    pub seed_max_bytes: usize,
    pub seed_excludes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: "v1".into(),
            root: ".".into(),
            provider: ProviderKind::Gemini,
            model: None,
            timeout_secs: 600,
            max_output_tokens: 32_768,
            temperature: 0.2,
            gemini_url: "https://generativelanguage.googleapis.com".into(),
            openai_url: "https://api.openai.com".into(),
            anthropic_url: "https://api.anthropic.com".into(),
            anthropic_version: "2023-06-01".into(),
            ollama_url: "http://localhost:11434".into(),
            seed_max_bytes: 200_000,
            seed_excludes: vec![
                "node_modules/**".into(),
                "target/**".into(),
                "dist/**".into(),
                "*.lock".into(),
                "package-lock.json".into(),
            ],
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Flags given on the command line win over the file; absent flags leave it alone.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(root) = &args.root {
            self.root = root.clone();
        }
        if let Some(kind) = args.provider {
            self.provider = kind;
        }
        if let Some(m) = &args.model {
            self.model = Some(m.clone());
        }
        if let Some(t) = args.timeout_secs {
            self.timeout_secs = t;
        }
    }

    /// Model used when none is given on the command line or in the config file.
    pub fn default_model(kind: ProviderKind) -> &'static str {
        match kind {
            ProviderKind::Gemini => "gemini-2.5-flash",
            ProviderKind::OpenAI => "gpt-4.1-mini",
            ProviderKind::Anthropic => "claude-sonnet-4-5",
            ProviderKind::Ollama => "qwen2.5-coder",
        }
    }

    pub fn model_for(&self, kind: ProviderKind) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| Self::default_model(kind).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn partial_toml_keeps_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "provider = \"ollama\"\ntemperature = 0.7\nollama_url = \"http://gpu-box:11434\"").unwrap();
        let cfg = Config::load(f.path()).unwrap();
        assert_eq!(cfg.provider, ProviderKind::Ollama);
        assert_eq!(cfg.ollama_url, "http://gpu-box:11434");
        assert_eq!(cfg.timeout_secs, 600);
        assert_eq!(cfg.model_for(cfg.provider), "qwen2.5-coder");
    }

    #[test]
    fn file_root_survives_when_flag_absent() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "root = \"/srv/gen\"\nprovider = \"openai\"").unwrap();
        let mut cfg = Config::load(f.path()).unwrap();
        cfg.apply_args(&Args::try_parse_from(["scaffold_gen"]).unwrap());
        assert_eq!(cfg.root, "/srv/gen");
        assert_eq!(cfg.provider, ProviderKind::OpenAI);

        cfg.apply_args(&Args::try_parse_from(["scaffold_gen", "--root", "out", "--timeout-secs", "5"]).unwrap());
        assert_eq!(cfg.root, "out");
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.provider, ProviderKind::OpenAI);
    }

    #[test]
    fn explicit_model_wins() {
        let cfg = Config { model: Some("gemini-2.5-pro".into()), ..Config::default() };
        assert_eq!(cfg.model_for(ProviderKind::Gemini), "gemini-2.5-pro");
    }

    #[test]
    fn bad_toml_is_an_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "provider = 12").unwrap();
        assert!(Config::load(f.path()).is_err());
    }
}
