use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[value(alias = "google")]
    Gemini,
    #[value(name = "openai", alias = "open-ai")]
    OpenAI,
    Anthropic,
    Ollama,
}

#[derive(Parser, Debug)]
#[command(
    name = "scaffold_gen",
    version,
    about = "Turn a prompt (and optional screenshot) into a downloadable project scaffold"
)]
pub struct Args {
    /// Prompt for a single turn. Without it an interactive session starts.
    #[arg(long, short)]
    pub prompt: Option<String>,

    /// Screenshot attached to the first prompt.
    #[arg(long)]
    pub image: Option<String>,

    #[arg(long, value_enum)]
    pub provider: Option<ProviderKind>,

    /// Defaults to the configured model for the selected provider.
    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Where the archive of the current file set is written.
    #[arg(long, default_value = "scaffold.zip")]
    pub out: String,

    #[arg(long, default_value_t = false)]
    pub no_archive: bool,

    /// Also write the generated files into this directory.
    #[arg(long)]
    pub write_dir: Option<String>,

    /// Start from the files of an existing project instead of an empty set.
    #[arg(long)]
    pub seed_dir: Option<String>,

    /// Load the conversation from this file if it exists and save it after every turn.
    #[arg(long)]
    pub session: Option<String>,

    /// Directory under which `.scaffold/` request artifacts are stored.
    /// Defaults to the config file's `root`, then `.`.
    #[arg(long)]
    pub root: Option<String>,

    #[arg(long)]
    pub config: Option<String>,

    #[arg(long, default_value_t = false)]
    pub save_request: bool,

    #[arg(long, default_value_t = false)]
    pub save_response: bool,

    #[arg(long, default_value_t = false)]
    pub debug: bool,
}
