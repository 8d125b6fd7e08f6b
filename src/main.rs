use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use humansize::{format_size, DECIMAL};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod archive;
mod cli;
mod config;
mod context;
mod errors;
mod files;
mod log;
mod prompt;
mod provider;
mod safety;
mod session;
mod tree;
mod ux;
mod wire;

use provider::Provider;
use session::Conversation;
use wire::ImageAttachment;

struct Runner<'a> {
    args: &'a cli::Args,
    cfg: config::Config,
    provider: provider::DynProvider,
    convo: Conversation,
}

impl Runner<'_> {
    async fn turn(&mut self, text: &str, image: Option<ImageAttachment>) -> anyhow::Result<()> {
        let before = self.convo.current_files().to_vec();
        let pb = ux::spinner(&format!("Generating with {}...", self.provider.name()));
        let provider: &dyn Provider = self.provider.as_ref();
        let result = self
            .convo
            .run_turn(provider, text, image, &self.cfg.schema_version, self.args.debug)
            .await;
        pb.finish_and_clear();
        self.persist_session()?;

        let out = result?;
        let saved = log::save_stage(
            Path::new(&self.cfg.root),
            &format!("turn-{}", out.turn),
            &out.request,
            &out.response,
            self.args.save_request,
            self.args.save_response,
        )?;
        if self.args.debug {
            log::print_saved_paths(&format!("turn-{}", out.turn), &saved);
        }

        ux::print_warnings(&out.warnings);
        println!();
        ux::show_tree(&out.files);
        ux::print_files_dashboard(&out.files);
        if !before.is_empty() {
            ux::print_diff(&out.diff, &before, &out.files, self.args.debug);
        }

        if !self.args.no_archive {
            self.save_archive(Path::new(&self.args.out))?;
        }
        if let Some(dir) = &self.args.write_dir {
            self.write_files(Path::new(dir))?;
        }
        Ok(())
    }

    fn save_archive(&self, path: &Path) -> anyhow::Result<()> {
        let files = self.convo.current_files();
        if files.is_empty() {
            println!("(nothing to archive yet)");
            return Ok(());
        }
        let bytes = archive::write_zip(path, files)
            .with_context(|| format!("writing archive {}", path.display()))?;
        println!(
            "{} {} ({})",
            "Archive written:".green().bold(),
            path.display(),
            format_size(bytes, DECIMAL)
        );
        Ok(())
    }

    fn write_files(&self, dir: &Path) -> anyhow::Result<()> {
        let bytes = archive::extract(dir, self.convo.current_files())?;
        println!(
            "{} {} ({})",
            "Files written to:".green().bold(),
            dir.display(),
            format_size(bytes, DECIMAL)
        );
        Ok(())
    }

    fn persist_session(&self) -> anyhow::Result<()> {
        if let Some(p) = &self.args.session {
            self.convo.save(Path::new(p))?;
        }
        Ok(())
    }

    async fn interactive(&mut self, mut image: Option<ImageAttachment>) -> anyhow::Result<()> {
        println!("{}", "Describe the project to generate. :help for commands.".bold());
        if !self.convo.current_files().is_empty() {
            ux::show_tree(self.convo.current_files());
        }
        while let Some(line) = ux::read_line(">") {
            match ux::parse_input(&line) {
                ux::Input::Empty => {}
                ux::Input::Quit => break,
                ux::Input::Help => ux::print_help(),
                ux::Input::Tree => ux::show_tree(self.convo.current_files()),
                ux::Input::Show(name) => {
                    if !ux::show_file(self.convo.current_files(), &name) {
                        println!("no such file: {name}");
                    }
                }
                ux::Input::Save(path) => {
                    let path = path.unwrap_or_else(|| self.args.out.clone());
                    if let Err(e) = self.save_archive(Path::new(&path)) {
                        ux::print_error(&e);
                    }
                }
                ux::Input::Write(dir) => {
                    if let Err(e) = self.write_files(Path::new(&dir)) {
                        ux::print_error(&e);
                    }
                }
                ux::Input::Image(path) => match context::load_image(Path::new(&path)) {
                    Ok(img) => {
                        println!("screenshot attached to the next prompt ({})", img.mime_type);
                        image = Some(img);
                    }
                    Err(e) => ux::print_error(&e),
                },
                ux::Input::Undo => {
                    if self.convo.undo() {
                        println!("reverted to the previous file set");
                        ux::show_tree(self.convo.current_files());
                        self.persist_session()?;
                    } else {
                        println!("nothing to undo");
                    }
                }
                ux::Input::Prompt(text) => {
                    let attached = image.take();
                    if let Err(e) = self.turn(&text, attached.clone()).await {
                        ux::print_error(&e);
                        if attached.is_some() {
                            println!("screenshot kept for the next prompt");
                        }
                        image = attached;
                    }
                }
                ux::Input::Unknown(s) => println!("unknown command {s} (try :help)"),
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = cli::Args::parse();
    log::init_tracing(args.debug);

    let mut cfg = match &args.config {
        Some(p) => config::Config::load(Path::new(p))?,
        None => config::Config::default(),
    };
    cfg.apply_args(&args);

    let model = cfg.model_for(cfg.provider);
    tracing::debug!(provider = ?cfg.provider, %model, "configured");
    let prov = provider::make_provider(cfg.provider, model, cfg.timeout_secs, &cfg)?;

    let convo = match &args.session {
        Some(p) if PathBuf::from(p).exists() => {
            let c = Conversation::load(Path::new(p))?;
            tracing::info!(session = %c.id, turns = c.turns.len(), "resumed session");
            c
        }
        _ => match &args.seed_dir {
            Some(dir) => {
                let seeded = context::seed_files(Path::new(dir), &cfg.seed_excludes, cfg.seed_max_bytes)
                    .with_context(|| format!("seeding from {dir}"))?;
                tracing::info!(files = seeded.len(), %dir, "seeded file set");
                Conversation::with_files(seeded)
            }
            None => Conversation::new(),
        },
    };

    let image = match &args.image {
        Some(p) => Some(context::load_image(Path::new(p))?),
        None => None,
    };

    let mut runner = Runner { args: &args, cfg, provider: prov, convo };
    match args.prompt.clone() {
        Some(text) => match runner.turn(&text, image).await {
            Ok(()) => Ok(ExitCode::SUCCESS),
            Err(e) => {
                ux::print_error(&e);
                Ok(ExitCode::FAILURE)
            }
        },
        None => {
            runner.interactive(image).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
