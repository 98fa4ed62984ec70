//! Line-oriented interview loop.
//!
//! Plain lines answer whatever was asked last. Lines starting with `#` are
//! commands (save, load, stage navigation, drafts).

use anyhow::Context;
use memoir_core::{
    archive_path, EngineError, InterviewEngine, LengthPreference, LifeStage, LimitChoice,
    Prompt, Strictness, StyleProfile, Tone, WriterArchive, WriterId,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

const HELP: &[(&str, &str)] = &[
    ("#quit", "Exit"),
    ("#save [path]", "Save the interview"),
    ("#load <path>", "Load a saved interview"),
    ("#status", "Show progress for every chapter"),
    ("#stage <name>", "Switch to a chapter"),
    ("#reopen <name>", "Reopen a finished chapter"),
    ("#skip", "Skip the current question"),
    ("#wrap", "Summarize and close the current chapter"),
    ("#themes <a, b>", "Set themes for the current chapter"),
    ("#style <setting>", "short|medium|long, strict|moderate|flexible, warm|calm|plain|lively"),
    ("#draft [name]", "Write the narrative for a chapter"),
    ("#polish [name]", "Polish a chapter's narrative"),
    ("#edit <text>", "Replace the current chapter's narrative"),
    ("#memoir", "Print every narrative written so far"),
    ("#help", "Show this help"),
];

fn print_help() {
    println!("[HELP]");
    for (command, description) in HELP {
        println!("  {command:<18} - {description}");
    }
    println!("  (anything else answers the current question)");
}

fn print_prompt(prompt: &Prompt) {
    match prompt {
        Prompt::Identity { text, options } => {
            println!("[GUIDE] {text}");
            for (i, option) in options.iter().enumerate() {
                println!("  {}. {}", i + 1, option.label());
            }
        }
        Prompt::Relation { text } => println!("[GUIDE] {text}"),
        Prompt::Question { stage, text, tip, .. } => {
            if let Some(tip) = tip {
                println!("[{}] {tip}", stage.label());
            }
            println!("[GUIDE] {text}");
        }
        Prompt::LimitOffer { text, .. } => println!("[GUIDE] {text}"),
        Prompt::StageClosed { notice, .. } => println!("[CHAPTER] {notice}"),
        Prompt::Superseded { stage } => println!("[INFO] Moved away from {stage}."),
    }
    println!();
}

/// Apply a `#style` word to the profile. Returns false when unknown.
fn apply_style(style: &mut StyleProfile, word: &str) -> bool {
    match word {
        "short" => style.length = LengthPreference::Short,
        "medium" => style.length = LengthPreference::Medium,
        "long" => style.length = LengthPreference::Long,
        "strict" => style.strictness = Strictness::Strict,
        "moderate" => style.strictness = Strictness::Moderate,
        "flexible" => style.strictness = Strictness::Flexible,
        "warm" => style.tone = Tone::Warm,
        "calm" => style.tone = Tone::Calm,
        "plain" => style.tone = Tone::Plain,
        "lively" => style.tone = Tone::Lively,
        _ => return false,
    }
    true
}

struct Repl {
    engine: InterviewEngine,
    writer: WriterId,
    last: Prompt,
}

impl Repl {
    async fn active_stage(&self) -> Result<LifeStage, EngineError> {
        Ok(self.engine.progress(&self.writer).await?.active_stage)
    }

    /// Resolve an optional stage argument, defaulting to the active stage.
    async fn stage_arg(&self, arg: &str) -> Result<Option<LifeStage>, EngineError> {
        if arg.trim().is_empty() {
            return Ok(Some(self.active_stage().await?));
        }
        Ok(LifeStage::parse(arg))
    }

    async fn show(&mut self, prompt: Result<Prompt, EngineError>) {
        match prompt {
            Ok(prompt) => {
                print_prompt(&prompt);
                let follow_up = matches!(
                    prompt,
                    Prompt::StageClosed { .. } | Prompt::Superseded { .. }
                );
                self.last = prompt;
                if follow_up {
                    let next = self.engine.start(&self.writer).await;
                    Box::pin(self.show(next)).await;
                }
            }
            Err(EngineError::StageDone { stage }) => {
                println!("[INFO] {stage} is complete. Use #stage or #reopen to continue.");
            }
            Err(e) => println!("[ERROR] {e}"),
        }
    }

    async fn answer(&mut self, line: &str) {
        let result = match &self.last {
            Prompt::Identity { .. } => self.engine.answer_identity_text(&self.writer, line).await,
            Prompt::Relation { .. } => self.engine.answer_relation(&self.writer, line).await,
            Prompt::LimitOffer { .. } => self.engine.choose_text(&self.writer, line).await,
            _ => self.engine.answer(&self.writer, line).await,
        };
        print!("\r          \r");
        if let Err(EngineError::UnclearChoice) = result {
            println!("[GUIDE] Please answer 1 to keep exploring or 2 to summarize.");
            return;
        }
        self.show(result).await;
    }

    async fn save(&self, path: Option<&str>) -> anyhow::Result<PathBuf> {
        let path = match path {
            Some(path) => PathBuf::from(path),
            None => archive_path(".", &self.writer),
        };
        let archive = self.engine.archive(&self.writer).await?;
        archive.save_json(&path).await?;
        Ok(path)
    }

    async fn load(&mut self, path: &str) -> anyhow::Result<()> {
        let archive = WriterArchive::load_json(path)
            .await
            .with_context(|| format!("reading {path}"))?;
        self.engine.restore(&archive).await?;
        self.writer = archive.writer.clone();
        println!(
            "[LOADED] {} turns across {} chapters, {} drafts",
            archive.metadata.total_turns,
            archive.sessions.len(),
            archive.metadata.drafts
        );
        Ok(())
    }

    async fn status(&self) -> Result<(), EngineError> {
        println!("[STATUS] writer {}", self.writer);
        for stage in self.engine.overview(&self.writer).await? {
            let marker = if stage.active { ">" } else { " " };
            let state = if stage.done { "done" } else { "open" };
            let draft = if stage.has_draft { ", drafted" } else { "" };
            println!(
                " {marker} {:<14} {:>2} answers {:>5} chars  {state}{draft}",
                stage.stage.label(),
                stage.turns,
                stage.chars
            );
        }
        Ok(())
    }

    /// Handle one `#` command. Returns false to quit.
    async fn command(&mut self, line: &str) -> bool {
        let (name, arg) = line.split_once(' ').unwrap_or((line, ""));
        let arg = arg.trim();

        match name {
            "quit" | "exit" => {
                println!("Goodbye!");
                return false;
            }
            "help" => print_help(),
            "save" => match self.save((!arg.is_empty()).then_some(arg)).await {
                Ok(path) => println!("[SAVED] {}", path.display()),
                Err(e) => println!("[ERROR] Save failed: {e:#}"),
            },
            "load" if arg.is_empty() => println!("[ERROR] Usage: #load <path>"),
            "load" => match self.load(arg).await {
                Ok(()) => {
                    let next = self.engine.start(&self.writer).await;
                    self.show(next).await;
                }
                Err(e) => println!("[ERROR] Load failed: {e:#}"),
            },
            "status" => {
                if let Err(e) = self.status().await {
                    println!("[ERROR] {e}");
                }
            }
            "stage" | "reopen" => match LifeStage::parse(arg) {
                Some(stage) => {
                    let moved = if name == "stage" {
                        self.engine.switch_stage(&self.writer, stage).await
                    } else {
                        self.engine.reopen_stage(&self.writer, stage).await
                    };
                    match moved {
                        Ok(_) => {
                            let next = self.engine.start(&self.writer).await;
                            self.show(next).await;
                        }
                        Err(e) => println!("[ERROR] {e}"),
                    }
                }
                None => println!("[ERROR] Unknown chapter: {arg}"),
            },
            "skip" => {
                let next = self.engine.skip(&self.writer).await;
                self.show(next).await;
            }
            "wrap" => {
                let next = self.engine.choose(&self.writer, LimitChoice::Summarize).await;
                self.show(next).await;
            }
            "themes" => {
                let themes: Vec<&str> = arg.split(',').collect();
                let result = match self.active_stage().await {
                    Ok(stage) => self.engine.set_themes(&self.writer, stage, themes).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(()) => println!("[OK] Themes set"),
                    Err(e) => println!("[ERROR] {e}"),
                }
            }
            "style" => match self.engine.style(&self.writer).await {
                Ok(mut style) => {
                    if apply_style(&mut style, &arg.to_lowercase()) {
                        match self.engine.set_style(&self.writer, style).await {
                            Ok(()) => println!("[OK] Style updated"),
                            Err(e) => println!("[ERROR] {e}"),
                        }
                    } else {
                        println!("[ERROR] Unknown style setting: {arg}");
                    }
                }
                Err(e) => println!("[ERROR] {e}"),
            },
            "draft" => match self.stage_arg(arg).await {
                Ok(Some(stage)) => {
                    println!("[WORKING]");
                    match self.engine.synthesize(&self.writer, stage).await {
                        Ok(draft) => println!("[DRAFT {}]\n{}\n", stage.label(), draft.text),
                        Err(e) => println!("[ERROR] {e}"),
                    }
                }
                Ok(None) => println!("[ERROR] Unknown chapter: {arg}"),
                Err(e) => println!("[ERROR] {e}"),
            },
            "polish" => match self.stage_arg(arg).await {
                Ok(Some(stage)) => match self.engine.polish(&self.writer, stage).await {
                    Ok(outcome) if outcome.applied => {
                        println!("[POLISHED {}]\n{}\n", stage.label(), outcome.text)
                    }
                    Ok(_) => println!("[INFO] Polish changed facts; kept the original."),
                    Err(e) => println!("[ERROR] {e}"),
                },
                Ok(None) => println!("[ERROR] Unknown chapter: {arg}"),
                Err(e) => println!("[ERROR] {e}"),
            },
            "edit" if arg.is_empty() => println!("[ERROR] Usage: #edit <text>"),
            "edit" => {
                let result = match self.active_stage().await {
                    Ok(stage) => self.engine.edit_draft(&self.writer, stage, arg).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(_) => println!("[OK] Narrative replaced"),
                    Err(e) => println!("[ERROR] {e}"),
                }
            }
            "memoir" => match self.engine.compile_memoir(&self.writer).await {
                Ok(memoir) if memoir.is_empty() => println!("[INFO] Nothing drafted yet."),
                Ok(memoir) => println!("{memoir}\n"),
                Err(e) => println!("[ERROR] {e}"),
            },
            _ => println!("[ERROR] Unknown command. Type #help for help."),
        }
        true
    }
}

/// Run the interview until stdin closes or `#quit`.
pub async fn run(engine: InterviewEngine, writer: WriterId, load: Option<&str>) -> anyhow::Result<()> {
    println!("=== Memoir ===");
    println!("Type #help for commands.");
    println!();

    let mut repl = Repl {
        engine,
        writer,
        last: Prompt::Superseded {
            stage: LifeStage::default(),
        },
    };
    if let Some(path) = load {
        repl.load(path).await?;
    }
    let first = repl.engine.start(&repl.writer).await;
    repl.show(first).await;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            if !repl.command(command.trim()).await {
                break;
            }
        } else {
            print!("[THINKING]");
            stdout.flush().ok();
            repl.answer(line).await;
        }
        stdout.flush().ok();
    }

    Ok(())
}
