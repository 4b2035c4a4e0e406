//! Command-line interface for smartsight.
//!
//! Loads a saved article page into a static document, mounts the companion
//! on it and prints what the overlay would show. Also manages the domain
//! whitelist and shows the resolved configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::time::Instant;

use crate::adapters::CommandModel;
use crate::config::{self, ResolvedConfig};
use crate::core::gate::{self, Activation, Decision, WhitelistStore};
use crate::core::Companion;
use crate::domain::{Artifact, CacheSlot, OptionLetter};
use crate::page::{Document, StaticDocument};
use crate::view::Tab;

/// Interval between animation frames
const FRAME: Duration = Duration::from_millis(16);
/// Upper bound on frames spent waiting for the chart sweep
const MAX_CHART_FRAMES: usize = 600;

/// smartsight - On-page article companion
#[derive(Parser, Debug)]
#[command(name = "smartsight")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mount the companion on a saved page and print every analysis
    Analyze {
        /// Saved HTML page
        html: PathBuf,

        /// URL the page was loaded from
        #[arg(short, long)]
        url: String,

        /// Start even if the page is not eligible
        #[arg(long)]
        force: bool,

        /// Also run the topic and source-trust analysis
        #[arg(long)]
        advanced: bool,

        /// Scroll from top to bottom and print the active paragraph
        #[arg(long)]
        scroll: bool,

        /// Print the job event log
        #[arg(long)]
        events: bool,
    },

    /// Take a comprehension quiz on a saved page
    Quiz {
        html: PathBuf,

        #[arg(short, long)]
        url: String,

        #[arg(long)]
        force: bool,
    },

    /// Chat about a saved page (`/s N` sends suggestion N, `/quit` exits)
    Chat {
        html: PathBuf,

        #[arg(short, long)]
        url: String,

        #[arg(long)]
        force: bool,
    },

    /// Check whether the companion would start on a URL
    Check {
        url: String,
    },

    /// Manage the whitelisted domains
    Domains {
        #[command(subcommand)]
        command: DomainCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum DomainCommands {
    /// List whitelisted domains
    List,

    /// Add a domain
    Add { domain: String },

    /// Remove a domain
    Remove { domain: String },

    /// Add the host of a page URL
    AddSite { url: String },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Analyze {
                html,
                url,
                force,
                advanced,
                scroll,
                events,
            } => analyze(&html, &url, force, advanced, scroll, events).await,
            Commands::Quiz { html, url, force } => quiz(&html, &url, force).await,
            Commands::Chat { html, url, force } => chat(&html, &url, force).await,
            Commands::Check { url } => check(&url),
            Commands::Domains { command } => domains(command),
            Commands::Config => show_config(),
        }
    }
}

/// Read a saved page into a static document
fn load_page(path: &Path) -> Result<Arc<StaticDocument>> {
    let html = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read page: {}", path.display()))?;
    Ok(Arc::new(StaticDocument::from_html(&html)))
}

fn open_whitelist(cfg: &ResolvedConfig) -> Result<WhitelistStore> {
    WhitelistStore::open(cfg.whitelist_path())
}

/// Gate the page and build a companion on it; `None` when not eligible
fn open_companion(
    document: Arc<StaticDocument>,
    url: &str,
    force: bool,
) -> Result<Option<Companion>> {
    let cfg = config::config()?;
    let store = open_whitelist(cfg)?;
    let model = CommandModel::from_command_line(&cfg.model_command)
        .context("Model command is empty")?
        .with_timeout(cfg.model_timeout);
    let activation = if force {
        Activation::Forced
    } else {
        Activation::Normal
    };

    match Companion::activate(
        document,
        url,
        store.domains(),
        activation,
        Arc::new(model),
        cfg.tuning.clone(),
    ) {
        Ok(companion) => Ok(Some(companion)),
        Err(rejection) => {
            eprintln!("Not starting: {}", rejection);
            eprintln!("Use --force to analyze this page anyway.");
            Ok(None)
        }
    }
}

/// Plain-text rendering of an overlay fragment
fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 80).trim_end().to_string()
}

/// Mount the companion while delivering animation frames
async fn mount_with_frames(companion: &Companion) {
    let mount = companion.mount();
    tokio::pin!(mount);
    let mut frames = tokio::time::interval(FRAME);
    loop {
        tokio::select! {
            _ = &mut mount => break,
            now = frames.tick() => companion.animation_frame(now),
        }
    }
}

/// Open a tab while delivering animation frames
async fn open_tab_with_frames(companion: &Companion, tab: Tab) {
    let open = companion.open_tab(tab);
    tokio::pin!(open);
    let mut frames = tokio::time::interval(FRAME);
    loop {
        tokio::select! {
            _ = &mut open => break,
            now = frames.tick() => companion.animation_frame(now),
        }
    }
}

fn print_section(title: &str, html: Option<&str>) {
    println!("== {} ==", title);
    match html {
        Some(html) => println!("{}", html_to_text(html)),
        None => println!("(no result)"),
    }
    println!();
}

async fn analyze(
    html: &Path,
    url: &str,
    force: bool,
    advanced: bool,
    scroll: bool,
    show_events: bool,
) -> Result<()> {
    let document = load_page(html)?;
    let Some(companion) = open_companion(Arc::clone(&document), url, force)? else {
        return Ok(());
    };

    if companion.article().is_empty() {
        anyhow::bail!("No article paragraphs found in {}", html.display());
    }
    eprintln!(
        "Analyzing {} paragraphs from {}",
        companion.article().len(),
        companion.article().host
    );

    mount_with_frames(&companion).await;

    let view = companion.view();
    print_section("Bias", view.bias.body.html());
    print_section("Deep analysis", view.deep.body.html());

    println!("== Emotion pulse ==");
    match companion.cache().get(CacheSlot::Emotions) {
        Some(Artifact::Emotions(trace)) => {
            for (paragraph, score) in companion.article().paragraphs.iter().zip(trace.scores()) {
                let preview: String = paragraph.text.chars().take(60).collect();
                println!("[{:>2}] {:.2}  {}", paragraph.index, score, preview);
            }
        }
        _ => match view.emotions.body.html() {
            Some(error) => println!("{}", html_to_text(error)),
            None => println!("(no result)"),
        },
    }
    println!();

    if advanced {
        open_tab_with_frames(&companion, Tab::Analysis).await;
        let mut frames = tokio::time::interval(FRAME);
        for _ in 0..MAX_CHART_FRAMES {
            if companion.chart_finished() {
                break;
            }
            companion.animation_frame(frames.tick().await);
        }

        let view = companion.view();
        print_section("Topics", view.legend_html.as_deref());
        print_section("Source trust", view.trust_html.as_deref());
    }

    if scroll {
        println!("== Scroll ==");
        let step = (document.viewport_height() / 4.0).max(1.0);
        let mut y = 0.0;
        loop {
            document.scroll_to(y);
            companion.on_scroll();
            companion.animation_frame(Instant::now());
            println!(
                "scroll {:>6.0}px -> paragraph {}",
                document.scroll_y(),
                companion
                    .active_paragraph()
                    .map(|i| i.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
            if y >= document.max_scroll() {
                break;
            }
            y = (y + step).min(document.max_scroll());
        }
        println!();
    }

    if show_events {
        println!("== Events ==");
        println!("{:<10} {:<16} {:>8}  {}", "KIND", "EVENT", "MS", "SUMMARY");
        println!("{}", "-".repeat(60));
        for event in companion.events() {
            println!(
                "{:<10} {:<16} {:>8}  {}{}",
                event.kind.to_string(),
                event.event_type.to_string(),
                event
                    .duration_ms
                    .map(|ms| ms.to_string())
                    .unwrap_or_default(),
                event.summary,
                event
                    .error
                    .map(|e| format!(" ({})", e))
                    .unwrap_or_default()
            );
        }
    }

    companion.teardown().await;
    Ok(())
}

async fn read_line(lines: &mut Lines<BufReader<Stdin>>) -> Result<Option<String>> {
    lines.next_line().await.context("Failed to read from stdin")
}

async fn quiz(html: &Path, url: &str, force: bool) -> Result<()> {
    let document = load_page(html)?;
    let Some(companion) = open_companion(document, url, force)? else {
        return Ok(());
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    companion.open_tab(Tab::Quiz).await;
    loop {
        let view = companion.view();
        let Some(form) = view.quiz_form else {
            print_section("Quiz", view.quiz.body.html());
            break;
        };

        for (q, item) in form.items.iter().enumerate() {
            println!("Q{}: {}", q + 1, item.question);
            for (letter, option) in OptionLetter::ALL.iter().zip(&item.options) {
                println!("  {}) {}", letter, option);
            }
            loop {
                print!("Answer [A-D]: ");
                std::io::Write::flush(&mut std::io::stdout()).ok();
                let Some(line) = read_line(&mut lines).await? else {
                    return Ok(());
                };
                let letter = line.trim().chars().next().and_then(OptionLetter::from_char);
                if let Some(letter) = letter {
                    companion.select_answer(q, letter);
                    break;
                }
            }
            println!();
        }

        if let Some(grade) = companion.submit_quiz() {
            for (q, item) in form.items.iter().enumerate() {
                println!("Q{}: correct answer {}", q + 1, item.correct);
            }
            if let Some(results) = companion.view().quiz_form.and_then(|f| f.results_html) {
                println!("{}", html_to_text(&results));
            }
            println!("Score: {}/{} ({}%)", grade.correct, grade.total, grade.percent);
        }

        print!("Retake? [y/N]: ");
        std::io::Write::flush(&mut std::io::stdout()).ok();
        match read_line(&mut lines).await? {
            Some(line) if line.trim().eq_ignore_ascii_case("y") => {
                companion.retake_quiz().await;
            }
            _ => break,
        }
    }

    companion.teardown().await;
    Ok(())
}

async fn chat(html: &Path, url: &str, force: bool) -> Result<()> {
    let document = load_page(html)?;
    let Some(companion) = open_companion(document, url, force)? else {
        return Ok(());
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    companion.open_tab(Tab::Chat).await;
    loop {
        let suggestions = companion.view().suggestions;
        for (i, question) in suggestions.iter().enumerate() {
            println!("  /s {}  {}", i + 1, question);
        }
        print!("> ");
        std::io::Write::flush(&mut std::io::stdout()).ok();

        let Some(line) = read_line(&mut lines).await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }

        match line.strip_prefix("/s ") {
            Some(n) => match n.trim().parse::<usize>() {
                Ok(n) if n >= 1 && n <= suggestions.len() => {
                    companion.click_suggestion(n - 1).await;
                }
                _ => {
                    eprintln!("Unknown suggestion: {}", n);
                    continue;
                }
            },
            None => {
                companion.send_chat(line).await;
            }
        }

        if let Some(reply) = companion.view().chat.last() {
            println!("{}\n", html_to_text(&reply.html));
        }
    }

    companion.teardown().await;
    Ok(())
}

fn check(url: &str) -> Result<()> {
    let cfg = config::config()?;
    let store = open_whitelist(cfg)?;

    match gate::decide(url, store.domains(), Activation::Normal) {
        Decision::Reject(rejection) => println!("not eligible: {}", rejection),
        _ => println!("eligible"),
    }
    Ok(())
}

fn domains(command: DomainCommands) -> Result<()> {
    let cfg = config::config()?;
    let mut store = open_whitelist(cfg)?;

    match command {
        DomainCommands::List => {
            if store.domains().is_empty() {
                println!("No domains whitelisted");
            }
            for domain in store.domains() {
                println!("{}", domain);
            }
            return Ok(());
        }
        DomainCommands::Add { domain } => {
            let added = store.add(&domain)?;
            println!("Added {}", added);
        }
        DomainCommands::Remove { domain } => {
            store.remove(&domain)?;
            println!("Removed {}", domain.trim().to_lowercase());
        }
        DomainCommands::AddSite { url } => {
            let added = store.add_site(&url)?;
            println!("Added {}", added);
        }
    }
    store.save()
}

fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("SmartSight Configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:      {}", cfg.home.display());
    println!("  Whitelist: {}", cfg.whitelist_path().display());
    println!();
    println!("Model:");
    println!("  Command: {}", cfg.model_command.join(" "));
    println!("  Timeout: {}s", cfg.model_timeout.as_secs());
    println!();
    println!("Tuning:");
    let tuning = serde_yaml::to_string(&cfg.tuning).context("Failed to render tuning")?;
    for line in tuning.lines() {
        println!("  {}", line);
    }

    Ok(())
}
