//! CLI interface for feedback-agent

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::agent::{AdaptiveSession, ChatClient, FeedbackAwareSession, LanguageModel};
use crate::config::{self, Config};
use crate::feedback::{ContextBuilder, FeedbackStore, FeedbackSummary, SqliteFeedbackBackend};
use crate::policy::PreferencePolicy;
use crate::truncate_chars;

#[derive(Parser)]
#[command(name = "feedback-agent")]
#[command(about = "Conversational agent that learns from helpful/not-helpful feedback", long_about = None)]
#[command(version)]
struct Cli {
    /// Use this config file instead of the default location
    #[arg(short, long, global = true, env = "FEEDBACK_AGENT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat and rate each answer; ratings shape later answers
    Chat {
        /// User whose feedback history is used
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Chat with a session that adapts its style to your replies
    Adaptive {
        /// Load the learned policy from here and save it on exit
        #[arg(short, long)]
        policy_file: Option<PathBuf>,
    },
    /// Show feedback statistics for a user
    Summary {
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Show a user's most recent judged exchanges
    History {
        #[arg(short, long)]
        user: Option<String>,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the active configuration
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config file path
    Path,
}

/// Parse arguments and dispatch
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config_file = match &cli.config {
        Some(path) => path.clone(),
        None => config::config_path()?,
    };

    let config_path = cli.config.as_deref();
    match cli.command.unwrap_or(Commands::Chat { user: None }) {
        Commands::Config { command } => run_config(command, &config_file),
        Commands::Chat { user } => {
            let config = load_config(config_path)?;
            let user = user.unwrap_or_else(|| config.feedback.user_id.clone());
            run_chat(&config, &user).await
        }
        Commands::Adaptive { policy_file } => {
            let config = load_config(config_path)?;
            run_adaptive(&config, policy_file.as_deref()).await
        }
        Commands::Summary { user } => {
            let config = load_config(config_path)?;
            let user = user.unwrap_or_else(|| config.feedback.user_id.clone());
            let store = open_store(&config).await?;
            print_summary(&user, &store.summarize(&user).await?);
            Ok(())
        }
        Commands::History { user, limit } => {
            let config = load_config(config_path)?;
            let user = user.unwrap_or_else(|| config.feedback.user_id.clone());
            let limit = limit.unwrap_or(config.feedback.history_limit);
            let store = open_store(&config).await?;
            print_history(&store, &user, limit).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn run_config(command: ConfigCommands, config_file: &Path) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let config = if config_file.exists() { Config::load_from(config_file)? } else { Config::default() };
            config::show_config(&config, config_file)
        }
        ConfigCommands::Init { force } => {
            if config_file.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", config_file.display());
            }
            Config::default().save_to(config_file)?;
            println!("Wrote default configuration to {}", config_file.display());
            Ok(())
        }
        ConfigCommands::Path => {
            println!("{}", config_file.display());
            Ok(())
        }
    }
}

async fn open_store(config: &Config) -> Result<FeedbackStore> {
    let path = config.storage.database_path()?;
    let backend = SqliteFeedbackBackend::open(&path)
        .await
        .with_context(|| format!("Failed to open feedback database {}", path.display()))?;
    Ok(FeedbackStore::new(Arc::new(backend)).with_summary_window(config.feedback.summary_window))
}

fn build_model(config: &Config) -> Result<Arc<dyn LanguageModel>> {
    let provider = config.llm.provider_from_env()?;
    Ok(Arc::new(ChatClient::new(provider)))
}

/// Prompt and read one trimmed line; `None` on end of input
fn read_line(prompt: &str) -> Result<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

/// Ask until the user answers y or n; `None` on end of input
fn read_helpful() -> Result<Option<bool>> {
    loop {
        match read_line("Was this response helpful? (y/n): ")?.as_deref().map(str::to_lowercase) {
            None => return Ok(None),
            Some(answer) => match answer.as_str() {
                "y" | "yes" => return Ok(Some(true)),
                "n" | "no" => return Ok(Some(false)),
                _ => println!("Invalid input. Please enter 'y' or 'n'."),
            },
        }
    }
}

async fn run_chat(config: &Config, user: &str) -> Result<()> {
    let model = build_model(config)?;
    let store = open_store(config).await?;
    let context = ContextBuilder::new(store.clone()).with_example_limit(config.feedback.example_limit);

    let mut session = FeedbackAwareSession::new(user, model, store)
        .with_context_builder(context)
        .with_instructions(config.session.instructions.clone())
        .with_max_tokens(Some(config.llm.max_tokens))
        .with_temperature(config.llm.temperature);

    println!("Feedback-aware chat for '{}'.", user);
    println!("Ask a question, then rate the answer with 'y' or 'n'.");
    println!("Commands: 'summary', 'history', 'quit'.\n");

    let mut interactions = 0usize;
    while let Some(input) = read_line("You: ")? {
        if input.is_empty() {
            continue;
        }

        match input.to_lowercase().as_str() {
            "quit" | "exit" => break,
            "summary" => {
                show_summary(&session).await;
                continue;
            }
            "history" => {
                if let Err(e) = print_history(session.store(), user, config.feedback.history_limit).await {
                    println!("Error loading history: {}\n", e);
                }
                continue;
            }
            _ => {}
        }

        let response = match session.ask(&input).await {
            Ok(response) => response,
            Err(e) => {
                println!("Error processing query: {}\n", e);
                continue;
            }
        };
        interactions += 1;
        println!("\nAgent: {}\n", response);

        let Some(helpful) = read_helpful()? else { break };
        record_judgment(&session, helpful).await;
    }

    println!("\nTotal interactions: {}", interactions);
    show_summary(&session).await;
    Ok(())
}

/// Store a judgment of the last answer. A storage failure is reported and
/// the chat carries on; returns whether the judgment was stored.
async fn record_judgment(session: &FeedbackAwareSession, helpful: bool) -> bool {
    match session.judge_last(helpful).await {
        Ok(_) => {
            if helpful {
                println!("Noted. Similar answers will be favored.\n");
            } else {
                println!("Noted. Future answers will adjust.\n");
            }
            true
        }
        Err(e) => {
            println!("Error recording feedback: {}\n", e);
            false
        }
    }
}

/// Print the session user's summary, or the error that prevented it
async fn show_summary(session: &FeedbackAwareSession) -> bool {
    match session.summary().await {
        Ok(summary) => {
            print_summary(session.user_id(), &summary);
            true
        }
        Err(e) => {
            println!("Error loading summary: {}\n", e);
            false
        }
    }
}

async fn run_adaptive(config: &Config, policy_file: Option<&Path>) -> Result<()> {
    let model = build_model(config)?;

    let policy = match policy_file {
        Some(path) if path.exists() => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read policy file {}", path.display()))?;
            PreferencePolicy::restore(&text).context("Failed to parse policy file")?
        }
        _ => PreferencePolicy::default(),
    };

    let mut session = AdaptiveSession::with_policy(model, policy).with_max_tokens(Some(config.llm.max_tokens));

    println!("Adaptive chat. Tell the assistant what you think of its answers.");
    println!("Commands: 'policy', 'quit'.\n");

    while let Some(input) = read_line("You: ")? {
        if input.is_empty() {
            continue;
        }

        match input.to_lowercase().as_str() {
            "quit" | "exit" => break,
            "policy" => {
                print_policy(session.policy());
                continue;
            }
            _ => {}
        }

        match session.ask(&input).await {
            Ok(response) => println!("\nAgent: {}\n", response),
            Err(e) => println!("Error processing query: {}\n", e),
        }
    }

    print_policy(session.policy());
    if let Some(path) = policy_file {
        std::fs::write(path, session.serialize_policy())
            .with_context(|| format!("Failed to write policy file {}", path.display()))?;
        println!("Policy saved to {}", path.display());
    }
    Ok(())
}

fn print_summary(user: &str, summary: &FeedbackSummary) {
    println!("{}", render_summary(user, summary));
}

fn render_summary(user: &str, summary: &FeedbackSummary) -> String {
    let rule = "-".repeat(50);
    let body = if summary.is_empty() {
        "No feedback collected yet.".to_string()
    } else {
        format!(
            "Total Interactions: {}\nHelpful: {} ({})\nNeeds Improvement: {}\nHelpful Ratio: {}",
            summary.total_interactions,
            summary.helpful_count,
            summary.ratio_percent(),
            summary.not_helpful_count,
            summary.ratio_percent(),
        )
    };
    format!("\nFEEDBACK SUMMARY FOR {}\n{}\n{}\n{}\n", user.to_uppercase(), rule, body, rule)
}

async fn print_history(store: &FeedbackStore, user: &str, limit: usize) -> Result<()> {
    let history = store.recent_history(user, limit).await?;

    println!("\nRECENT INTERACTION HISTORY");
    println!("{}", "-".repeat(60));
    if history.is_empty() {
        println!("No interactions yet.");
    }
    for (i, record) in history.iter().enumerate() {
        let label = if record.helpful { "HELPFUL" } else { "NOT HELPFUL" };
        println!("\n{}. {}", i + 1, label);
        println!("   Q: {}", truncate_chars(&record.query, 80));
        println!("   A: {}", truncate_chars(&record.response, 80));
        println!("   Time: {}", record.timestamp.format("%Y-%m-%d %H:%M:%S"));
    }
    println!("{}\n", "-".repeat(60));
    Ok(())
}

fn print_policy(policy: &PreferencePolicy) {
    println!("\nLearned policy:");
    println!("  Technical depth:  {}", policy.technical_depth);
    println!("  Response length:  {}", policy.response_length);
    println!("  Include examples: {}", policy.prefer_examples);
    println!("  Total feedback:   {}", policy.feedback_count);
    println!("  Positive:         {}", policy.positive_feedback);
    println!("  Win rate:         {:.0}%\n", policy.win_rate());
}
