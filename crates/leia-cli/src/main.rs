//! LeIA CLI - Terminal chat with the LeIA assistant
//!
//! Usage:
//!   leia [chat] [--no-typing] [--typing-delay-ms <ms>]
//!   leia ask <question> [--json]
//!   leia route <question>
//!   leia config
//!
//! Author: hephaex@gmail.com

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use leia_core::AppConfig;
use leia_query::{EntityExtractor, PgExecutor, QueryEngine};
use leia_rag::Assistant;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const GREETING: &str = "Olá, sou a sua assistente virtual LeIA, como posso te ajudar hoje?";
const EXIT_HINT: &str = "Digite 'sair' quando quiser encerrar a minha assistência!";
const WAITING: &str = "LeIA: Aguarde um momento, por gentileza...";
const GOODBYE: &str = "LeIA: Até Logo!";
const EXIT_WORDS: [&str; 3] = ["sair", "exit", "quit"];

#[derive(Parser)]
#[command(name = "leia")]
#[command(about = "Assistente virtual LeIA no terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat(ChatArgs),
    /// Answer a single question
    Ask {
        /// Question to ask
        question: String,
        /// Print the same JSON body as POST /pergunta
        #[arg(long)]
        json: bool,
    },
    /// Show the detected intent and entities for a question
    Route {
        /// Question to analyze
        question: String,
    },
    /// Print the effective configuration
    Config,
}

#[derive(clap::Args)]
struct ChatArgs {
    /// Print replies at once instead of character by character
    #[arg(long)]
    no_typing: bool,
    /// Delay between characters of the typing effect
    #[arg(long, default_value_t = 20)]
    typing_delay_ms: u64,
}

impl Default for ChatArgs {
    fn default() -> Self {
        Self {
            no_typing: false,
            typing_delay_ms: 20,
        }
    }
}

impl ChatArgs {
    fn typing_delay(&self) -> Option<Duration> {
        (!self.no_typing && self.typing_delay_ms > 0)
            .then(|| Duration::from_millis(self.typing_delay_ms))
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("leia={}", config.logging.level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_assistant(config: &AppConfig) -> anyhow::Result<Assistant> {
    let db = PgExecutor::connect_lazy(&config.database)?;
    let engine = QueryEngine::new(
        Arc::new(db),
        EntityExtractor::new(config.assistant.known_clients.clone()),
    );
    Ok(Assistant::new(engine, config.llm.clone(), config.rag.clone()))
}

fn is_exit(input: &str) -> bool {
    EXIT_WORDS.contains(&input.trim().to_lowercase().as_str())
}

/// Print `text` one character at a time
async fn type_out(text: &str, delay: Option<Duration>) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    match delay {
        None => writeln!(stdout, "{text}")?,
        Some(delay) => {
            for c in text.chars() {
                write!(stdout, "{c}")?;
                stdout.flush()?;
                tokio::time::sleep(delay).await;
            }
            writeln!(stdout)?;
        }
    }
    stdout.flush()
}

async fn chat(config: &AppConfig, args: ChatArgs) -> anyhow::Result<()> {
    let assistant = build_assistant(config)?;
    if !assistant.llm_available().await {
        println!(
            "Aviso: {} não definida; as respostas mostrarão os dados brutos do banco.",
            config.llm.provider.key_variable()
        );
    }

    let delay = args.typing_delay();
    println!("{GREETING}");
    println!("{EXIT_HINT}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nVocê: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if is_exit(question) {
            break;
        }

        println!("{WAITING}");
        let reply = assistant.answer(question).await;
        print!("LeIA: ");
        type_out(&reply.text, delay).await?;
        if let Some(error) = reply.ai_error {
            tracing::debug!(error = %error, "AI pass failed");
        }
    }

    println!("{GOODBYE}");
    Ok(())
}

async fn ask(config: &AppConfig, question: &str, as_json: bool) -> anyhow::Result<()> {
    let assistant = build_assistant(config)?;
    let reply = assistant.answer(question).await;

    if !as_json {
        println!("{}", reply.text);
        return Ok(());
    }

    let mut body = json!({
        "sucesso": !question.trim().is_empty(),
        "pergunta": question,
        "resposta": reply.text,
        "timestamp": chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        "versao": "1.0",
    });
    if let Some(error) = reply.ai_error {
        body["dados_extras"] = json!({ "erro_ia": error });
    }
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

fn route(question: &str, config: &AppConfig) -> anyhow::Result<()> {
    let entities = EntityExtractor::new(config.assistant.known_clients.clone()).extract(question);

    println!("Intenção: {}", leia_query::route(question));
    println!("{}", serde_json::to_string_pretty(&entities)?);
    Ok(())
}

fn show_config(config: &AppConfig) -> anyhow::Result<()> {
    let mut value = serde_json::to_value(config)?;
    value["database"]["password"] = json!(config.database.masked_password());
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(&config);

    match cli.command.unwrap_or_else(|| Commands::Chat(ChatArgs::default())) {
        Commands::Chat(args) => chat(&config, args).await?,
        Commands::Ask { question, json } => ask(&config, &question, json).await?,
        Commands::Route { question } => route(&question, &config)?,
        Commands::Config => show_config(&config)?,
    }

    Ok(())
}
