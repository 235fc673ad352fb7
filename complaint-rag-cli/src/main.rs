use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use complaint_rag_core::config::Config;
use complaint_rag_core::detection::{self, DetectionError};
use complaint_rag_core::models::ModelRegistry;
use complaint_rag_core::preprocess::{self, Complaint};
use complaint_rag_core::provider::OllamaProvider;
use complaint_rag_core::rag::{AnswerResult, Backends, RagOrchestrator};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "complaint-rag")]
#[command(about = "Ask questions about customer complaints", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Answer a question from the complaint index")]
    Ask {
        question: String,

        #[arg(
            short,
            long,
            help = "Number of fragments to retrieve (defaults to retrieval.default_k)"
        )]
        k: Option<usize>,

        #[arg(long, help = "Print the answer as JSON")]
        json: bool,
    },

    #[command(about = "Check that the model server and configured models are available")]
    Check,

    #[command(about = "Model management commands")]
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },

    #[command(about = "Clean a single narrative the way the indexer does")]
    Clean { text: String },

    #[command(about = "Filter and clean a JSON export of complaints")]
    Preprocess {
        input: PathBuf,

        #[arg(short, long, help = "Write the result here instead of stdout")]
        output: Option<PathBuf>,

        #[arg(
            short,
            long = "product",
            help = "Product to keep; repeat for several (defaults to the built-in list)"
        )]
        products: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ModelCommands {
    #[command(about = "Show current models")]
    Show,

    #[command(about = "Set the LLM model")]
    Set {
        #[arg(help = "Model name (e.g., 'falcon:7b-instruct' or 'llama3.2:3b')")]
        model: String,
    },

    #[command(about = "List available models from Ollama")]
    List {
        #[arg(short, long, default_value = "http://localhost:11434")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("complaint_rag_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Show => show_config(&cli.config),
        Commands::Ask { question, k, json } => ask(&cli.config, &question, k, json).await,
        Commands::Check => check(&cli.config).await,
        Commands::Model { command } => match command {
            ModelCommands::Show => show_model(&cli.config),
            ModelCommands::Set { model } => set_model(&cli.config, &model),
            ModelCommands::List { url } => list_models(&url).await,
        },
        Commands::Clean { text } => {
            println!("{}", preprocess::clean_text(&text));
            Ok(())
        }
        Commands::Preprocess {
            input,
            output,
            products,
        } => preprocess_file(&input, output.as_deref(), &products),
    }
}

fn load_config(config_path: &Path) -> Result<Config> {
    if !config_path.exists() {
        eprintln!(
            "{} {} not found, using defaults",
            "→".blue(),
            config_path.display()
        );
    }
    Config::load_or_default(config_path).context("Failed to load config")
}

fn show_config(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "LLM:".bold());
    println!("  Model:          {}", config.llm.model.cyan());
    println!("  Base URL:       {}", config.llm.base_url);
    println!("  Temperature:    {}", config.llm.temperature);
    println!("  Max New Tokens: {}", config.llm.max_new_tokens);
    println!("  Timeout:        {} ms", config.llm.timeout_ms);
    println!("  Retries:        {}", config.llm.retries);
    println!();
    println!("{}", "Embedding:".bold());
    println!("  Model:          {}", config.embedding.model.cyan());
    println!("  Base URL:       {}", config.embedding_base_url());
    match config.embedding_dimension() {
        Ok(dimension) => println!("  Dimension:      {}", dimension),
        Err(e) => println!("  Dimension:      {}", e.to_string().red()),
    }
    println!();
    println!("{}", "Index:".bold());
    println!("  Path:           {}", config.index.path.display());
    println!("  Metric:         {:?}", config.index.metric);
    println!("  Default k:      {}", config.retrieval.default_k);
    println!("  Max k:          {}", config.retrieval.max_k);
    println!();
    println!("{}", "Prompt:".bold());
    println!("  Max Chars:      {}", config.prompt.max_prompt_chars);
    println!("  Truncate:       {}", config.prompt.truncate);
    println!("  Cache:          {}", if config.cache.enabled { "enabled" } else { "disabled" });

    Ok(())
}

async fn ask(config_path: &Path, question: &str, k: Option<usize>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let backends = Backends::load(&config)
        .await
        .context("Failed to load backends")?;
    let orchestrator = RagOrchestrator::new(&config, &backends)?;

    let k = k.unwrap_or(orchestrator.default_k());
    let result = orchestrator.answer_with_k(question, k).await;
    backends.close();
    let result = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_answer(&result, orchestrator.is_fallback(&result));
    }

    Ok(())
}

fn print_answer(result: &AnswerResult, fallback: bool) {
    println!("{}", "Answer:".bold().green());
    if fallback {
        println!("  {}", result.answer.yellow());
    } else {
        println!("  {}", result.answer);
    }

    if result.sources.is_empty() {
        return;
    }

    println!();
    println!("{}", "Sources:".bold());
    for (i, source) in result.sources.iter().enumerate() {
        let metadata = source
            .metadata
            .iter()
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect::<Vec<_>>()
            .join(", ");

        println!("  {} {}", format!("[{}]", i + 1).cyan(), source.id.bold());
        if !metadata.is_empty() {
            println!("      {}", metadata.dimmed());
        }
        println!("      {}", excerpt(&source.text, 200));
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}…", cut.trim_end())
    }
}

async fn check(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    let mut servers = vec![(config.llm.base_url.as_str(), vec![config.llm.model.as_str()])];
    if config.embedding_base_url() == config.llm.base_url {
        servers[0].1.push(config.embedding.model.as_str());
    } else {
        servers.push((config.embedding_base_url(), vec![config.embedding.model.as_str()]));
    }

    let mut failures = 0;
    for (url, models) in servers {
        let provider = OllamaProvider::new(url);
        let status = match detection::probe(&provider, url).await {
            Ok(status) => status,
            Err(e) => {
                detection::print_setup_help(&e);
                failures += 1;
                continue;
            }
        };
        println!("{} {} is reachable", "✓".green().bold(), url);

        for model in models {
            match status.require(model) {
                Ok(()) => println!("{} {} is available", "✓".green().bold(), model.cyan()),
                Err(e @ DetectionError::ModelMissing { .. }) => {
                    detection::print_setup_help(&e);
                    failures += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    if config.index.path.exists() {
        println!("{} index found at {}", "✓".green().bold(), config.index.path.display());
    } else {
        eprintln!("❌ No index at {}", config.index.path.display());
        failures += 1;
    }

    if failures > 0 {
        anyhow::bail!("{} check(s) failed", failures);
    }
    Ok(())
}

fn show_model(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = ModelRegistry::new();

    print!("{}: {}", "Current model".bold(), config.llm.model.cyan());
    match registry.get_chat(&config.llm.model) {
        Some(model) => println!(" ({} token context)", model.context_length),
        None => println!(),
    }

    print!("{}: {}", "Embedding model".bold(), config.embedding.model.cyan());
    match registry.get_embedding(&config.embedding.model) {
        Some(model) => println!(" ({} dimensions)", model.embedding_dim),
        None => println!(),
    }
    Ok(())
}

fn set_model(config_path: &Path, model: &str) -> Result<()> {
    let content = std::fs::read_to_string(config_path)
        .context("Failed to read config file")?;

    let mut config: serde_yaml::Value = serde_yaml::from_str(&content)
        .context("Failed to parse config")?;

    let root = config
        .as_mapping_mut()
        .context("Config file is not a YAML mapping")?;
    let llm = root
        .entry(serde_yaml::Value::String("llm".to_string()))
        .or_insert_with(|| serde_yaml::Value::Mapping(Default::default()));
    if let Some(llm_map) = llm.as_mapping_mut() {
        llm_map.insert(
            serde_yaml::Value::String("model".to_string()),
            serde_yaml::Value::String(model.to_string()),
        );
    }

    let updated_content = serde_yaml::to_string(&config)
        .context("Failed to serialize config")?;

    std::fs::write(config_path, updated_content)
        .context("Failed to write config file")?;

    println!(
        "{} Model updated to: {}",
        "✓".green().bold(),
        model.cyan()
    );

    Ok(())
}

async fn list_models(base_url: &str) -> Result<()> {
    let provider = OllamaProvider::new(base_url);

    println!("{} Fetching models from {}...", "→".blue(), base_url);
    println!();

    let status = match detection::probe(&provider, base_url).await {
        Ok(status) => status,
        Err(e) => {
            detection::print_setup_help(&e);
            return Err(e.into());
        }
    };

    if status.models.is_empty() {
        println!("{}", "No models found. Pull a model with 'ollama pull <model>'".yellow());
        return Ok(());
    }

    println!("{}", "Available models:".bold().green());
    println!();

    let registry = ModelRegistry::new();
    for name in &status.models {
        let kind = if registry.get_embedding(name.trim_end_matches(":latest")).is_some() {
            " (embedding)"
        } else {
            ""
        };
        println!("  {} {}{}", "•".cyan(), name.bold(), kind);
    }

    println!();
    println!("Use {} to set a model", "complaint-rag -c config.yaml model set <model>".bold());

    Ok(())
}

fn preprocess_file(input: &Path, output: Option<&Path>, products: &[String]) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let complaints: Vec<Complaint> = serde_json::from_str(&content)
        .context("Expected a JSON array of complaint records")?;
    let total = complaints.len();

    let products: Vec<&str> = products.iter().map(String::as_str).collect();
    let selected = if products.is_empty() { None } else { Some(products.as_slice()) };

    let filtered = preprocess::filter_by_product(complaints, selected);
    let mut kept = preprocess::drop_empty_narratives(filtered);
    preprocess::apply_text_cleaning(&mut kept);

    let json = serde_json::to_string_pretty(&kept)?;
    match output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", json),
    }

    eprintln!(
        "{} Kept {} of {} complaints",
        "✓".green().bold(),
        kept.len(),
        total
    );

    Ok(())
}
