//! tutor-server binary

use anyhow::Context;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;
use tutor::cli::output::Output;
use tutor::cli::{Cli, Commands};
use tutor::types::IndexSource;
use tutor::{AppConfig, AppState, ConfigError, Embedder, RetrievalService};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let (config, defaulted) = load_config(&cli)?;
    init_logging(&cli, &config);
    if defaulted {
        tracing::warn!(
            path = %cli.config.display(),
            "Configuration file not found, using defaults"
        );
    }

    match cli.command() {
        Commands::Serve => serve(config, &output).await,
        Commands::Index {
            rebuild,
            collection,
            corpus,
        } => index(&config, &output, *rebuild, collection.clone(), corpus.clone()).await,
        Commands::Query {
            text,
            k,
            scores,
            collection,
        } => query(&config, &output, text, *k, *scores, collection.clone()).await,
        Commands::Config { validate } => show_config(&cli, &config, &output, *validate),
    }
}

/// Load the configuration file. Falls back to defaults only for `serve` with
/// `--allow-default-config`; the flag reports whether that happened.
fn load_config(cli: &Cli) -> anyhow::Result<(AppConfig, bool)> {
    match AppConfig::load(&cli.config) {
        Ok(config) => Ok((config, false)),
        Err(ConfigError::FileNotFound(_))
            if cli.allow_default_config && cli.command() == &Commands::Serve =>
        {
            Ok((AppConfig::default(), true))
        }
        Err(e) => Err(e).with_context(|| format!("loading {}", cli.config.display())),
    }
}

fn init_logging(cli: &Cli, config: &AppConfig) {
    let default_level = if cli.verbose {
        "debug"
    } else {
        config.server.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "tutor={0},tutor_vector={0},tower_http={0}",
            default_level
        ))
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if cli.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn serve(config: AppConfig, output: &Output) -> anyhow::Result<()> {
    output.banner();

    let api_key = config
        .api_key()
        .context("the /rag endpoints need an API key")?;
    let retrieval = RetrievalService::from_config(&config).await?;

    // A failed warm-up is retried on the first request.
    let collection = config.rag.collection.clone();
    match retrieval.prepare(&collection).await {
        Ok(source) => output.index_source(&collection, &source),
        Err(e) => {
            tracing::warn!(collection = %collection, error = %e, "Collection not ready at startup");
            output.warning(&format!("Collection '{}' not ready: {}", collection, e));
        }
    }

    let addr = config.bind_addr();
    let state = AppState::new(config, retrieval, api_key);
    let app = tutor::api::routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    output.info(&format!("Listening on http://{}", addr));
    tracing::info!(addr = %addr, "Server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

async fn index(
    config: &AppConfig,
    output: &Output,
    rebuild: bool,
    collection: Option<String>,
    corpus: Option<PathBuf>,
) -> anyhow::Result<()> {
    let collection = collection.unwrap_or_else(|| config.rag.collection.clone());
    let corpus = corpus.unwrap_or_else(|| config.rag.corpus_dir.clone());
    let retrieval = RetrievalService::from_config(config).await?;

    output.header("Index");
    output.kv("collection", &collection);
    output.kv("corpus", &corpus.display().to_string());
    output.kv("index_dir", &config.rag.index_dir.display().to_string());
    output.kv("model", retrieval.embedder().model_id());

    if rebuild {
        let report = retrieval.rebuild(&collection, &corpus).await?;
        output.build_report(&report);
    } else {
        let source = retrieval.ensure_index(&collection, &corpus).await?;
        output.index_source(&collection, &source);
        if !matches!(source, IndexSource::Built(_)) {
            output.hint("pass --rebuild to re-index the corpus");
        }
    }
    Ok(())
}

async fn query(
    config: &AppConfig,
    output: &Output,
    text: &str,
    k: Option<usize>,
    scores: bool,
    collection: Option<String>,
) -> anyhow::Result<()> {
    let collection = collection.unwrap_or_else(|| config.rag.collection.clone());
    let k = k.unwrap_or(config.rag.default_k);
    let retrieval = RetrievalService::from_config(config).await?;
    retrieval.prepare(&collection).await?;

    if scores {
        let chunks = retrieval.retrieve_with_scores(&collection, text, k).await?;
        if chunks.is_empty() {
            output.warning("No passages found");
        }
        for (rank, chunk) in chunks.iter().enumerate() {
            output.passage(rank + 1, chunk);
        }
    } else {
        println!("{}", retrieval.query(&collection, text, k).await?);
    }
    Ok(())
}

fn show_config(
    cli: &Cli,
    config: &AppConfig,
    output: &Output,
    validate: bool,
) -> anyhow::Result<()> {
    if validate {
        output.success(&format!("{} is valid", cli.config.display()));
        if config.api_key().is_err() {
            output.warning(&format!(
                "{} is not set; `serve` will refuse to start",
                config.auth.api_key_env
            ));
        }
        return Ok(());
    }

    let rendered = toml::to_string_pretty(config).context("rendering configuration")?;
    output.header(&format!("Configuration ({})", cli.config.display()));
    println!("{}", rendered);
    Ok(())
}
