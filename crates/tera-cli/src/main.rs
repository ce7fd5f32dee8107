use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tera_core::{CoordinatorOptions, Mode, ResearchCoordinator};
use tera_local::agents::ResearchAgents;
use tera_local::llm::{build_chat_model, ChatModelConfig, LlmProvider, DEFAULT_LLM_TIMEOUT_MS};
use tera_local::search::{build_search_provider, SearchBackend};

const DEFAULT_QUERY: &str = "What is the capital of France?";

#[derive(Parser, Debug)]
#[command(name = "tera")]
#[command(about = "Iterative, budget-bounded web research", long_about = None)]
struct Cli {
    /// More logging on stderr (-v debug, -vv trace). `RUST_LOG` wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Only warnings and errors on stderr.
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Research one question and print the report.
    Research(ResearchCmd),
    /// Show which search backends and LLM providers are configured (no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct ResearchCmd {
    /// Question to research (default: TERA_DEFAULT_QUERY, then a built-in example).
    query: Option<String>,
    /// Research depth. Allowed: normal (1), deep (2)
    #[arg(long, env = "TERA_MODE", default_value = "normal")]
    mode: String,
    /// Search backend. Allowed: duckduckgo (1), serper (2), brave (3)
    #[arg(long, env = "TERA_SEARCH_PROVIDER", default_value = "duckduckgo")]
    search: String,
    /// LLM provider. Allowed: gemini, xai, openrouter, anthropic, openai, deepseek, mistral
    #[arg(long, env = "TERA_LLM_PROVIDER", default_value = "xai")]
    llm: String,
    /// Model id; overrides the provider's per-mode default.
    #[arg(long, env = "TERA_MODEL")]
    model: Option<String>,
    /// Hits of one query summarized concurrently (order is preserved).
    #[arg(long, env = "TERA_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,
    #[arg(long, env = "TERA_LLM_TIMEOUT_MS", default_value_t = DEFAULT_LLM_TIMEOUT_MS)]
    llm_timeout_ms: u64,
    #[arg(long, env = "TERA_SEARCH_TIMEOUT_MS")]
    search_timeout_ms: Option<u64>,
    /// Output format. Allowed: markdown, json
    #[arg(long, default_value = "markdown")]
    output: String,
    /// Also write the Markdown report to this path.
    #[arg(long)]
    out: Option<std::path::PathBuf>,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format. Allowed: json, text
    #[arg(long, default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format. Allowed: json, text
    #[arg(long, default_value = "json")]
    output: String,
}

fn load_dotenv() {
    let disabled = std::env::var("TERA_DOTENV")
        .ok()
        .is_some_and(|v| matches!(v.trim(), "0" | "false" | "off"));
    if disabled {
        return;
    }
    // Existing process env wins over the file.
    let _ = dotenvy::dotenv();
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // Stdout carries the report only.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn env_nonblank(k: &str) -> Option<String> {
    std::env::var(k)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn run_research(args: ResearchCmd) -> Result<()> {
    // Reject bad identifiers before touching the network.
    let mode: Mode = args.mode.parse()?;
    let backend: SearchBackend = args.search.parse()?;
    let provider: LlmProvider = args.llm.parse()?;
    let output = args.output.to_ascii_lowercase();
    if !matches!(output.as_str(), "markdown" | "md" | "json") {
        anyhow::bail!("unknown output {:?} (allowed: markdown, json)", args.output);
    }
    let query = args
        .query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .or_else(|| env_nonblank("TERA_DEFAULT_QUERY"))
        .unwrap_or_else(|| DEFAULT_QUERY.to_string());

    let client = tera_local::http_client()?;
    let search = build_search_provider(backend, client.clone())?;
    let llm_cfg = ChatModelConfig {
        model: args.model,
        timeout_ms: args.llm_timeout_ms,
        ..ChatModelConfig::new(provider, mode)
    };
    let model = build_chat_model(&llm_cfg, client)?;
    let model_id = model.model().to_string();
    let agents = ResearchAgents::build(model, mode);

    tracing::info!(
        %mode,
        search = %backend,
        llm = %provider,
        model = %model_id,
        "starting research"
    );

    let coordinator = ResearchCoordinator::new(
        mode,
        search,
        agents.planner,
        agents.summarizer,
        agents.writer,
    )
    .with_follow_up(agents.evaluator)
    .with_options(CoordinatorOptions {
        concurrency: args.concurrency.max(1),
        search_timeout_ms: args.search_timeout_ms,
    });

    let report = coordinator.research(&query).await?;

    if let Some(path) = &args.out {
        std::fs::write(path, &report.markdown)
            .with_context(|| format!("write report to {}", path.display()))?;
        tracing::info!(path = %path.display(), "report written");
    }

    if output == "json" {
        let payload = serde_json::json!({
            "schema_version": 1,
            "kind": "research",
            "ok": true,
            "query": report.query,
            "mode": report.mode.as_str(),
            "search_provider": backend.as_str(),
            "llm_provider": provider.as_str(),
            "model": model_id,
            "rounds": report.rounds,
            "queries_issued": report.queries_issued,
            "findings_processed": report.findings_processed,
            "synthesis_calls": report.synthesis_calls,
            "elapsed_ms": report.elapsed_ms,
            "report": report.markdown,
        });
        println!("{payload}");
    } else {
        println!("{}", report.markdown);
    }
    Ok(())
}

fn run_doctor(args: DoctorCmd) {
    let t0 = std::time::Instant::now();

    // Booleans only; never print key values.
    let search: serde_json::Map<String, serde_json::Value> = SearchBackend::all()
        .into_iter()
        .map(|b| (b.as_str().to_string(), b.is_configured().into()))
        .collect();
    let llm: serde_json::Map<String, serde_json::Value> = LlmProvider::all()
        .into_iter()
        .map(|p| {
            (
                p.as_str().to_string(),
                serde_json::json!({
                    "configured": p.is_configured(),
                    "model_normal": p.model_for(Mode::Normal),
                    "model_deep": p.model_for(Mode::Deep),
                }),
            )
        })
        .collect();
    let any_llm = LlmProvider::all().iter().any(|p| p.is_configured());

    let payload = serde_json::json!({
        "schema_version": 1,
        "kind": "doctor",
        "ok": any_llm,
        "name": "tera",
        "version": env!("CARGO_PKG_VERSION"),
        "platform": {
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        },
        "elapsed_ms": t0.elapsed().as_millis(),
        "configured": {
            "search": search,
            "llm": llm,
        },
    });

    match args.output.to_ascii_lowercase().as_str() {
        "text" => {
            println!("tera {} (ok={})", env!("CARGO_PKG_VERSION"), any_llm);
            let search = SearchBackend::all()
                .iter()
                .map(|b| format!("{}={}", b, b.is_configured()))
                .collect::<Vec<_>>()
                .join(" ");
            println!("search: {search}");
            println!("llm:");
            for p in LlmProvider::all() {
                println!(
                    "- {}: configured={} normal={} deep={}",
                    p,
                    p.is_configured(),
                    p.model_for(Mode::Normal),
                    p.model_for(Mode::Deep)
                );
            }
        }
        _ => println!("{payload}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Research(args) => run_research(args).await?,
        Commands::Doctor(args) => run_doctor(args),
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "tera",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("tera {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{}", v),
            }
        }
    }
    Ok(())
}
