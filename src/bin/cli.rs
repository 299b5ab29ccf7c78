//! agentcore CLI
//!
//! Minimal entry point for running migrations and driving the agent runtime
//! from a terminal, either one-shot or as an interactive chat loop.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use agentcore::checkpoint::CheckpointStore;
use agentcore::config::{Config, Profile};
use agentcore::database::{init_pool, init_pool_for_migrations, migrations, PostgresPool};
use agentcore::error::{Error, Result};
use agentcore::llm::{LlmClient, OpenAiCompatClient};
use agentcore::memory::{ArchivalStore, CoreMemoryStore, EmbeddingService, MemoryCache, MemoryRetriever, TaggedMemoryStore};
use agentcore::pool::{WorkerFactory, WorkerPool};
use agentcore::runtime::AgentRuntime;
use agentcore::settings::{ConfigSettings, Settings};
use agentcore::stream::SubAgentRelay;
use agentcore::tools::{
    ArchivalMemoryInsertTool, ArchivalMemorySearchTool, CoreMemoryAppendTool, CoreMemoryReadTool,
    CoreMemoryReplaceTool, MemoryDeleteTool, MemorySaveTool, MemorySearchTool, ToolRegistry,
};
use agentcore::VERSION;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "agentcore",
    author,
    version = VERSION,
    about = "agent execution runtime: ReAct loop, worker pool, and multi-tier memory",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the database migrations needed by checkpoints and memory stores
    Migrate,
    /// Run a single turn to completion and print the final answer
    Run {
        /// Message to send
        message: String,
        /// Agent profile: web, coder, or general
        #[arg(long, default_value = "general")]
        profile: String,
    },
    /// Start an interactive chat loop against a single worker
    Chat {
        #[arg(long, default_value = "general")]
        profile: String,
    },
    /// Print the runtime version and a pool snapshot
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Migrate => run_migrate(&config).await,
        Commands::Run { message, profile } => {
            let profile: Profile = profile.parse()?;
            run_once(&config, profile, message).await
        }
        Commands::Chat { profile } => {
            let profile: Profile = profile.parse()?;
            run_chat(&config, profile).await
        }
        Commands::Status => {
            println!("agentcore {VERSION}");
            Ok(())
        }
    }
}

async fn run_migrate(config: &Config) -> Result<()> {
    let pool = init_pool_for_migrations(&config.database).await?;
    migrations::run(&pool).await?;
    info!("migrations complete");
    Ok(())
}

struct SingleClientFactory {
    llm_config: agentcore::config::LlmConfig,
}

impl WorkerFactory for SingleClientFactory {
    fn build_llm_client(&self) -> Result<Arc<dyn LlmClient>> {
        Ok(Arc::new(OpenAiCompatClient::new(&self.llm_config)?))
    }
}

/// Assemble the store/registry/pool stack shared by `run`/`chat`. Delegation
/// tools are left unregistered here: wiring `call_subordinate` requires an
/// `AgentLoopFactory` that itself holds the same `Arc<ToolRegistry>` it is
/// registered into, a cyclic construction a minimal demo entry point has no
/// need to resolve.
async fn build_runtime(config: &Config, profile: Profile, pool_size: usize) -> Result<Arc<AgentRuntime>> {
    let pg_pool: PostgresPool = init_pool(&config.database).await?;

    let core_memory = CoreMemoryStore::new(pg_pool.clone());
    let archival = ArchivalStore::new(pg_pool.clone());
    let embedding = EmbeddingService::new()?;
    let cache = MemoryCache::new();
    let memory_store = agentcore::database::MemoryStore::new(pg_pool.clone());
    let retriever = MemoryRetriever::new(memory_store, embedding, cache);
    let tagged = TaggedMemoryStore::new(retriever);
    let checkpoint_store = CheckpointStore::new(pg_pool);

    let mut registry = ToolRegistry::new();
    registry.register(CoreMemoryAppendTool::new(core_memory.clone()));
    registry.register(CoreMemoryReplaceTool::new(core_memory.clone()));
    registry.register(CoreMemoryReadTool::new(core_memory.clone()));
    registry.register(ArchivalMemoryInsertTool::new(archival.clone()));
    registry.register(ArchivalMemorySearchTool::new(archival.clone()));
    registry.register(MemorySaveTool::new(tagged.clone()));
    registry.register(MemorySearchTool::new(tagged.clone()));
    registry.register(MemoryDeleteTool::new(tagged.clone()));
    let tools = Arc::new(registry);

    let settings: Arc<dyn Settings> = Arc::new(ConfigSettings::new(config.clone()));
    let factory = SingleClientFactory {
        llm_config: config.llm.clone(),
    };

    let pool = WorkerPool::new(
        pool_size,
        profile,
        &factory,
        tools,
        core_memory,
        archival,
        tagged,
        checkpoint_store,
        settings,
        SubAgentRelay::new(),
        Default::default(),
    )
    .await?;

    Ok(Arc::new(AgentRuntime::new(pool)))
}

async fn run_once(config: &Config, profile: Profile, message: String) -> Result<()> {
    let runtime = build_runtime(config, profile, 1).await?;
    let outcome = runtime.run(message).await;
    if outcome.success {
        println!("{}", outcome.final_output);
    } else {
        eprintln!("run did not reach a final answer ({} steps)", outcome.steps.len());
    }
    Ok(())
}

async fn run_chat(config: &Config, profile: Profile) -> Result<()> {
    let runtime = build_runtime(config, profile, 1).await?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    println!("agentcore chat — Ctrl-D to exit");
    loop {
        print!("> ");
        stdout.flush().map_err(Error::Io)?;

        let mut line = String::new();
        let bytes_read = stdin.lock().read_line(&mut line).map_err(Error::Io)?;
        if bytes_read == 0 {
            break;
        }
        let message = line.trim();
        if message.is_empty() {
            continue;
        }

        let outcome = runtime.run(message.to_string()).await;
        if outcome.success {
            println!("{}", outcome.final_output);
        } else {
            println!("[no final answer after {} steps]", outcome.steps.len());
        }
    }

    Ok(())
}
